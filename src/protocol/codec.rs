//! Generic value codec for TEXT and BIGINT values.
//!
//! Option-map entries are encoded the same way bound values are: TEXT as raw
//! UTF-8 bytes, BIGINT as an 8-byte big-endian integer.

use bytes::{BufMut, Bytes, BytesMut};

use super::error::{ProtocolError, ProtocolResult};

/// Encode a TEXT value.
pub fn encode_text(value: &str) -> Bytes {
    Bytes::copy_from_slice(value.as_bytes())
}

/// Decode a TEXT value.
pub fn decode_text(bytes: &[u8]) -> ProtocolResult<String> {
    std::str::from_utf8(bytes)
        .map(str::to_string)
        .map_err(|e| ProtocolError::InvalidUtf8(e.to_string()))
}

/// Encode a BIGINT value.
pub fn encode_bigint(value: i64) -> Bytes {
    let mut buffer = BytesMut::with_capacity(8);
    buffer.put_i64(value);
    buffer.freeze()
}

/// Decode a BIGINT value.
pub fn decode_bigint(bytes: &[u8]) -> ProtocolResult<i64> {
    let raw: [u8; 8] = bytes.try_into().map_err(|_| ProtocolError::InvalidLength {
        kind: "BIGINT",
        expected: 8,
        actual: bytes.len(),
    })?;
    Ok(i64::from_be_bytes(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_text() {
        let encoded = encode_text("graph-binary-1.0");
        assert_eq!(&encoded[..], b"graph-binary-1.0");
        assert_eq!(decode_text(&encoded).unwrap(), "graph-binary-1.0");
    }

    #[test]
    fn test_text_invalid_utf8() {
        let result = decode_text(&[0xC3, 0x28]);
        assert!(matches!(result, Err(ProtocolError::InvalidUtf8(_))));
    }

    #[test]
    fn test_bigint() {
        let encoded = encode_bigint(2);
        assert_eq!(&encoded[..], &[0, 0, 0, 0, 0, 0, 0, 2]);
        assert_eq!(decode_bigint(&encoded).unwrap(), 2);
        assert_eq!(decode_bigint(&encode_bigint(i64::MIN)).unwrap(), i64::MIN);
    }

    #[test]
    fn test_bigint_wrong_length() {
        let result = decode_bigint(&[0, 1, 2]);
        assert_eq!(
            result,
            Err(ProtocolError::InvalidLength {
                kind: "BIGINT",
                expected: 8,
                actual: 3
            })
        );
    }
}
