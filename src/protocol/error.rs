//! Wire protocol error types.

use std::fmt;

/// Result type for wire-level operations.
pub type ProtocolResult<T> = Result<T, ProtocolError>;

/// Wire protocol errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Value bytes are not valid UTF-8
    InvalidUtf8(String),

    /// Fixed-size value has the wrong number of bytes
    InvalidLength {
        /// Name of the value type
        kind: &'static str,
        /// Expected byte count
        expected: usize,
        /// Actual byte count
        actual: usize,
    },

    /// Unknown consistency level name or code
    UnknownConsistency(String),

    /// Unknown protocol version code
    UnsupportedVersion(u8),
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in TEXT value: {}", e),
            ProtocolError::InvalidLength {
                kind,
                expected,
                actual,
            } => write!(
                f,
                "Invalid {} value: expected {} bytes, got {}",
                kind, expected, actual
            ),
            ProtocolError::UnknownConsistency(name) => {
                write!(f, "Unknown consistency level: {}", name)
            }
            ProtocolError::UnsupportedVersion(code) => {
                write!(f, "Unsupported protocol version: 0x{:02X}", code)
            }
        }
    }
}

impl std::error::Error for ProtocolError {}
