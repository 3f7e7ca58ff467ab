//! GraphBinary reader.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use uuid::Uuid;

use super::data_type::*;
use super::registry::TypeSerializerRegistry;
use super::BinaryError;
use crate::graph::numeric::{BigDecimal, BigInteger};
use crate::graph::types::{
    duration_from_parts, Bytecode, Edge, GraphValue, Instruction, Property, Traverser, Vertex,
    VertexProperty,
};

/// Deepest nesting of values the reader accepts.
pub const MAX_NESTING_DEPTH: usize = 128;

/// Reads fully-qualified GraphBinary values from a byte slice.
pub struct BinaryReader<'a> {
    data: &'a [u8],
    pos: usize,
    depth: usize,
    registry: &'a TypeSerializerRegistry,
}

impl<'a> BinaryReader<'a> {
    /// Create a reader for the given bytes.
    pub fn new(data: &'a [u8], registry: &'a TypeSerializerRegistry) -> Self {
        Self {
            data,
            pos: 0,
            depth: 0,
            registry,
        }
    }

    /// Get the current position.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Get remaining bytes count.
    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    /// Read the next fully-qualified value.
    pub fn read(&mut self) -> Result<GraphValue, BinaryError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(BinaryError::InvalidData(format!(
                "Values nested deeper than {} levels",
                MAX_NESTING_DEPTH
            )));
        }
        self.depth += 1;
        let value = self.read_value();
        self.depth -= 1;
        value
    }

    fn read_value(&mut self) -> Result<GraphValue, BinaryError> {
        let type_code = self.read_u8()?;
        if type_code == CUSTOM {
            return self.read_custom();
        }

        let flag = self.read_u8()?;
        match flag {
            VALUE_FLAG_NULL => return Ok(GraphValue::Null),
            VALUE_FLAG_NONE => {}
            other => return Err(BinaryError::InvalidValueFlag(other)),
        }

        match type_code {
            BYTE => Ok(GraphValue::Byte(self.read_u8()? as i8)),
            SHORT => {
                let raw: [u8; 2] = self.take(2)?.try_into().map_err(|_| BinaryError::UnexpectedEof)?;
                Ok(GraphValue::Short(i16::from_be_bytes(raw)))
            }
            INT => Ok(GraphValue::Int(self.read_i32()?)),
            LONG => Ok(GraphValue::Long(self.read_i64()?)),
            STRING => Ok(GraphValue::String(self.read_string()?)),
            DATE | TIMESTAMP => self.read_date(),
            LOCAL_DATE_TIME => self.read_local_date_time(),
            DURATION => {
                let seconds = self.read_i64()?;
                let nanos = self.read_i32()?;
                duration_from_parts(seconds, nanos)
                    .map(GraphValue::Duration)
                    .ok_or_else(|| {
                        BinaryError::InvalidData(format!(
                            "Duration out of range: {}s {}ns",
                            seconds, nanos
                        ))
                    })
            }
            BIG_INTEGER => Ok(GraphValue::BigInteger(self.read_big_integer()?)),
            BIG_DECIMAL => {
                let scale = self.read_i32()?;
                let unscaled = self.read_big_integer()?;
                Ok(GraphValue::BigDecimal(BigDecimal::new(unscaled, scale)))
            }
            DOUBLE => Ok(GraphValue::Double(f64::from_bits(self.read_i64()? as u64))),
            FLOAT => Ok(GraphValue::Float(f32::from_bits(self.read_i32()? as u32))),
            LIST => Ok(GraphValue::List(self.read_items()?)),
            SET => Ok(GraphValue::Set(self.read_items()?)),
            MAP => self.read_map(),
            UUID => {
                let raw: [u8; 16] = self
                    .take(16)?
                    .try_into()
                    .map_err(|_| BinaryError::UnexpectedEof)?;
                Ok(GraphValue::Uuid(Uuid::from_bytes(raw)))
            }
            EDGE => self.read_edge(),
            PROPERTY => self.read_property(),
            VERTEX => self.read_vertex(),
            VERTEX_PROPERTY => self.read_vertex_property(),
            BYTECODE => self.read_bytecode(),
            TRAVERSER => self.read_traverser(),
            BYTE_BUFFER => {
                let len = self.read_length()?;
                Ok(GraphValue::Bytes(self.take(len)?.to_vec()))
            }
            BOOLEAN => match self.read_u8()? {
                0 => Ok(GraphValue::Boolean(false)),
                1 => Ok(GraphValue::Boolean(true)),
                other => Err(BinaryError::InvalidData(format!(
                    "Invalid boolean byte 0x{:02X}",
                    other
                ))),
            },
            other => Err(BinaryError::UnknownType(other)),
        }
    }

    /// Read one byte.
    pub fn read_u8(&mut self) -> Result<u8, BinaryError> {
        let byte = *self.data.get(self.pos).ok_or(BinaryError::UnexpectedEof)?;
        self.pos += 1;
        Ok(byte)
    }

    /// Read a big-endian i32.
    pub fn read_i32(&mut self) -> Result<i32, BinaryError> {
        let raw: [u8; 4] = self.take(4)?.try_into().map_err(|_| BinaryError::UnexpectedEof)?;
        Ok(i32::from_be_bytes(raw))
    }

    /// Read a big-endian i64.
    pub fn read_i64(&mut self) -> Result<i64, BinaryError> {
        let raw: [u8; 8] = self.take(8)?.try_into().map_err(|_| BinaryError::UnexpectedEof)?;
        Ok(i64::from_be_bytes(raw))
    }

    /// Read a 32-bit length prefix.
    pub fn read_length(&mut self) -> Result<usize, BinaryError> {
        let len = self.read_i32()?;
        usize::try_from(len).map_err(|_| BinaryError::InvalidData(format!("Negative length {}", len)))
    }

    /// Read a bare (unqualified) string.
    pub fn read_string(&mut self) -> Result<String, BinaryError> {
        let len = self.read_length()?;
        let bytes = self.take(len)?;
        std::str::from_utf8(bytes)
            .map(str::to_string)
            .map_err(|e| BinaryError::InvalidUtf8(e.to_string()))
    }

    /// Take `len` raw bytes.
    pub fn take(&mut self, len: usize) -> Result<&'a [u8], BinaryError> {
        if self.remaining() < len {
            return Err(BinaryError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn read_date(&mut self) -> Result<GraphValue, BinaryError> {
        let millis = self.read_i64()?;
        Utc.timestamp_millis_opt(millis)
            .single()
            .map(GraphValue::Date)
            .ok_or_else(|| BinaryError::InvalidData(format!("Date out of range: {}", millis)))
    }

    fn read_local_date_time(&mut self) -> Result<GraphValue, BinaryError> {
        let year = self.read_i32()?;
        let month = self.read_u8()?;
        let day = self.read_u8()?;
        let nano_of_day = self.read_i64()?;

        let date = NaiveDate::from_ymd_opt(year, u32::from(month), u32::from(day))
            .ok_or_else(|| {
                BinaryError::InvalidData(format!("Invalid date {}-{}-{}", year, month, day))
            })?;
        let time = u32::try_from(nano_of_day / 1_000_000_000)
            .ok()
            .filter(|_| nano_of_day >= 0)
            .and_then(|secs| {
                NaiveTime::from_num_seconds_from_midnight_opt(
                    secs,
                    (nano_of_day % 1_000_000_000) as u32,
                )
            })
            .ok_or_else(|| {
                BinaryError::InvalidData(format!("Invalid nano of day {}", nano_of_day))
            })?;
        Ok(GraphValue::LocalDateTime(NaiveDateTime::new(date, time)))
    }

    fn read_big_integer(&mut self) -> Result<BigInteger, BinaryError> {
        let len = self.read_length()?;
        Ok(BigInteger::from_signed_bytes_be(self.take(len)?))
    }

    fn read_items(&mut self) -> Result<Vec<GraphValue>, BinaryError> {
        let len = self.read_length()?;
        // Cap the preallocation; the length is untrusted input.
        let mut items = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            items.push(self.read()?);
        }
        Ok(items)
    }

    fn read_map(&mut self) -> Result<GraphValue, BinaryError> {
        let len = self.read_length()?;
        let mut entries = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            let key = self.read()?;
            let value = self.read()?;
            entries.push((key, value));
        }
        Ok(GraphValue::Map(entries))
    }

    fn read_vertex(&mut self) -> Result<GraphValue, BinaryError> {
        let id = self.read()?;
        let label = self.read_string()?;
        let properties = match self.read()? {
            GraphValue::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    GraphValue::VertexProperty(p) => Some(*p),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(GraphValue::Vertex(Box::new(Vertex {
            id,
            label,
            properties,
        })))
    }

    fn read_edge(&mut self) -> Result<GraphValue, BinaryError> {
        let id = self.read()?;
        let label = self.read_string()?;
        let in_v = self.read()?;
        let in_v_label = self.read_string()?;
        let out_v = self.read()?;
        let out_v_label = self.read_string()?;
        let _parent = self.read()?;
        let properties = match self.read()? {
            GraphValue::List(items) => items
                .into_iter()
                .filter_map(|item| match item {
                    GraphValue::Property(p) => Some(*p),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        };
        Ok(GraphValue::Edge(Box::new(Edge {
            id,
            label,
            in_v,
            in_v_label,
            out_v,
            out_v_label,
            properties,
        })))
    }

    fn read_vertex_property(&mut self) -> Result<GraphValue, BinaryError> {
        let id = self.read()?;
        let label = self.read_string()?;
        let value = self.read()?;
        let _parent = self.read()?;
        let _properties = self.read()?;
        Ok(GraphValue::VertexProperty(Box::new(VertexProperty {
            id,
            label,
            value,
            properties: Vec::new(),
        })))
    }

    fn read_property(&mut self) -> Result<GraphValue, BinaryError> {
        let key = self.read_string()?;
        let value = self.read()?;
        let _parent = self.read()?;
        Ok(GraphValue::Property(Box::new(Property { key, value })))
    }

    fn read_traverser(&mut self) -> Result<GraphValue, BinaryError> {
        let bulk = self.read_i64()?;
        let value = self.read()?;
        Ok(GraphValue::Traverser(Box::new(Traverser { bulk, value })))
    }

    fn read_bytecode(&mut self) -> Result<GraphValue, BinaryError> {
        let steps = self.read_instructions()?;
        let sources = self.read_instructions()?;
        Ok(GraphValue::Bytecode(Bytecode { sources, steps }))
    }

    fn read_instructions(&mut self) -> Result<Vec<Instruction>, BinaryError> {
        let len = self.read_length()?;
        let mut instructions = Vec::with_capacity(len.min(1024));
        for _ in 0..len {
            let operator = self.read_string()?;
            let arguments = self.read_items()?;
            instructions.push(Instruction {
                operator,
                arguments,
            });
        }
        Ok(instructions)
    }

    fn read_custom(&mut self) -> Result<GraphValue, BinaryError> {
        let name = self.read_string()?;
        let info_len = self.read_length()?;
        self.take(info_len)?;

        let registry = self.registry;
        let serializer = registry
            .find_by_name(&name)
            .ok_or_else(|| BinaryError::UnknownCustomType(name.clone()))?;

        match self.read_u8()? {
            VALUE_FLAG_NULL => Ok(GraphValue::Null),
            VALUE_FLAG_NONE => serializer.read_value(self),
            other => Err(BinaryError::InvalidValueFlag(other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read(data: &[u8]) -> Result<GraphValue, BinaryError> {
        let registry = TypeSerializerRegistry::core();
        BinaryReader::new(data, &registry).read()
    }

    #[test]
    fn test_read_int() {
        assert_eq!(read(&[INT, 0x00, 0, 0, 1, 0]).unwrap(), GraphValue::Int(256));
    }

    #[test]
    fn test_read_typed_null() {
        assert_eq!(read(&[STRING, VALUE_FLAG_NULL]).unwrap(), GraphValue::Null);
    }

    #[test]
    fn test_read_string() {
        let data = [STRING, 0x00, 0, 0, 0, 2, b'h', b'i'];
        assert_eq!(read(&data).unwrap(), GraphValue::from("hi"));
    }

    #[test]
    fn test_read_unexpected_eof() {
        let err = read(&[LONG, 0x00, 0, 0]).unwrap_err();
        assert!(matches!(err, BinaryError::UnexpectedEof));

        let err = read(&[STRING, 0x00, 0, 0, 0, 9, b'a']).unwrap_err();
        assert!(matches!(err, BinaryError::UnexpectedEof));
    }

    #[test]
    fn test_read_unknown_type() {
        let err = read(&[0x77, 0x00]).unwrap_err();
        assert!(matches!(err, BinaryError::UnknownType(0x77)));
    }

    #[test]
    fn test_read_invalid_flag() {
        let err = read(&[INT, 0x05, 0, 0, 0, 1]).unwrap_err();
        assert!(matches!(err, BinaryError::InvalidValueFlag(0x05)));
    }

    #[test]
    fn test_read_negative_length() {
        let err = read(&[LIST, 0x00, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap_err();
        assert!(matches!(err, BinaryError::InvalidData(_)));
    }

    #[test]
    fn test_read_invalid_utf8() {
        let err = read(&[STRING, 0x00, 0, 0, 0, 2, 0xFF, 0xFE]).unwrap_err();
        assert!(matches!(err, BinaryError::InvalidUtf8(_)));
    }

    #[test]
    fn test_read_unknown_custom_type() {
        let mut data = vec![CUSTOM, 0, 0, 0, 3];
        data.extend_from_slice(b"foo");
        data.extend_from_slice(&[0, 0, 0, 0, VALUE_FLAG_NONE]);
        let err = read(&data).unwrap_err();
        assert!(matches!(err, BinaryError::UnknownCustomType(name) if name == "foo"));
    }

    fn nested_lists(depth: usize) -> Vec<u8> {
        let mut data = Vec::with_capacity(depth * 6 + 6);
        for _ in 0..depth {
            data.extend_from_slice(&[LIST, 0x00, 0, 0, 0, 1]);
        }
        data.extend_from_slice(&[INT, 0x00, 0, 0, 0, 1]);
        data
    }

    #[test]
    fn test_read_nesting_limit() {
        let mut value = read(&nested_lists(MAX_NESTING_DEPTH - 1)).unwrap();
        let mut depth = 0;
        while let GraphValue::List(mut items) = value {
            value = items.remove(0);
            depth += 1;
        }
        assert_eq!(depth, MAX_NESTING_DEPTH - 1);
        assert_eq!(value, GraphValue::Int(1));

        let err = read(&nested_lists(MAX_NESTING_DEPTH)).unwrap_err();
        assert!(matches!(err, BinaryError::InvalidData(_)));
    }

    #[test]
    fn test_read_deeply_nested_garbage() {
        let err = read(&nested_lists(200_000)).unwrap_err();
        assert!(matches!(err, BinaryError::InvalidData(_)));
    }

    #[test]
    fn test_read_invalid_boolean() {
        let err = read(&[BOOLEAN, 0x00, 0x02]).unwrap_err();
        assert!(matches!(err, BinaryError::InvalidData(_)));
    }

    #[test]
    fn test_read_big_integer() {
        let data = [BIG_INTEGER, 0x00, 0, 0, 0, 3, 0x00, 0xFF, 0x7F];
        let expected: BigInteger = "65407".parse().unwrap();
        assert_eq!(read(&data).unwrap(), GraphValue::BigInteger(expected));
    }

    #[test]
    fn test_read_invalid_temporal() {
        // nanos past one second
        let mut data = vec![DURATION, 0x00];
        data.extend_from_slice(&0i64.to_be_bytes());
        data.extend_from_slice(&1_000_000_000i32.to_be_bytes());
        assert!(matches!(read(&data).unwrap_err(), BinaryError::InvalidData(_)));

        // February 30th
        let mut data = vec![LOCAL_DATE_TIME, 0x00];
        data.extend_from_slice(&2020i32.to_be_bytes());
        data.extend_from_slice(&[2, 30]);
        data.extend_from_slice(&0i64.to_be_bytes());
        assert!(matches!(read(&data).unwrap_err(), BinaryError::InvalidData(_)));

        // negative nano of day
        let mut data = vec![LOCAL_DATE_TIME, 0x00];
        data.extend_from_slice(&2020i32.to_be_bytes());
        data.extend_from_slice(&[2, 3]);
        data.extend_from_slice(&(-1i64).to_be_bytes());
        assert!(matches!(read(&data).unwrap_err(), BinaryError::InvalidData(_)));
    }

    #[test]
    fn test_reader_position() {
        let registry = TypeSerializerRegistry::core();
        let data = [BOOLEAN, 0x00, 0x01, INT, 0x00, 0, 0, 0, 2];
        let mut reader = BinaryReader::new(&data, &registry);
        assert_eq!(reader.remaining(), 9);
        assert_eq!(reader.read().unwrap(), GraphValue::Boolean(true));
        assert_eq!(reader.position(), 3);
        assert_eq!(reader.read().unwrap(), GraphValue::Int(2));
        assert_eq!(reader.remaining(), 0);
    }
}
