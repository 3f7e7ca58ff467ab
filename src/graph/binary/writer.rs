//! GraphBinary writer.

use bytes::{BufMut, BytesMut};
use chrono::{Datelike, NaiveDateTime, Timelike};

use super::data_type::*;
use super::registry::TypeSerializerRegistry;
use super::BinaryError;
use crate::graph::numeric::BigInteger;
use crate::graph::types::{
    duration_parts, Bytecode, Edge, GraphValue, Instruction, Property, Traverser, Vertex,
    VertexProperty,
};

/// Writes fully-qualified GraphBinary values into a byte buffer.
pub struct BinaryWriter<'r> {
    buffer: BytesMut,
    registry: &'r TypeSerializerRegistry,
}

impl<'r> BinaryWriter<'r> {
    /// Create a writer backed by the given registry.
    pub fn new(registry: &'r TypeSerializerRegistry) -> Self {
        Self {
            buffer: BytesMut::with_capacity(256),
            registry,
        }
    }

    /// Consume the writer and return the bytes.
    pub fn into_bytes(self) -> BytesMut {
        self.buffer
    }

    /// Get the bytes written so far.
    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    /// Write a value with its type code and value flag.
    pub fn write(&mut self, value: &GraphValue) -> Result<(), BinaryError> {
        match value {
            GraphValue::Null => {
                self.buffer.put_u8(UNSPECIFIED_NULL);
                self.buffer.put_u8(VALUE_FLAG_NULL);
                Ok(())
            }
            GraphValue::Boolean(b) => {
                self.header(BOOLEAN);
                self.buffer.put_u8(u8::from(*b));
                Ok(())
            }
            GraphValue::Byte(b) => {
                self.header(BYTE);
                self.buffer.put_i8(*b);
                Ok(())
            }
            GraphValue::Short(s) => {
                self.header(SHORT);
                self.buffer.put_i16(*s);
                Ok(())
            }
            GraphValue::Int(i) => {
                self.header(INT);
                self.buffer.put_i32(*i);
                Ok(())
            }
            GraphValue::Long(l) => {
                self.header(LONG);
                self.buffer.put_i64(*l);
                Ok(())
            }
            GraphValue::Float(f) => {
                self.header(FLOAT);
                self.buffer.put_f32(*f);
                Ok(())
            }
            GraphValue::Double(d) => {
                self.header(DOUBLE);
                self.buffer.put_f64(*d);
                Ok(())
            }
            GraphValue::BigInteger(b) => {
                self.header(BIG_INTEGER);
                self.write_big_integer(b)
            }
            GraphValue::BigDecimal(d) => {
                self.header(BIG_DECIMAL);
                self.buffer.put_i32(d.scale());
                self.write_big_integer(d.unscaled())
            }
            GraphValue::String(s) => {
                self.header(STRING);
                self.write_string(s)
            }
            GraphValue::Uuid(u) => {
                self.header(UUID);
                self.buffer.put_slice(u.as_bytes());
                Ok(())
            }
            GraphValue::Date(d) => {
                self.header(DATE);
                self.buffer.put_i64(d.timestamp_millis());
                Ok(())
            }
            GraphValue::LocalDateTime(d) => {
                self.header(LOCAL_DATE_TIME);
                self.write_local_date_time(d);
                Ok(())
            }
            GraphValue::Duration(d) => {
                self.header(DURATION);
                let (seconds, nanos) = duration_parts(d);
                self.buffer.put_i64(seconds);
                self.buffer.put_i32(nanos);
                Ok(())
            }
            GraphValue::Bytes(b) => {
                self.header(BYTE_BUFFER);
                self.write_length(b.len(), "ByteBuffer")?;
                self.buffer.put_slice(b);
                Ok(())
            }
            GraphValue::List(items) => {
                self.header(LIST);
                self.write_items(items, "List")
            }
            GraphValue::Set(items) => {
                self.header(SET);
                self.write_items(items, "Set")
            }
            GraphValue::Map(entries) => {
                self.header(MAP);
                self.write_length(entries.len(), "Map")?;
                for (k, v) in entries {
                    self.write(k)?;
                    self.write(v)?;
                }
                Ok(())
            }
            GraphValue::Vertex(v) => {
                self.header(VERTEX);
                self.write_vertex(v)
            }
            GraphValue::Edge(e) => {
                self.header(EDGE);
                self.write_edge(e)
            }
            GraphValue::VertexProperty(p) => {
                self.header(VERTEX_PROPERTY);
                self.write_vertex_property(p)
            }
            GraphValue::Property(p) => {
                self.header(PROPERTY);
                self.write_property(p)
            }
            GraphValue::Traverser(t) => {
                self.header(TRAVERSER);
                self.write_traverser(t)
            }
            GraphValue::Bytecode(b) => {
                self.header(BYTECODE);
                self.write_bytecode(b)
            }
            GraphValue::Point(_) => self.write_custom(value),
        }
    }

    fn header(&mut self, type_code: u8) {
        self.buffer.put_u8(type_code);
        self.buffer.put_u8(VALUE_FLAG_NONE);
    }

    fn write_null_of(&mut self, type_code: u8) {
        self.buffer.put_u8(type_code);
        self.buffer.put_u8(VALUE_FLAG_NULL);
    }

    /// Write a 32-bit length prefix.
    pub fn write_length(&mut self, len: usize, kind: &'static str) -> Result<(), BinaryError> {
        let len = i32::try_from(len).map_err(|_| BinaryError::ValueTooLarge(kind, len))?;
        self.buffer.put_i32(len);
        Ok(())
    }

    /// Write a bare (unqualified) string.
    pub fn write_string(&mut self, value: &str) -> Result<(), BinaryError> {
        self.write_length(value.len(), "String")?;
        self.buffer.put_slice(value.as_bytes());
        Ok(())
    }

    /// Write raw bytes without any prefix.
    pub fn write_raw(&mut self, bytes: &[u8]) {
        self.buffer.put_slice(bytes);
    }

    fn write_items(&mut self, items: &[GraphValue], kind: &'static str) -> Result<(), BinaryError> {
        self.write_length(items.len(), kind)?;
        for item in items {
            self.write(item)?;
        }
        Ok(())
    }

    // {length}{two's complement bytes}
    fn write_big_integer(&mut self, value: &BigInteger) -> Result<(), BinaryError> {
        let bytes = value.to_signed_bytes_be();
        self.write_length(bytes.len(), "BigInteger")?;
        self.buffer.put_slice(bytes);
        Ok(())
    }

    // {year}{month}{day}{nano of day}
    fn write_local_date_time(&mut self, value: &NaiveDateTime) {
        self.buffer.put_i32(value.year());
        self.buffer.put_u8(value.month() as u8);
        self.buffer.put_u8(value.day() as u8);
        let nano_of_day = i64::from(value.num_seconds_from_midnight()) * 1_000_000_000
            + i64::from(value.nanosecond());
        self.buffer.put_i64(nano_of_day);
    }

    // {id}{label}{properties}: properties are always written as null
    fn write_vertex(&mut self, vertex: &Vertex) -> Result<(), BinaryError> {
        self.write(&vertex.id)?;
        self.write_string(&vertex.label)?;
        self.write_null_of(LIST);
        Ok(())
    }

    // {id}{label}{inV id}{inV label}{outV id}{outV label}{parent}{properties}
    fn write_edge(&mut self, edge: &Edge) -> Result<(), BinaryError> {
        self.write(&edge.id)?;
        self.write_string(&edge.label)?;
        self.write(&edge.in_v)?;
        self.write_string(&edge.in_v_label)?;
        self.write(&edge.out_v)?;
        self.write_string(&edge.out_v_label)?;
        self.write(&GraphValue::Null)?;
        self.write_null_of(LIST);
        Ok(())
    }

    // {id}{label}{value}{parent}{properties}
    fn write_vertex_property(&mut self, property: &VertexProperty) -> Result<(), BinaryError> {
        self.write(&property.id)?;
        self.write_string(&property.label)?;
        self.write(&property.value)?;
        self.write(&GraphValue::Null)?;
        self.write_null_of(LIST);
        Ok(())
    }

    // {key}{value}{parent}
    fn write_property(&mut self, property: &Property) -> Result<(), BinaryError> {
        self.write_string(&property.key)?;
        self.write(&property.value)?;
        self.write(&GraphValue::Null)
    }

    fn write_traverser(&mut self, traverser: &Traverser) -> Result<(), BinaryError> {
        self.buffer.put_i64(traverser.bulk);
        self.write(&traverser.value)
    }

    fn write_bytecode(&mut self, bytecode: &Bytecode) -> Result<(), BinaryError> {
        self.write_instructions(&bytecode.steps)?;
        self.write_instructions(&bytecode.sources)
    }

    fn write_instructions(&mut self, instructions: &[Instruction]) -> Result<(), BinaryError> {
        self.write_length(instructions.len(), "Bytecode")?;
        for instruction in instructions {
            self.write_string(&instruction.operator)?;
            self.write_items(&instruction.arguments, "Bytecode")?;
        }
        Ok(())
    }

    // {0x00}{type name}{custom type info}{value flag}{value}
    fn write_custom(&mut self, value: &GraphValue) -> Result<(), BinaryError> {
        let registry = self.registry;
        let serializer = registry
            .find_for_value(value)
            .ok_or(BinaryError::NoSerializer(value.type_name()))?;

        self.buffer.put_u8(CUSTOM);
        self.write_string(serializer.type_name())?;
        let info = serializer.type_info();
        self.write_length(info.len(), "custom type info")?;
        self.buffer.put_slice(info);
        self.buffer.put_u8(VALUE_FLAG_NONE);
        serializer.write_value(value, self)
    }
}
