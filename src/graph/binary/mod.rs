//! GraphBinary serialization format.
//!
//! GraphBinary is the compact binary encoding used for graph parameters,
//! bytecode and results when the `graph-binary-1.0` sub-protocol is active.
//!
//! # Value layout
//!
//! Every fully-qualified value is `{type code}{value flag}{value}`. Nested
//! values inside composites are fully qualified as well, except for labels,
//! keys and bulks, which are written bare.
//!
//! # Supported Types
//!
//! - **Scalars**: Boolean, Byte, Short, Int, Long, Float, Double, String, UUID, ByteBuffer
//! - **Big numbers**: BigInteger, BigDecimal
//! - **Temporal**: Date, LocalDateTime, Duration
//! - **Collections**: List, Set, Map
//! - **Graph elements**: Vertex, Edge, VertexProperty, Property
//! - **Traversal**: Bytecode, Traverser
//! - **Custom types**: resolved through a [`TypeSerializerRegistry`]
//!
//! Vertex and edge properties are never written; decoded elements carry none
//! unless the server sent them.

pub mod data_type;
pub mod reader;
pub mod registry;
pub mod writer;

pub use reader::{BinaryReader, MAX_NESTING_DEPTH};
pub use registry::{
    CustomTypeSerializer, PointSerializer, TypeSerializerRegistry, TypeSerializerRegistryBuilder,
    POINT_TYPE_NAME,
};
pub use writer::BinaryWriter;

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;

use super::error::{GraphError, GraphResult};
use super::types::GraphValue;

/// GraphBinary errors.
#[derive(Debug, Clone, PartialEq)]
pub enum BinaryError {
    /// Unexpected end of input
    UnexpectedEof,
    /// Unknown type code
    UnknownType(u8),
    /// Value flag other than "none" or "null"
    InvalidValueFlag(u8),
    /// No custom serializer registered for a value type
    NoSerializer(&'static str),
    /// No custom serializer registered under a type name
    UnknownCustomType(String),
    /// Invalid UTF-8 in string
    InvalidUtf8(String),
    /// Value too large to encode
    ValueTooLarge(&'static str, usize),
    /// Structurally invalid data
    InvalidData(String),
    /// Bytes left over after the top-level value
    TrailingBytes(usize),
}

impl fmt::Display for BinaryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BinaryError::UnexpectedEof => write!(f, "Unexpected end of GraphBinary data"),
            BinaryError::UnknownType(code) => write!(f, "Unknown GraphBinary type code: 0x{:02X}", code),
            BinaryError::InvalidValueFlag(flag) => write!(f, "Invalid value flag: 0x{:02X}", flag),
            BinaryError::NoSerializer(t) => write!(f, "No serializer registered for type {}", t),
            BinaryError::UnknownCustomType(name) => {
                write!(f, "No serializer registered for custom type {}", name)
            }
            BinaryError::InvalidUtf8(e) => write!(f, "Invalid UTF-8 in string: {}", e),
            BinaryError::ValueTooLarge(t, s) => write!(f, "{} too large: {} items", t, s),
            BinaryError::InvalidData(msg) => write!(f, "Invalid GraphBinary data: {}", msg),
            BinaryError::TrailingBytes(n) => write!(f, "{} trailing bytes after value", n),
        }
    }
}

impl std::error::Error for BinaryError {}

impl From<BinaryError> for GraphError {
    fn from(err: BinaryError) -> Self {
        GraphError::Serialization(err.to_string())
    }
}

// ============================================================================
// GraphBinaryModule
// ============================================================================

/// Shared GraphBinary encode/decode engine.
///
/// Holds an immutable registry; cloning is cheap and clones may be used from
/// any number of requests at once.
#[derive(Clone, Debug)]
pub struct GraphBinaryModule {
    registry: Arc<TypeSerializerRegistry>,
}

impl GraphBinaryModule {
    /// Create a module from a registry.
    pub fn new(registry: Arc<TypeSerializerRegistry>) -> Self {
        Self { registry }
    }

    /// The registry in use.
    pub fn registry(&self) -> &TypeSerializerRegistry {
        &self.registry
    }

    /// Encode a value.
    pub fn serialize(&self, value: &GraphValue) -> GraphResult<Bytes> {
        let mut writer = BinaryWriter::new(&self.registry);
        writer.write(value)?;
        Ok(writer.into_bytes().freeze())
    }

    /// Decode a single value; the whole buffer must be consumed.
    pub fn deserialize(&self, bytes: &[u8]) -> GraphResult<GraphValue> {
        let mut reader = BinaryReader::new(bytes, &self.registry);
        let value = reader.read()?;
        if reader.remaining() > 0 {
            return Err(BinaryError::TrailingBytes(reader.remaining()).into());
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::types::{
        Bytecode, Edge, Point, Property, Traverser, Vertex, VertexProperty,
    };
    use chrono::{TimeZone, Utc};
    use uuid::Uuid;

    fn dse_module() -> GraphBinaryModule {
        GraphBinaryModule::new(Arc::new(TypeSerializerRegistry::dse()))
    }

    fn roundtrip(value: GraphValue) {
        let module = dse_module();
        let bytes = module.serialize(&value).unwrap();
        assert_eq!(module.deserialize(&bytes).unwrap(), value);
    }

    #[test]
    fn test_roundtrip_scalars() {
        roundtrip(GraphValue::Null);
        roundtrip(GraphValue::Boolean(false));
        roundtrip(GraphValue::Int(i32::MIN));
        roundtrip(GraphValue::Long(i64::MAX));
        roundtrip(GraphValue::Float(1.25));
        roundtrip(GraphValue::Double(-3.5e10));
        roundtrip(GraphValue::from("héllo"));
        roundtrip(GraphValue::Uuid(Uuid::new_v4()));
        roundtrip(GraphValue::Date(Utc.timestamp_millis_opt(1_600_000_000_123).unwrap()));
        roundtrip(GraphValue::Bytes(vec![0, 1, 2, 255]));
    }

    #[test]
    fn test_roundtrip_extended_scalars() {
        use crate::graph::numeric::{BigDecimal, BigInteger};
        use chrono::{Duration, NaiveDate};

        roundtrip(GraphValue::Byte(i8::MIN));
        roundtrip(GraphValue::Short(-12_345));
        roundtrip(GraphValue::BigInteger(
            "123456789123456789123456789123456789".parse::<BigInteger>().unwrap(),
        ));
        roundtrip(GraphValue::BigInteger(BigInteger::from(-1i64)));
        roundtrip(GraphValue::BigDecimal("-3.14159265358979323846264338".parse::<BigDecimal>().unwrap()));
        roundtrip(GraphValue::Duration(Duration::milliseconds(-1_500)));
        roundtrip(GraphValue::Duration(Duration::nanoseconds(86_400_000_000_123)));
        let local = NaiveDate::from_ymd_opt(2019, 6, 30)
            .unwrap()
            .and_hms_nano_opt(23, 59, 58, 999_999_999)
            .unwrap();
        roundtrip(GraphValue::LocalDateTime(local));
    }

    #[test]
    fn test_roundtrip_collections() {
        roundtrip(GraphValue::List(vec![
            GraphValue::Int(1),
            GraphValue::from("two"),
            GraphValue::Null,
        ]));
        roundtrip(GraphValue::Set(vec![GraphValue::Long(1), GraphValue::Long(2)]));
        roundtrip(GraphValue::Map(vec![
            (GraphValue::from("name"), GraphValue::from("marko")),
            (GraphValue::Int(1), GraphValue::List(vec![])),
        ]));
    }

    #[test]
    fn test_roundtrip_graph_elements() {
        roundtrip(GraphValue::from(Vertex::new(1, "person")));
        roundtrip(GraphValue::from(Edge::new(
            Uuid::nil(),
            "knows",
            Vertex::new(1i64, "person"),
            Vertex::new(2i64, "software"),
        )));
        roundtrip(GraphValue::VertexProperty(Box::new(VertexProperty::new(
            3, "name", "marko",
        ))));
        roundtrip(GraphValue::Property(Box::new(Property::new("weight", 0.5))));
    }

    #[test]
    fn test_roundtrip_traversal_types() {
        roundtrip(GraphValue::Traverser(Box::new(Traverser::new(
            Vertex::new(1, "person"),
            4,
        ))));
        roundtrip(GraphValue::Bytecode(
            Bytecode::new()
                .add_source("withSideEffect", vec!["a".into(), 1.into()])
                .add_step("V", vec![])
                .add_step("has", vec!["name".into(), "marko".into()]),
        ));
    }

    #[test]
    fn test_roundtrip_point() {
        roundtrip(GraphValue::Point(Point::new(1.5, -45.25)));
        roundtrip(GraphValue::List(vec![GraphValue::Point(Point::new(0.0, 1.0))]));
    }

    #[test]
    fn test_vertex_properties_are_not_encoded() {
        let module = dse_module();
        let vertex = Vertex::new(1, "person").with_property(VertexProperty::new(2, "name", "x"));
        let bytes = module.serialize(&GraphValue::from(vertex)).unwrap();

        let decoded = Vertex::try_from(module.deserialize(&bytes).unwrap()).unwrap();
        assert_eq!(decoded.id, GraphValue::Int(1));
        assert_eq!(decoded.label, "person");
        assert!(decoded.properties.is_empty());
    }

    #[test]
    fn test_point_requires_extension() {
        let core = GraphBinaryModule::new(Arc::new(TypeSerializerRegistry::core()));
        let err = core
            .serialize(&GraphValue::Point(Point::new(1.0, 2.0)))
            .unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));

        let bytes = dse_module()
            .serialize(&GraphValue::Point(Point::new(1.0, 2.0)))
            .unwrap();
        let err = core.deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains(POINT_TYPE_NAME));
    }

    #[test]
    fn test_truncated_buffer() {
        let module = dse_module();
        let bytes = module
            .serialize(&GraphValue::List(vec![GraphValue::from("abc")]))
            .unwrap();
        let err = module.deserialize(&bytes[..bytes.len() - 1]).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[test]
    fn test_trailing_bytes() {
        let module = dse_module();
        let mut bytes = module.serialize(&GraphValue::Int(1)).unwrap().to_vec();
        bytes.push(0);
        let err = module.deserialize(&bytes).unwrap_err();
        assert!(err.to_string().contains("trailing"));
    }

    #[test]
    fn test_malformed_buffers() {
        use super::data_type::*;

        let module = dse_module();
        let mut nested = Vec::new();
        for _ in 0..200_000 {
            nested.extend_from_slice(&[LIST, 0x00, 0, 0, 0, 1]);
        }
        let malformed: Vec<Vec<u8>> = vec![
            nested,
            // invalid UTF-8
            vec![STRING, 0x00, 0, 0, 0, 2, 0xC3, 0x28],
            // negative list length
            vec![LIST, 0x00, 0x80, 0, 0, 0],
            // length prefix far beyond the buffer
            vec![MAP, 0x00, 0x7F, 0xFF, 0xFF, 0xFF, INT, 0x00, 0, 0, 0, 1],
            vec![BYTE_BUFFER, 0x00, 0x7F, 0xFF, 0xFF, 0xFF],
            // traverser without its value
            vec![TRAVERSER, 0x00, 0, 0, 0, 0, 0, 0, 0, 1],
            vec![],
        ];
        for bytes in malformed {
            let err = module.deserialize(&bytes).unwrap_err();
            assert!(matches!(err, GraphError::Serialization(_)), "{:?}", err);
        }
    }

    #[tokio::test]
    async fn test_concurrent_use() {
        let module = dse_module();
        let mut handles = Vec::new();
        for i in 0..8 {
            let module = module.clone();
            handles.push(tokio::spawn(async move {
                let value = GraphValue::List(vec![GraphValue::Int(i), GraphValue::from("x")]);
                let bytes = module.serialize(&value).unwrap();
                assert_eq!(module.deserialize(&bytes).unwrap(), value);
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
    }
}
