//! Type serializer registry.
//!
//! Core GraphBinary types are handled directly by the writer and reader.
//! Extension types travel as GraphBinary custom types and are resolved
//! through the serializers registered here.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use bytes::{Buf, BufMut, BytesMut};

use super::reader::BinaryReader;
use super::writer::BinaryWriter;
use super::BinaryError;
use crate::graph::error::{GraphError, GraphResult};
use crate::graph::types::{GraphValue, Point};

/// Serializer for a GraphBinary custom type.
pub trait CustomTypeSerializer: Send + Sync {
    /// Name written in the custom type header.
    fn type_name(&self) -> &'static str;

    /// Custom type info bytes written after the name.
    fn type_info(&self) -> &[u8] {
        &[]
    }

    /// Whether this serializer handles the given value.
    fn accepts(&self, value: &GraphValue) -> bool;

    /// Write the value body.
    fn write_value(&self, value: &GraphValue, writer: &mut BinaryWriter<'_>)
        -> Result<(), BinaryError>;

    /// Read the value body.
    fn read_value(&self, reader: &mut BinaryReader<'_>) -> Result<GraphValue, BinaryError>;
}

/// Immutable set of custom type serializers.
#[derive(Clone, Default)]
pub struct TypeSerializerRegistry {
    serializers: Vec<Arc<dyn CustomTypeSerializer>>,
    by_name: HashMap<&'static str, usize>,
}

impl TypeSerializerRegistry {
    /// Registry with core types only.
    pub fn core() -> Self {
        Self::default()
    }

    /// Registry with core types and the DSE extension types (geometry).
    pub fn dse() -> Self {
        let mut registry = Self::default();
        registry.insert(Arc::new(PointSerializer));
        registry
    }

    /// Start building a registry on top of the core types.
    pub fn builder() -> TypeSerializerRegistryBuilder {
        TypeSerializerRegistryBuilder {
            registry: Self::core(),
            duplicates: Vec::new(),
        }
    }

    fn insert(&mut self, serializer: Arc<dyn CustomTypeSerializer>) -> bool {
        let name = serializer.type_name();
        if self.by_name.contains_key(name) {
            return false;
        }
        self.by_name.insert(name, self.serializers.len());
        self.serializers.push(serializer);
        true
    }

    /// Find the serializer that handles a value.
    pub fn find_for_value(&self, value: &GraphValue) -> Option<&Arc<dyn CustomTypeSerializer>> {
        self.serializers.iter().find(|s| s.accepts(value))
    }

    /// Find a serializer by custom type name.
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<dyn CustomTypeSerializer>> {
        self.by_name.get(name).map(|&i| &self.serializers[i])
    }

    /// Registered custom type names.
    pub fn custom_type_names(&self) -> Vec<&'static str> {
        self.serializers.iter().map(|s| s.type_name()).collect()
    }

    /// Number of registered custom types.
    pub fn len(&self) -> usize {
        self.serializers.len()
    }

    /// Check if no custom types are registered.
    pub fn is_empty(&self) -> bool {
        self.serializers.is_empty()
    }
}

impl fmt::Debug for TypeSerializerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeSerializerRegistry")
            .field("custom_types", &self.custom_type_names())
            .finish()
    }
}

/// Builder merging extension serializers into the core registry.
pub struct TypeSerializerRegistryBuilder {
    registry: TypeSerializerRegistry,
    duplicates: Vec<&'static str>,
}

impl TypeSerializerRegistryBuilder {
    /// Add the DSE extension types.
    pub fn with_dse_types(self) -> Self {
        self.with_custom(Arc::new(PointSerializer))
    }

    /// Add a custom type serializer.
    pub fn with_custom(mut self, serializer: Arc<dyn CustomTypeSerializer>) -> Self {
        let name = serializer.type_name();
        if !self.registry.insert(serializer) {
            self.duplicates.push(name);
        }
        self
    }

    /// Build the registry. Fails if two serializers share a type name.
    pub fn build(self) -> GraphResult<TypeSerializerRegistry> {
        if !self.duplicates.is_empty() {
            return Err(GraphError::configuration(format!(
                "Duplicate custom type serializers: {}",
                self.duplicates.join(", ")
            )));
        }
        Ok(self.registry)
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// Custom type name of geometry points.
pub const POINT_TYPE_NAME: &str = "driver.dse.geometry.Point";

const WKB_LITTLE_ENDIAN: u8 = 1;
const WKB_POINT: u32 = 1;

/// Writes points as length-prefixed little-endian WKB.
#[derive(Debug, Default)]
pub struct PointSerializer;

impl CustomTypeSerializer for PointSerializer {
    fn type_name(&self) -> &'static str {
        POINT_TYPE_NAME
    }

    fn accepts(&self, value: &GraphValue) -> bool {
        matches!(value, GraphValue::Point(_))
    }

    fn write_value(
        &self,
        value: &GraphValue,
        writer: &mut BinaryWriter<'_>,
    ) -> Result<(), BinaryError> {
        let GraphValue::Point(point) = value else {
            return Err(BinaryError::NoSerializer(value.type_name()));
        };

        let mut wkb = BytesMut::with_capacity(21);
        wkb.put_u8(WKB_LITTLE_ENDIAN);
        wkb.put_u32_le(WKB_POINT);
        wkb.put_f64_le(point.x);
        wkb.put_f64_le(point.y);

        writer.write_length(wkb.len(), "Point")?;
        writer.write_raw(&wkb);
        Ok(())
    }

    fn read_value(&self, reader: &mut BinaryReader<'_>) -> Result<GraphValue, BinaryError> {
        let len = reader.read_length()?;
        let mut wkb = reader.take(len)?;
        if wkb.len() != 21 {
            return Err(BinaryError::InvalidData(format!(
                "Invalid WKB point length {}",
                wkb.len()
            )));
        }

        let byte_order = wkb.get_u8();
        let little = match byte_order {
            0 => false,
            1 => true,
            other => {
                return Err(BinaryError::InvalidData(format!(
                    "Invalid WKB byte order {}",
                    other
                )))
            }
        };
        let (kind, x, y) = if little {
            (wkb.get_u32_le(), wkb.get_f64_le(), wkb.get_f64_le())
        } else {
            (wkb.get_u32(), wkb.get_f64(), wkb.get_f64())
        };
        if kind != WKB_POINT {
            return Err(BinaryError::InvalidData(format!(
                "Expected WKB point, got geometry type {}",
                kind
            )));
        }
        Ok(GraphValue::Point(Point::new(x, y)))
    }
}
