//! Decoded graph result elements.

use std::fmt;

use super::error::{GraphError, GraphResult};
use super::types::{Edge, GraphValue, Property, Vertex, VertexProperty};

/// One element of a graph result: a vertex, an edge, a property or any
/// other value the traversal produced.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphNode {
    value: GraphValue,
}

impl GraphNode {
    /// Wrap a decoded value.
    pub fn new(value: GraphValue) -> Self {
        Self { value }
    }

    /// The underlying value.
    pub fn value(&self) -> &GraphValue {
        &self.value
    }

    /// Take the underlying value.
    pub fn into_value(self) -> GraphValue {
        self.value
    }

    /// Check if this is a vertex.
    pub fn is_vertex(&self) -> bool {
        matches!(self.value, GraphValue::Vertex(_))
    }

    /// Check if this is an edge.
    pub fn is_edge(&self) -> bool {
        matches!(self.value, GraphValue::Edge(_))
    }

    /// Check if this is a vertex property.
    pub fn is_vertex_property(&self) -> bool {
        matches!(self.value, GraphValue::VertexProperty(_))
    }

    /// Check if this is an edge or meta property.
    pub fn is_property(&self) -> bool {
        matches!(self.value, GraphValue::Property(_))
    }

    /// Check if this is null.
    pub fn is_null(&self) -> bool {
        self.value.is_null()
    }

    /// Check if this is a list or set.
    pub fn is_list(&self) -> bool {
        self.value.as_list().is_some()
    }

    /// Check if this is a map.
    pub fn is_map(&self) -> bool {
        self.value.as_map().is_some()
    }

    /// Number of items of a list, set or map; 0 for anything else.
    pub fn size(&self) -> usize {
        match &self.value {
            GraphValue::List(items) | GraphValue::Set(items) => items.len(),
            GraphValue::Map(entries) => entries.len(),
            _ => 0,
        }
    }

    /// Map entry by string key, or vertex property value by key.
    pub fn get(&self, key: &str) -> Option<GraphNode> {
        match &self.value {
            GraphValue::Vertex(vertex) => vertex.value(key).cloned().map(GraphNode::new),
            GraphValue::Edge(edge) => edge.value(key).cloned().map(GraphNode::new),
            other => other.get(key).cloned().map(GraphNode::new),
        }
    }

    /// List item by position.
    pub fn get_index(&self, index: usize) -> Option<GraphNode> {
        self.value
            .as_list()
            .and_then(|items| items.get(index))
            .cloned()
            .map(GraphNode::new)
    }

    /// Convert into a typed value.
    pub fn get_as<T>(&self) -> GraphResult<T>
    where
        T: TryFrom<GraphValue, Error = GraphError>,
    {
        T::try_from(self.value.clone())
    }

    /// As a vertex.
    pub fn as_vertex(&self) -> GraphResult<Vertex> {
        self.get_as()
    }

    /// As an edge.
    pub fn as_edge(&self) -> GraphResult<Edge> {
        self.get_as()
    }

    /// As a vertex property.
    pub fn as_vertex_property(&self) -> GraphResult<VertexProperty> {
        match &self.value {
            GraphValue::VertexProperty(p) => Ok((**p).clone()),
            other => Err(mismatch("VertexProperty", other)),
        }
    }

    /// As a property.
    pub fn as_property(&self) -> GraphResult<Property> {
        match &self.value {
            GraphValue::Property(p) => Ok((**p).clone()),
            other => Err(mismatch("Property", other)),
        }
    }

    /// As a boolean.
    pub fn as_bool(&self) -> GraphResult<bool> {
        self.get_as()
    }

    /// As an integer.
    pub fn as_i64(&self) -> GraphResult<i64> {
        self.get_as()
    }

    /// As a floating point number.
    pub fn as_f64(&self) -> GraphResult<f64> {
        self.get_as()
    }

    /// As a string.
    pub fn as_string(&self) -> GraphResult<String> {
        self.get_as()
    }
}

fn mismatch(expected: &str, actual: &GraphValue) -> GraphError {
    GraphError::type_conversion(format!(
        "expected {}, got {}",
        expected,
        actual.type_name()
    ))
}

impl From<GraphValue> for GraphNode {
    fn from(value: GraphValue) -> Self {
        Self::new(value)
    }
}

impl fmt::Display for GraphNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value)
    }
}
