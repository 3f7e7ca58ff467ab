//! Graph Types
//!
//! Values exchanged with the graph server: scalars, collections, graph
//! elements and traversal bytecode.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Duration, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

use super::error::{GraphError, GraphResult};
use super::numeric::{BigDecimal, BigInteger};

// ============================================================================
// GraphValue
// ============================================================================

/// A value that can be sent as a parameter or returned as a result.
#[derive(Debug, Clone, PartialEq)]
pub enum GraphValue {
    /// Null
    Null,
    /// Boolean
    Boolean(bool),
    /// 8-bit integer
    Byte(i8),
    /// 16-bit integer
    Short(i16),
    /// 32-bit integer
    Int(i32),
    /// 64-bit integer
    Long(i64),
    /// 32-bit float
    Float(f32),
    /// 64-bit float
    Double(f64),
    /// Arbitrary-precision integer
    BigInteger(BigInteger),
    /// Arbitrary-precision decimal
    BigDecimal(BigDecimal),
    /// String
    String(String),
    /// UUID
    Uuid(Uuid),
    /// Point in time, millisecond precision on the wire. Use
    /// [`GraphValue::date`] for a value that survives encoding unchanged.
    Date(DateTime<Utc>),
    /// Date and time without a zone
    LocalDateTime(NaiveDateTime),
    /// Time span, nanosecond precision
    Duration(Duration),
    /// Raw bytes
    Bytes(Vec<u8>),
    /// Ordered list
    List(Vec<GraphValue>),
    /// Set (order is preserved as received)
    Set(Vec<GraphValue>),
    /// Map with arbitrary keys, in insertion order
    Map(Vec<(GraphValue, GraphValue)>),
    /// Vertex
    Vertex(Box<Vertex>),
    /// Edge
    Edge(Box<Edge>),
    /// Vertex property
    VertexProperty(Box<VertexProperty>),
    /// Edge or meta property
    Property(Box<Property>),
    /// Traverser (value with bulk)
    Traverser(Box<Traverser>),
    /// Traversal bytecode
    Bytecode(Bytecode),
    /// Geometry point
    Point(Point),
}

impl GraphValue {
    /// Null check.
    pub fn is_null(&self) -> bool {
        matches!(self, GraphValue::Null)
    }

    /// Get as boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            GraphValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    /// Date truncated to millisecond precision.
    pub fn date(value: DateTime<Utc>) -> Self {
        let millis = value.timestamp_millis();
        GraphValue::Date(Utc.timestamp_millis_opt(millis).single().unwrap_or(value))
    }

    /// Get as integer, widening the smaller integer types.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            GraphValue::Byte(b) => Some(i64::from(*b)),
            GraphValue::Short(s) => Some(i64::from(*s)),
            GraphValue::Int(i) => Some(*i as i64),
            GraphValue::Long(l) => Some(*l),
            GraphValue::BigInteger(b) => b.to_i64(),
            _ => None,
        }
    }

    /// Get as float, widening integers and `Float`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            GraphValue::Float(f) => Some(*f as f64),
            GraphValue::Double(d) => Some(*d),
            GraphValue::BigDecimal(d) => d.to_f64(),
            other => other.as_i64().map(|i| i as f64),
        }
    }

    /// Get as string slice.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            GraphValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Get as list or set items.
    pub fn as_list(&self) -> Option<&[GraphValue]> {
        match self {
            GraphValue::List(items) | GraphValue::Set(items) => Some(items),
            _ => None,
        }
    }

    /// Get map entries.
    pub fn as_map(&self) -> Option<&[(GraphValue, GraphValue)]> {
        match self {
            GraphValue::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Look up a map entry by string key.
    pub fn get(&self, key: &str) -> Option<&GraphValue> {
        self.as_map()?
            .iter()
            .find(|(k, _)| k.as_str() == Some(key))
            .map(|(_, v)| v)
    }

    /// Type name, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            GraphValue::Null => "Null",
            GraphValue::Boolean(_) => "Boolean",
            GraphValue::Byte(_) => "Byte",
            GraphValue::Short(_) => "Short",
            GraphValue::Int(_) => "Int",
            GraphValue::Long(_) => "Long",
            GraphValue::Float(_) => "Float",
            GraphValue::Double(_) => "Double",
            GraphValue::BigInteger(_) => "BigInteger",
            GraphValue::BigDecimal(_) => "BigDecimal",
            GraphValue::String(_) => "String",
            GraphValue::Uuid(_) => "UUID",
            GraphValue::Date(_) => "Date",
            GraphValue::LocalDateTime(_) => "LocalDateTime",
            GraphValue::Duration(_) => "Duration",
            GraphValue::Bytes(_) => "ByteBuffer",
            GraphValue::List(_) => "List",
            GraphValue::Set(_) => "Set",
            GraphValue::Map(_) => "Map",
            GraphValue::Vertex(_) => "Vertex",
            GraphValue::Edge(_) => "Edge",
            GraphValue::VertexProperty(_) => "VertexProperty",
            GraphValue::Property(_) => "Property",
            GraphValue::Traverser(_) => "Traverser",
            GraphValue::Bytecode(_) => "Bytecode",
            GraphValue::Point(_) => "Point",
        }
    }

    /// Build a map value from string-keyed parameters.
    pub fn from_params(params: &BTreeMap<String, GraphValue>) -> Self {
        GraphValue::Map(
            params
                .iter()
                .map(|(k, v)| (GraphValue::String(k.clone()), v.clone()))
                .collect(),
        )
    }
}

impl fmt::Display for GraphValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GraphValue::Null => write!(f, "null"),
            GraphValue::Boolean(b) => write!(f, "{}", b),
            GraphValue::Byte(b) => write!(f, "{}", b),
            GraphValue::Short(s) => write!(f, "{}", s),
            GraphValue::Int(i) => write!(f, "{}", i),
            GraphValue::Long(l) => write!(f, "{}", l),
            GraphValue::Float(v) => write!(f, "{}", v),
            GraphValue::Double(v) => write!(f, "{}", v),
            GraphValue::BigInteger(v) => write!(f, "{}", v),
            GraphValue::BigDecimal(v) => write!(f, "{}", v),
            GraphValue::String(s) => write!(f, "\"{}\"", s),
            GraphValue::Uuid(u) => write!(f, "{}", u),
            GraphValue::Date(d) => write!(f, "{}", d.to_rfc3339()),
            GraphValue::LocalDateTime(d) => write!(f, "{}", d),
            GraphValue::Duration(d) => write!(f, "{}", d),
            GraphValue::Bytes(b) => write!(f, "<{} bytes>", b.len()),
            GraphValue::List(items) | GraphValue::Set(items) => {
                write!(f, "[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}", item)?;
                }
                write!(f, "]")
            }
            GraphValue::Map(entries) => {
                write!(f, "{{")?;
                for (i, (k, v)) in entries.iter().enumerate() {
                    if i > 0 {
                        write!(f, ", ")?;
                    }
                    write!(f, "{}: {}", k, v)?;
                }
                write!(f, "}}")
            }
            GraphValue::Vertex(v) => write!(f, "{}", v),
            GraphValue::Edge(e) => write!(f, "{}", e),
            GraphValue::VertexProperty(p) => write!(f, "vp[{}->{}]", p.label, p.value),
            GraphValue::Property(p) => write!(f, "p[{}->{}]", p.key, p.value),
            GraphValue::Traverser(t) => write!(f, "{}x{}", t.value, t.bulk),
            GraphValue::Bytecode(b) => write!(f, "{}", b),
            GraphValue::Point(p) => write!(f, "{}", p),
        }
    }
}

// ============================================================================
// From conversions
// ============================================================================

impl From<bool> for GraphValue {
    fn from(v: bool) -> Self {
        GraphValue::Boolean(v)
    }
}

impl From<i8> for GraphValue {
    fn from(v: i8) -> Self {
        GraphValue::Byte(v)
    }
}

impl From<i16> for GraphValue {
    fn from(v: i16) -> Self {
        GraphValue::Short(v)
    }
}

impl From<i32> for GraphValue {
    fn from(v: i32) -> Self {
        GraphValue::Int(v)
    }
}

impl From<i64> for GraphValue {
    fn from(v: i64) -> Self {
        GraphValue::Long(v)
    }
}

impl From<f32> for GraphValue {
    fn from(v: f32) -> Self {
        GraphValue::Float(v)
    }
}

impl From<f64> for GraphValue {
    fn from(v: f64) -> Self {
        GraphValue::Double(v)
    }
}

impl From<String> for GraphValue {
    fn from(v: String) -> Self {
        GraphValue::String(v)
    }
}

impl From<&str> for GraphValue {
    fn from(v: &str) -> Self {
        GraphValue::String(v.to_string())
    }
}

impl From<Uuid> for GraphValue {
    fn from(v: Uuid) -> Self {
        GraphValue::Uuid(v)
    }
}

impl From<DateTime<Utc>> for GraphValue {
    fn from(v: DateTime<Utc>) -> Self {
        GraphValue::date(v)
    }
}

impl From<NaiveDateTime> for GraphValue {
    fn from(v: NaiveDateTime) -> Self {
        GraphValue::LocalDateTime(v)
    }
}

impl From<Duration> for GraphValue {
    fn from(v: Duration) -> Self {
        GraphValue::Duration(v)
    }
}

impl From<BigInteger> for GraphValue {
    fn from(v: BigInteger) -> Self {
        GraphValue::BigInteger(v)
    }
}

impl From<BigDecimal> for GraphValue {
    fn from(v: BigDecimal) -> Self {
        GraphValue::BigDecimal(v)
    }
}

impl From<Point> for GraphValue {
    fn from(v: Point) -> Self {
        GraphValue::Point(v)
    }
}

impl From<Bytecode> for GraphValue {
    fn from(v: Bytecode) -> Self {
        GraphValue::Bytecode(v)
    }
}

impl From<Vertex> for GraphValue {
    fn from(v: Vertex) -> Self {
        GraphValue::Vertex(Box::new(v))
    }
}

impl From<Edge> for GraphValue {
    fn from(v: Edge) -> Self {
        GraphValue::Edge(Box::new(v))
    }
}

impl<T: Into<GraphValue>> From<Vec<T>> for GraphValue {
    fn from(v: Vec<T>) -> Self {
        GraphValue::List(v.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<GraphValue>> From<Option<T>> for GraphValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(GraphValue::Null)
    }
}

// ============================================================================
// TryFrom conversions
// ============================================================================

impl TryFrom<GraphValue> for bool {
    type Error = GraphError;

    fn try_from(value: GraphValue) -> GraphResult<Self> {
        value
            .as_bool()
            .ok_or_else(|| conversion_error("bool", &value))
    }
}

impl TryFrom<GraphValue> for i64 {
    type Error = GraphError;

    fn try_from(value: GraphValue) -> GraphResult<Self> {
        value.as_i64().ok_or_else(|| conversion_error("i64", &value))
    }
}

impl TryFrom<GraphValue> for f64 {
    type Error = GraphError;

    fn try_from(value: GraphValue) -> GraphResult<Self> {
        value.as_f64().ok_or_else(|| conversion_error("f64", &value))
    }
}

impl TryFrom<GraphValue> for String {
    type Error = GraphError;

    fn try_from(value: GraphValue) -> GraphResult<Self> {
        match value {
            GraphValue::String(s) => Ok(s),
            other => Err(conversion_error("String", &other)),
        }
    }
}

impl TryFrom<GraphValue> for Vertex {
    type Error = GraphError;

    fn try_from(value: GraphValue) -> GraphResult<Self> {
        match value {
            GraphValue::Vertex(v) => Ok(*v),
            other => Err(conversion_error("Vertex", &other)),
        }
    }
}

impl TryFrom<GraphValue> for Edge {
    type Error = GraphError;

    fn try_from(value: GraphValue) -> GraphResult<Self> {
        match value {
            GraphValue::Edge(e) => Ok(*e),
            other => Err(conversion_error("Edge", &other)),
        }
    }
}

fn conversion_error(target: &str, value: &GraphValue) -> GraphError {
    GraphError::type_conversion(format!("Cannot convert {} to {}", value.type_name(), target))
}

// ============================================================================
// Duration parts
// ============================================================================

/// Split a duration into whole seconds (floored) and non-negative nanos.
pub(crate) fn duration_parts(duration: &Duration) -> (i64, i32) {
    let seconds = duration.num_seconds();
    let nanos = duration.subsec_nanos();
    if nanos < 0 {
        (seconds - 1, nanos + 1_000_000_000)
    } else {
        (seconds, nanos)
    }
}

/// Inverse of [`duration_parts`]; `None` when out of range.
pub(crate) fn duration_from_parts(seconds: i64, nanos: i32) -> Option<Duration> {
    let nanos = u32::try_from(nanos).ok().filter(|n| *n < 1_000_000_000)?;
    Duration::new(seconds, nanos)
}

// ============================================================================
// Graph elements
// ============================================================================

/// Vertex.
#[derive(Debug, Clone, PartialEq)]
pub struct Vertex {
    /// Vertex id
    pub id: GraphValue,
    /// Vertex label
    pub label: String,
    /// Vertex properties (not carried by GraphBinary)
    pub properties: Vec<VertexProperty>,
}

impl Vertex {
    /// Create a vertex without properties.
    pub fn new(id: impl Into<GraphValue>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            properties: Vec::new(),
        }
    }

    /// Add a property.
    pub fn with_property(mut self, property: VertexProperty) -> Self {
        self.properties.push(property);
        self
    }

    /// All properties with the given key.
    pub fn properties(&self, key: &str) -> impl Iterator<Item = &VertexProperty> {
        let key = key.to_string();
        self.properties.iter().filter(move |p| p.label == key)
    }

    /// First property value with the given key.
    pub fn value(&self, key: &str) -> Option<&GraphValue> {
        self.properties(key).next().map(|p| &p.value)
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v[{}]", self.id)
    }
}

/// Edge.
#[derive(Debug, Clone, PartialEq)]
pub struct Edge {
    /// Edge id
    pub id: GraphValue,
    /// Edge label
    pub label: String,
    /// Incoming vertex id
    pub in_v: GraphValue,
    /// Incoming vertex label
    pub in_v_label: String,
    /// Outgoing vertex id
    pub out_v: GraphValue,
    /// Outgoing vertex label
    pub out_v_label: String,
    /// Edge properties
    pub properties: Vec<Property>,
}

impl Edge {
    /// Create an edge without properties.
    pub fn new(
        id: impl Into<GraphValue>,
        label: impl Into<String>,
        out_v: Vertex,
        in_v: Vertex,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            in_v: in_v.id,
            in_v_label: in_v.label,
            out_v: out_v.id,
            out_v_label: out_v.label,
            properties: Vec::new(),
        }
    }

    /// Add a property.
    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        self.properties.push(Property::new(key, value));
        self
    }

    /// Property value by key.
    pub fn value(&self, key: &str) -> Option<&GraphValue> {
        self.properties.iter().find(|p| p.key == key).map(|p| &p.value)
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "e[{}][{}-{}->{}]",
            self.id, self.out_v, self.label, self.in_v
        )
    }
}

/// Vertex property.
#[derive(Debug, Clone, PartialEq)]
pub struct VertexProperty {
    /// Property id
    pub id: GraphValue,
    /// Property key
    pub label: String,
    /// Property value
    pub value: GraphValue,
    /// Meta properties
    pub properties: Vec<Property>,
}

impl VertexProperty {
    /// Create a vertex property.
    pub fn new(
        id: impl Into<GraphValue>,
        label: impl Into<String>,
        value: impl Into<GraphValue>,
    ) -> Self {
        Self {
            id: id.into(),
            label: label.into(),
            value: value.into(),
            properties: Vec::new(),
        }
    }
}

/// Edge property or vertex meta property.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property key
    pub key: String,
    /// Property value
    pub value: GraphValue,
}

impl Property {
    /// Create a property.
    pub fn new(key: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// A result value together with how many times it occurs.
#[derive(Debug, Clone, PartialEq)]
pub struct Traverser {
    /// Occurrence count
    pub bulk: i64,
    /// Value
    pub value: GraphValue,
}

impl Traverser {
    /// Create a traverser.
    pub fn new(value: impl Into<GraphValue>, bulk: i64) -> Self {
        Self {
            bulk,
            value: value.into(),
        }
    }
}

// ============================================================================
// Bytecode
// ============================================================================

/// One traversal source or step instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Operator name, e.g. `V` or `has`
    pub operator: String,
    /// Arguments
    pub arguments: Vec<GraphValue>,
}

impl Instruction {
    /// Create an instruction.
    pub fn new(operator: impl Into<String>, arguments: Vec<GraphValue>) -> Self {
        Self {
            operator: operator.into(),
            arguments,
        }
    }
}

/// Serializable representation of a traversal.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Bytecode {
    /// Traversal source instructions, e.g. `withSideEffect`
    pub sources: Vec<Instruction>,
    /// Step instructions
    pub steps: Vec<Instruction>,
}

impl Bytecode {
    /// Create empty bytecode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a step.
    pub fn add_step(mut self, operator: impl Into<String>, arguments: Vec<GraphValue>) -> Self {
        self.steps.push(Instruction::new(operator, arguments));
        self
    }

    /// Append a source instruction.
    pub fn add_source(mut self, operator: impl Into<String>, arguments: Vec<GraphValue>) -> Self {
        self.sources.push(Instruction::new(operator, arguments));
        self
    }

    /// Check if there are no instructions.
    pub fn is_empty(&self) -> bool {
        self.sources.is_empty() && self.steps.is_empty()
    }
}

impl fmt::Display for Bytecode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "g")?;
        for step in self.sources.iter().chain(self.steps.iter()) {
            write!(f, ".{}(", step.operator)?;
            for (i, arg) in step.arguments.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

// ============================================================================
// Geometry
// ============================================================================

/// 2D geometry point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    /// X coordinate
    pub x: f64,
    /// Y coordinate
    pub y: f64,
}

impl Point {
    /// Create a point.
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Well-known text form.
    pub fn to_wkt(&self) -> String {
        format!("POINT ({} {})", self.x, self.y)
    }

    /// Parse the well-known text form.
    pub fn from_wkt(wkt: &str) -> GraphResult<Self> {
        let inner = wkt
            .trim()
            .strip_prefix("POINT")
            .map(str::trim)
            .and_then(|s| s.strip_prefix('('))
            .and_then(|s| s.strip_suffix(')'))
            .ok_or_else(|| GraphError::serialization(format!("Invalid WKT point: {}", wkt)))?;

        let coords: Vec<f64> = inner
            .split_whitespace()
            .map(str::parse)
            .collect::<Result<_, _>>()
            .map_err(|_| GraphError::serialization(format!("Invalid WKT point: {}", wkt)))?;

        match coords.as_slice() {
            [x, y] => Ok(Self::new(*x, *y)),
            _ => Err(GraphError::serialization(format!("Invalid WKT point: {}", wkt))),
        }
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_wkt())
    }
}
