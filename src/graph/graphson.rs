//! GraphSON textual formats.
//!
//! - GraphSON 1.0: plain JSON, no type information
//! - GraphSON 2.0: typed scalars and elements (`{"@type": .., "@value": ..}`),
//!   plain JSON arrays and objects for collections
//! - GraphSON 3.0: like 2.0, with typed `g:List`, `g:Set` and `g:Map`

use serde_json::{json, Map, Value};

use chrono::{Duration, NaiveDateTime, TimeZone, Utc};
use uuid::Uuid;

use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::numeric::{BigDecimal, BigInteger};
use super::types::{
    duration_from_parts, duration_parts, Bytecode, Edge, GraphValue, Instruction, Point, Property,
    Traverser, Vertex, VertexProperty,
};

const LOCAL_DATE_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.f";
const NANOS_PER_SECOND: i128 = 1_000_000_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Version {
    V1,
    V2,
    V3,
}

impl Version {
    fn of(protocol: GraphProtocol) -> GraphResult<Self> {
        match protocol {
            GraphProtocol::GraphSon1 => Ok(Version::V1),
            GraphProtocol::GraphSon2 => Ok(Version::V2),
            GraphProtocol::GraphSon3 => Ok(Version::V3),
            GraphProtocol::GraphBinary1 => Err(GraphError::serialization(
                "graph-binary-1.0 is not a GraphSON format",
            )),
        }
    }

    fn typed(self) -> bool {
        self != Version::V1
    }
}

/// Serialize a value to GraphSON bytes.
pub fn serialize(value: &GraphValue, protocol: GraphProtocol) -> GraphResult<Vec<u8>> {
    let json = to_json(value, Version::of(protocol)?)?;
    serde_json::to_vec(&json).map_err(|e| GraphError::serialization(e.to_string()))
}

/// Deserialize GraphSON bytes into a value.
pub fn deserialize(bytes: &[u8], protocol: GraphProtocol) -> GraphResult<GraphValue> {
    let version = Version::of(protocol)?;
    let json: Value = serde_json::from_slice(bytes)
        .map_err(|e| GraphError::serialization(format!("Malformed GraphSON document: {}", e)))?;
    from_json(json, version)
}

// ============================================================================
// Encoding
// ============================================================================

fn typed(type_name: &str, value: Value) -> Value {
    json!({ "@type": type_name, "@value": value })
}

fn to_json(value: &GraphValue, version: Version) -> GraphResult<Value> {
    let v = version;
    Ok(match value {
        GraphValue::Null => Value::Null,
        GraphValue::Boolean(b) => Value::Bool(*b),
        GraphValue::String(s) => Value::String(s.clone()),
        GraphValue::Byte(b) if v.typed() => typed("gx:Byte", json!(b)),
        GraphValue::Byte(b) => json!(b),
        GraphValue::Short(i) if v.typed() => typed("gx:Int16", json!(i)),
        GraphValue::Short(i) => json!(i),
        GraphValue::Int(i) if v.typed() => typed("g:Int32", json!(i)),
        GraphValue::Int(i) => json!(i),
        GraphValue::Long(l) if v.typed() => typed("g:Int64", json!(l)),
        GraphValue::Long(l) => json!(l),
        GraphValue::Float(f) if v.typed() => typed("g:Float", json!(f)),
        GraphValue::Float(f) => json!(f),
        GraphValue::Double(d) if v.typed() => typed("g:Double", json!(d)),
        GraphValue::Double(d) => json!(d),
        GraphValue::BigInteger(b) => {
            // Beyond 64 bits the digits travel as a string
            let number = match b.to_i64() {
                Some(i) => json!(i),
                None => json!(b.to_string()),
            };
            if v.typed() {
                typed("gx:BigInteger", number)
            } else {
                number
            }
        }
        GraphValue::BigDecimal(d) if v.typed() => typed("gx:BigDecimal", json!(d.to_string())),
        GraphValue::BigDecimal(d) => json!(d.to_string()),
        GraphValue::LocalDateTime(d) => {
            let text = json!(d.format(LOCAL_DATE_TIME_FORMAT).to_string());
            if v.typed() {
                typed("gx:LocalDateTime", text)
            } else {
                text
            }
        }
        GraphValue::Duration(d) if v.typed() => typed("gx:Duration", json!(format_duration(d))),
        GraphValue::Duration(d) => json!(format_duration(d)),
        GraphValue::Uuid(u) if v.typed() => typed("g:UUID", json!(u.to_string())),
        GraphValue::Uuid(u) => json!(u.to_string()),
        GraphValue::Date(d) if v.typed() => typed("g:Date", json!(d.timestamp_millis())),
        GraphValue::Date(d) => json!(d.timestamp_millis()),
        GraphValue::Bytes(_) => {
            return Err(GraphError::serialization(
                "ByteBuffer values cannot be written as GraphSON",
            ))
        }
        GraphValue::List(items) => {
            let array = items_to_json(items, v)?;
            if v == Version::V3 {
                typed("g:List", array)
            } else {
                array
            }
        }
        GraphValue::Set(items) => {
            let array = items_to_json(items, v)?;
            if v == Version::V3 {
                typed("g:Set", array)
            } else {
                array
            }
        }
        GraphValue::Map(entries) => map_to_json(entries, v)?,
        GraphValue::Vertex(vertex) => vertex_to_json(vertex, v)?,
        GraphValue::Edge(edge) => edge_to_json(edge, v)?,
        GraphValue::VertexProperty(p) => vertex_property_to_json(p, v)?,
        GraphValue::Property(p) => {
            let body = json!({ "key": p.key, "value": to_json(&p.value, v)? });
            if v.typed() {
                typed("g:Property", body)
            } else {
                body
            }
        }
        GraphValue::Traverser(t) => {
            if v.typed() {
                typed(
                    "g:Traverser",
                    json!({ "bulk": typed("g:Int64", json!(t.bulk)), "value": to_json(&t.value, v)? }),
                )
            } else {
                json!({ "bulk": t.bulk, "value": to_json(&t.value, v)? })
            }
        }
        GraphValue::Bytecode(b) => {
            if !v.typed() {
                return Err(GraphError::serialization(
                    "GraphSON 1.0 cannot carry bytecode",
                ));
            }
            typed("g:Bytecode", bytecode_to_json(b, v)?)
        }
        GraphValue::Point(p) if v.typed() => typed("dse:Point", json!(p.to_wkt())),
        GraphValue::Point(p) => json!(p.to_wkt()),
    })
}

/// ISO-8601 seconds form, e.g. `PT-1.5S`.
fn format_duration(duration: &Duration) -> String {
    let (seconds, nanos) = duration_parts(duration);
    let total = i128::from(seconds) * NANOS_PER_SECOND + i128::from(nanos);
    let sign = if total < 0 { "-" } else { "" };
    let abs = total.unsigned_abs();
    let whole = abs / NANOS_PER_SECOND as u128;
    let fraction = abs % NANOS_PER_SECOND as u128;
    if fraction == 0 {
        format!("PT{}{}S", sign, whole)
    } else {
        let digits = format!("{:09}", fraction);
        format!("PT{}{}.{}S", sign, whole, digits.trim_end_matches('0'))
    }
}

fn items_to_json(items: &[GraphValue], v: Version) -> GraphResult<Value> {
    Ok(Value::Array(
        items
            .iter()
            .map(|item| to_json(item, v))
            .collect::<GraphResult<_>>()?,
    ))
}

fn map_to_json(entries: &[(GraphValue, GraphValue)], v: Version) -> GraphResult<Value> {
    if v == Version::V3 {
        let mut flat = Vec::with_capacity(entries.len() * 2);
        for (key, value) in entries {
            flat.push(to_json(key, v)?);
            flat.push(to_json(value, v)?);
        }
        return Ok(typed("g:Map", Value::Array(flat)));
    }

    let mut object = Map::new();
    for (key, value) in entries {
        let key = key.as_str().ok_or_else(|| {
            GraphError::serialization(format!(
                "GraphSON {} map keys must be strings, got {}",
                if v == Version::V1 { "1.0" } else { "2.0" },
                key.type_name()
            ))
        })?;
        object.insert(key.to_string(), to_json(value, v)?);
    }
    Ok(Value::Object(object))
}

fn vertex_to_json(vertex: &Vertex, v: Version) -> GraphResult<Value> {
    let mut properties = Map::new();
    for property in &vertex.properties {
        let entry = properties
            .entry(property.label.clone())
            .or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(list) = entry {
            list.push(vertex_property_to_json(property, v)?);
        }
    }

    let mut body = Map::new();
    body.insert("id".into(), to_json(&vertex.id, v)?);
    body.insert("label".into(), json!(vertex.label));
    if !v.typed() {
        body.insert("type".into(), json!("vertex"));
    }
    if !properties.is_empty() {
        body.insert("properties".into(), Value::Object(properties));
    }

    let body = Value::Object(body);
    Ok(if v.typed() { typed("g:Vertex", body) } else { body })
}

fn vertex_property_to_json(property: &VertexProperty, v: Version) -> GraphResult<Value> {
    let mut body = Map::new();
    body.insert("id".into(), to_json(&property.id, v)?);
    body.insert("value".into(), to_json(&property.value, v)?);
    body.insert("label".into(), json!(property.label));
    if !property.properties.is_empty() {
        let mut meta = Map::new();
        for p in &property.properties {
            meta.insert(p.key.clone(), to_json(&p.value, v)?);
        }
        body.insert("properties".into(), Value::Object(meta));
    }

    let body = Value::Object(body);
    Ok(if v.typed() {
        typed("g:VertexProperty", body)
    } else {
        body
    })
}

fn edge_to_json(edge: &Edge, v: Version) -> GraphResult<Value> {
    let mut properties = Map::new();
    for p in &edge.properties {
        let value = if v.typed() {
            typed("g:Property", json!({ "key": p.key, "value": to_json(&p.value, v)? }))
        } else {
            to_json(&p.value, v)?
        };
        properties.insert(p.key.clone(), value);
    }

    let mut body = Map::new();
    body.insert("id".into(), to_json(&edge.id, v)?);
    body.insert("label".into(), json!(edge.label));
    if !v.typed() {
        body.insert("type".into(), json!("edge"));
    }
    body.insert("inVLabel".into(), json!(edge.in_v_label));
    body.insert("outVLabel".into(), json!(edge.out_v_label));
    body.insert("inV".into(), to_json(&edge.in_v, v)?);
    body.insert("outV".into(), to_json(&edge.out_v, v)?);
    if !properties.is_empty() {
        body.insert("properties".into(), Value::Object(properties));
    }

    let body = Value::Object(body);
    Ok(if v.typed() { typed("g:Edge", body) } else { body })
}

fn bytecode_to_json(bytecode: &Bytecode, v: Version) -> GraphResult<Value> {
    let encode = |instructions: &[Instruction]| -> GraphResult<Value> {
        let mut list = Vec::with_capacity(instructions.len());
        for instruction in instructions {
            let mut entry = vec![json!(instruction.operator)];
            for argument in &instruction.arguments {
                entry.push(to_json(argument, v)?);
            }
            list.push(Value::Array(entry));
        }
        Ok(Value::Array(list))
    };

    let mut body = Map::new();
    if !bytecode.steps.is_empty() {
        body.insert("step".into(), encode(&bytecode.steps)?);
    }
    if !bytecode.sources.is_empty() {
        body.insert("source".into(), encode(&bytecode.sources)?);
    }
    Ok(Value::Object(body))
}

// ============================================================================
// Decoding
// ============================================================================

fn malformed(msg: impl std::fmt::Display) -> GraphError {
    GraphError::serialization(format!("Malformed GraphSON: {}", msg))
}

fn from_json(json: Value, v: Version) -> GraphResult<GraphValue> {
    match json {
        Value::Null => Ok(GraphValue::Null),
        Value::Bool(b) => Ok(GraphValue::Boolean(b)),
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(GraphValue::Long(i)),
            None => n
                .as_f64()
                .map(GraphValue::Double)
                .ok_or_else(|| malformed(format!("number out of range: {}", n))),
        },
        Value::String(s) => Ok(GraphValue::String(s)),
        Value::Array(items) => Ok(GraphValue::List(items_from_json(items, v)?)),
        Value::Object(mut object) => {
            if v.typed() {
                if let Some(Value::String(type_name)) = object.get("@type") {
                    let type_name = type_name.clone();
                    if let Some(value) = object.remove("@value") {
                        return typed_from_json(&type_name, value, v);
                    }
                }
            } else {
                match object.get("type").and_then(Value::as_str) {
                    Some("vertex") => return vertex_from_json(object, v),
                    Some("edge") => return edge_from_json(object, v),
                    _ => {}
                }
            }

            let entries = object
                .into_iter()
                .map(|(k, value)| Ok((GraphValue::String(k), from_json(value, v)?)))
                .collect::<GraphResult<_>>()?;
            Ok(GraphValue::Map(entries))
        }
    }
}

fn items_from_json(items: Vec<Value>, v: Version) -> GraphResult<Vec<GraphValue>> {
    items.into_iter().map(|item| from_json(item, v)).collect()
}

fn typed_from_json(type_name: &str, value: Value, v: Version) -> GraphResult<GraphValue> {
    match type_name {
        "g:Int32" => {
            let i = value.as_i64().ok_or_else(|| malformed("g:Int32 is not an integer"))?;
            i32::try_from(i)
                .map(GraphValue::Int)
                .map_err(|_| malformed(format!("g:Int32 out of range: {}", i)))
        }
        "gx:Byte" => {
            let i = value.as_i64().ok_or_else(|| malformed("gx:Byte is not an integer"))?;
            i8::try_from(i)
                .map(GraphValue::Byte)
                .map_err(|_| malformed(format!("gx:Byte out of range: {}", i)))
        }
        "gx:Int16" => {
            let i = value.as_i64().ok_or_else(|| malformed("gx:Int16 is not an integer"))?;
            i16::try_from(i)
                .map(GraphValue::Short)
                .map_err(|_| malformed(format!("gx:Int16 out of range: {}", i)))
        }
        "gx:BigInteger" => {
            let parsed = match &value {
                Value::Number(n) => match (n.as_i64(), n.as_u64()) {
                    (Some(i), _) => Some(BigInteger::from(i)),
                    (None, Some(u)) => Some(BigInteger::from(u)),
                    _ => None,
                },
                Value::String(text) => text.parse().ok(),
                _ => None,
            };
            parsed
                .map(GraphValue::BigInteger)
                .ok_or_else(|| malformed(format!("gx:BigInteger is not an exact integer: {}", value)))
        }
        "gx:BigDecimal" => {
            let text = match &value {
                Value::Number(n) => n.to_string(),
                Value::String(text) => text.clone(),
                other => return Err(malformed(format!("gx:BigDecimal is not a number: {}", other))),
            };
            text.parse::<BigDecimal>()
                .map(GraphValue::BigDecimal)
                .map_err(|_| malformed(format!("gx:BigDecimal is not a decimal: {}", text)))
        }
        "gx:LocalDateTime" => {
            let text = value
                .as_str()
                .ok_or_else(|| malformed("gx:LocalDateTime is not a string"))?;
            NaiveDateTime::parse_from_str(text, LOCAL_DATE_TIME_FORMAT)
                .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M"))
                .map(GraphValue::LocalDateTime)
                .map_err(|e| malformed(format!("gx:LocalDateTime {:?}: {}", text, e)))
        }
        "gx:Duration" => {
            let text = value.as_str().ok_or_else(|| malformed("gx:Duration is not a string"))?;
            parse_duration(text)
                .map(GraphValue::Duration)
                .ok_or_else(|| malformed(format!("gx:Duration {:?}", text)))
        }
        "g:Int64" => value
            .as_i64()
            .map(GraphValue::Long)
            .ok_or_else(|| malformed("g:Int64 is not an integer")),
        "g:Float" => value
            .as_f64()
            .map(|f| GraphValue::Float(f as f32))
            .ok_or_else(|| malformed("g:Float is not a number")),
        "g:Double" => value
            .as_f64()
            .map(GraphValue::Double)
            .ok_or_else(|| malformed("g:Double is not a number")),
        "g:UUID" => {
            let text = value.as_str().ok_or_else(|| malformed("g:UUID is not a string"))?;
            Uuid::parse_str(text)
                .map(GraphValue::Uuid)
                .map_err(|e| malformed(e))
        }
        "g:Date" | "g:Timestamp" => {
            let millis = value
                .as_i64()
                .ok_or_else(|| malformed(format!("{} is not an integer", type_name)))?;
            Utc.timestamp_millis_opt(millis)
                .single()
                .map(GraphValue::Date)
                .ok_or_else(|| malformed(format!("date out of range: {}", millis)))
        }
        "g:List" => Ok(GraphValue::List(items_from_json(expect_array(value)?, v)?)),
        "g:Set" => Ok(GraphValue::Set(items_from_json(expect_array(value)?, v)?)),
        "g:Map" => {
            let flat = expect_array(value)?;
            if flat.len() % 2 != 0 {
                return Err(malformed("g:Map has an odd number of items"));
            }
            let mut entries = Vec::with_capacity(flat.len() / 2);
            let mut iter = flat.into_iter();
            while let (Some(key), Some(value)) = (iter.next(), iter.next()) {
                entries.push((from_json(key, v)?, from_json(value, v)?));
            }
            Ok(GraphValue::Map(entries))
        }
        "g:Vertex" => vertex_from_json(expect_object(value)?, v),
        "g:Edge" => edge_from_json(expect_object(value)?, v),
        "g:VertexProperty" => Ok(GraphValue::VertexProperty(Box::new(
            vertex_property_from_json(expect_object(value)?, None, v)?,
        ))),
        "g:Property" => {
            let mut object = expect_object(value)?;
            let key = take_string(&mut object, "key")?;
            let value = from_json(take(&mut object, "value")?, v)?;
            Ok(GraphValue::Property(Box::new(Property { key, value })))
        }
        "g:Traverser" => {
            let mut object = expect_object(value)?;
            let bulk = from_json(take(&mut object, "bulk")?, v)?
                .as_i64()
                .ok_or_else(|| malformed("g:Traverser bulk is not an integer"))?;
            let value = from_json(take(&mut object, "value")?, v)?;
            Ok(GraphValue::Traverser(Box::new(Traverser { bulk, value })))
        }
        "g:Bytecode" => {
            let mut object = expect_object(value)?;
            let steps = match object.remove("step") {
                Some(list) => instructions_from_json(list, v)?,
                None => Vec::new(),
            };
            let sources = match object.remove("source") {
                Some(list) => instructions_from_json(list, v)?,
                None => Vec::new(),
            };
            Ok(GraphValue::Bytecode(Bytecode { sources, steps }))
        }
        "dse:Point" => {
            let wkt = value.as_str().ok_or_else(|| malformed("dse:Point is not a string"))?;
            Ok(GraphValue::Point(Point::from_wkt(wkt)?))
        }
        other => Err(GraphError::serialization(format!(
            "Unsupported GraphSON type: {}",
            other
        ))),
    }
}

/// Parse `[-]P[nD][T[nH][nM][n[.f]S]]`.
fn parse_duration(text: &str) -> Option<Duration> {
    let (negative, rest) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let rest = rest.strip_prefix('P')?;
    let (days, time) = match rest.split_once('T') {
        Some((days, time)) => (days, Some(time)),
        None => (rest, None),
    };
    if days.is_empty() && time.map_or(true, str::is_empty) {
        return None;
    }

    let mut total: i128 = 0;
    if !days.is_empty() {
        let count: i64 = days.strip_suffix('D')?.parse().ok()?;
        total += i128::from(count) * 86_400 * NANOS_PER_SECOND;
    }
    if let Some(mut time) = time {
        for (unit, seconds) in [('H', 3_600), ('M', 60)] {
            if let Some((count, tail)) = time.split_once(unit) {
                let count: i64 = count.parse().ok()?;
                total += i128::from(count) * seconds * NANOS_PER_SECOND;
                time = tail;
            }
        }
        if !time.is_empty() {
            total += parse_seconds(time.strip_suffix('S')?)?;
        }
    }
    if negative {
        total = -total;
    }

    let seconds = i64::try_from(total.div_euclid(NANOS_PER_SECOND)).ok()?;
    let nanos = total.rem_euclid(NANOS_PER_SECOND) as i32;
    duration_from_parts(seconds, nanos)
}

// "[-]whole[.fraction]" in nanoseconds, fraction up to 9 digits
fn parse_seconds(text: &str) -> Option<i128> {
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() || fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let fraction: i128 = if fraction.is_empty() {
        0
    } else {
        format!("{:0<9}", fraction).parse().ok()?
    };
    let nanos = i128::from(whole) * NANOS_PER_SECOND + fraction;
    Some(if negative { -nanos } else { nanos })
}

fn expect_array(value: Value) -> GraphResult<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items),
        other => Err(malformed(format!("expected array, got {}", other))),
    }
}

fn expect_object(value: Value) -> GraphResult<Map<String, Value>> {
    match value {
        Value::Object(object) => Ok(object),
        other => Err(malformed(format!("expected object, got {}", other))),
    }
}

fn take(object: &mut Map<String, Value>, field: &str) -> GraphResult<Value> {
    object
        .remove(field)
        .ok_or_else(|| malformed(format!("missing field '{}'", field)))
}

fn take_string(object: &mut Map<String, Value>, field: &str) -> GraphResult<String> {
    match take(object, field)? {
        Value::String(s) => Ok(s),
        other => Err(malformed(format!("field '{}' is not a string: {}", field, other))),
    }
}

fn vertex_from_json(mut object: Map<String, Value>, v: Version) -> GraphResult<GraphValue> {
    let id = from_json(take(&mut object, "id")?, v)?;
    let label = object
        .remove("label")
        .and_then(|l| l.as_str().map(str::to_string))
        .unwrap_or_else(|| "vertex".to_string());

    let mut properties = Vec::new();
    if let Some(Value::Object(by_key)) = object.remove("properties") {
        for (key, list) in by_key {
            for item in expect_array(list)? {
                let item = match item {
                    Value::Object(mut typed_item) if v.typed() => {
                        typed_item.remove("@value").unwrap_or(Value::Object(typed_item))
                    }
                    other => other,
                };
                properties.push(vertex_property_from_json(
                    expect_object(item)?,
                    Some(&key),
                    v,
                )?);
            }
        }
    }

    Ok(GraphValue::Vertex(Box::new(Vertex {
        id,
        label,
        properties,
    })))
}

fn vertex_property_from_json(
    mut object: Map<String, Value>,
    key: Option<&str>,
    v: Version,
) -> GraphResult<VertexProperty> {
    let id = match object.remove("id") {
        Some(id) => from_json(id, v)?,
        None => GraphValue::Null,
    };
    let value = from_json(take(&mut object, "value")?, v)?;
    let label = match object.remove("label") {
        Some(Value::String(label)) => label,
        _ => key
            .map(str::to_string)
            .ok_or_else(|| malformed("vertex property without label"))?,
    };
    let mut properties = Vec::new();
    if let Some(Value::Object(meta)) = object.remove("properties") {
        for (k, value) in meta {
            properties.push(Property::new(k, from_json(value, v)?));
        }
    }
    Ok(VertexProperty {
        id,
        label,
        value,
        properties,
    })
}

fn edge_from_json(mut object: Map<String, Value>, v: Version) -> GraphResult<GraphValue> {
    let id = from_json(take(&mut object, "id")?, v)?;
    let label = take_string(&mut object, "label")?;
    let in_v = from_json(take(&mut object, "inV")?, v)?;
    let out_v = from_json(take(&mut object, "outV")?, v)?;
    let in_v_label = take_string(&mut object, "inVLabel").unwrap_or_else(|_| "vertex".into());
    let out_v_label = take_string(&mut object, "outVLabel").unwrap_or_else(|_| "vertex".into());

    let mut properties = Vec::new();
    if let Some(Value::Object(by_key)) = object.remove("properties") {
        for (key, value) in by_key {
            let value = match from_json(value, v)? {
                GraphValue::Property(p) => p.value,
                other => other,
            };
            properties.push(Property { key, value });
        }
    }

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

fn instructions_from_json(list: Value, v: Version) -> GraphResult<Vec<Instruction>> {
    expect_array(list)?
        .into_iter()
        .map(|entry| {
            let mut parts = expect_array(entry)?.into_iter();
            let operator = match parts.next() {
                Some(Value::String(op)) => op,
                _ => return Err(malformed("bytecode instruction without operator")),
            };
            let arguments = parts.map(|arg| from_json(arg, v)).collect::<GraphResult<_>>()?;
            Ok(Instruction {
                operator,
                arguments,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    #[test]
    fn test_serialize_bytecode_v2() {
        let bytecode = Bytecode::new()
            .add_step("V", vec![])
            .add_step("has", vec!["name".into(), GraphValue::Int(1)]);
        let bytes = serialize(&GraphValue::Bytecode(bytecode), GraphProtocol::GraphSon2).unwrap();
        assert_eq!(
            parse(&bytes),
            json!({
                "@type": "g:Bytecode",
                "@value": {
                    "step": [["V"], ["has", "name", {"@type": "g:Int32", "@value": 1}]]
                }
            })
        );
    }

    #[test]
    fn test_bytecode_not_supported_in_v1() {
        let err = serialize(&GraphValue::Bytecode(Bytecode::new()), GraphProtocol::GraphSon1)
            .unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[test]
    fn test_binary_protocol_rejected() {
        let err = serialize(&GraphValue::Int(1), GraphProtocol::GraphBinary1).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));
    }

    #[test]
    fn test_params_map_v2() {
        let params = GraphValue::Map(vec![
            (GraphValue::from("name"), GraphValue::from("marko")),
            (GraphValue::from("age"), GraphValue::Int(29)),
        ]);
        let bytes = serialize(&params, GraphProtocol::GraphSon2).unwrap();
        assert_eq!(
            parse(&bytes),
            json!({"name": "marko", "age": {"@type": "g:Int32", "@value": 29}})
        );

        let non_string_key = GraphValue::Map(vec![(GraphValue::Int(1), GraphValue::Null)]);
        assert!(serialize(&non_string_key, GraphProtocol::GraphSon2).is_err());
    }

    #[test]
    fn test_params_map_v3() {
        let params = GraphValue::Map(vec![(GraphValue::Int(1), GraphValue::from("x"))]);
        let bytes = serialize(&params, GraphProtocol::GraphSon3).unwrap();
        assert_eq!(
            parse(&bytes),
            json!({"@type": "g:Map", "@value": [{"@type": "g:Int32", "@value": 1}, "x"]})
        );
        assert_eq!(deserialize(&bytes, GraphProtocol::GraphSon3).unwrap(), params);
    }

    #[test]
    fn test_deserialize_vertex_v2() {
        let doc = br#"{
            "@type": "g:Vertex",
            "@value": {
                "id": {"@type": "g:Int64", "@value": 1},
                "label": "person",
                "properties": {
                    "name": [{
                        "@type": "g:VertexProperty",
                        "@value": {"id": {"@type": "g:Int64", "@value": 0}, "value": "marko", "label": "name"}
                    }]
                }
            }
        }"#;
        let vertex = Vertex::try_from(deserialize(doc, GraphProtocol::GraphSon2).unwrap()).unwrap();
        assert_eq!(vertex.id, GraphValue::Long(1));
        assert_eq!(vertex.label, "person");
        assert_eq!(vertex.value("name"), Some(&GraphValue::from("marko")));
    }

    #[test]
    fn test_deserialize_edge_v2() {
        let doc = br#"{
            "@type": "g:Edge",
            "@value": {
                "id": {"@type": "g:Int32", "@value": 13},
                "label": "develops",
                "inVLabel": "software",
                "outVLabel": "person",
                "inV": {"@type": "g:Int32", "@value": 10},
                "outV": {"@type": "g:Int32", "@value": 1},
                "properties": {
                    "since": {"@type": "g:Property", "@value": {"key": "since", "value": {"@type": "g:Int32", "@value": 2009}}}
                }
            }
        }"#;
        let edge = Edge::try_from(deserialize(doc, GraphProtocol::GraphSon2).unwrap()).unwrap();
        assert_eq!(edge.label, "develops");
        assert_eq!(edge.in_v, GraphValue::Int(10));
        assert_eq!(edge.out_v_label, "person");
        assert_eq!(edge.value("since"), Some(&GraphValue::Int(2009)));
    }

    #[test]
    fn test_roundtrip_typed() {
        let values = vec![
            GraphValue::from(
                Vertex::new(GraphValue::Long(1), "person")
                    .with_property(VertexProperty::new(GraphValue::Long(2), "name", "marko")),
            ),
            GraphValue::Traverser(Box::new(Traverser::new(GraphValue::from("x"), 3))),
            GraphValue::Point(Point::new(1.0, 2.0)),
            GraphValue::Set(vec![GraphValue::Double(1.5)]),
            GraphValue::Uuid(Uuid::nil()),
        ];
        for value in values {
            let bytes = serialize(&value, GraphProtocol::GraphSon3).unwrap();
            assert_eq!(deserialize(&bytes, GraphProtocol::GraphSon3).unwrap(), value);
        }
    }

    #[test]
    fn test_roundtrip_extended_scalars() {
        let local = chrono::NaiveDate::from_ymd_opt(2020, 1, 31)
            .unwrap()
            .and_hms_milli_opt(8, 30, 0, 250)
            .unwrap();
        let values = vec![
            GraphValue::Byte(-7),
            GraphValue::Short(i16::MAX),
            GraphValue::BigInteger(BigInteger::from(42i64)),
            GraphValue::BigInteger("123456789123456789123456789123456789".parse().unwrap()),
            GraphValue::BigDecimal("12.3400".parse().unwrap()),
            GraphValue::LocalDateTime(local),
            GraphValue::Duration(Duration::milliseconds(-1_500)),
            GraphValue::Duration(Duration::seconds(90)),
        ];
        for value in values {
            for protocol in [GraphProtocol::GraphSon2, GraphProtocol::GraphSon3] {
                let bytes = serialize(&value, protocol).unwrap();
                assert_eq!(deserialize(&bytes, protocol).unwrap(), value);
            }
        }
    }

    #[test]
    fn test_extended_scalar_encoding() {
        let bytes = serialize(&GraphValue::Short(3), GraphProtocol::GraphSon2).unwrap();
        assert_eq!(parse(&bytes), json!({"@type": "gx:Int16", "@value": 3}));

        let bytes = serialize(
            &GraphValue::Duration(Duration::milliseconds(-1_500)),
            GraphProtocol::GraphSon2,
        )
        .unwrap();
        assert_eq!(parse(&bytes), json!({"@type": "gx:Duration", "@value": "PT-1.5S"}));

        let huge: BigInteger = "123456789123456789123456789".parse().unwrap();
        let bytes = serialize(&GraphValue::BigInteger(huge), GraphProtocol::GraphSon2).unwrap();
        assert_eq!(
            parse(&bytes),
            json!({"@type": "gx:BigInteger", "@value": "123456789123456789123456789"})
        );
    }

    #[test]
    fn test_deserialize_server_durations() {
        let cases = [
            ("PT1H2M3.5S", Duration::milliseconds(3_723_500)),
            ("P2D", Duration::days(2)),
            ("P1DT12H", Duration::hours(36)),
            ("PT-0.001S", Duration::milliseconds(-1)),
            ("-PT10M", Duration::minutes(-10)),
            ("PT0S", Duration::zero()),
        ];
        for (text, expected) in cases {
            let doc = json!({"@type": "gx:Duration", "@value": text}).to_string();
            assert_eq!(
                deserialize(doc.as_bytes(), GraphProtocol::GraphSon2).unwrap(),
                GraphValue::Duration(expected),
                "{}",
                text
            );
        }

        for text in ["P", "PT", "1S", "PT1.0000000001S", "PTS", "PT5X"] {
            let doc = json!({"@type": "gx:Duration", "@value": text}).to_string();
            assert!(
                deserialize(doc.as_bytes(), GraphProtocol::GraphSon2).is_err(),
                "{}",
                text
            );
        }
    }

    #[test]
    fn test_malformed_extended_scalars() {
        let docs = [
            r#"{"@type": "gx:Byte", "@value": 300}"#,
            r#"{"@type": "gx:Int16", "@value": "x"}"#,
            r#"{"@type": "gx:BigInteger", "@value": 1.5}"#,
            r#"{"@type": "gx:BigDecimal", "@value": "1.2.3"}"#,
            r#"{"@type": "gx:LocalDateTime", "@value": "2020-13-01T00:00:00"}"#,
        ];
        for doc in docs {
            let err = deserialize(doc.as_bytes(), GraphProtocol::GraphSon2).unwrap_err();
            assert!(matches!(err, GraphError::Serialization(_)), "{}", doc);
        }
    }

    #[test]
    fn test_untyped_v1() {
        let doc = br#"{"id": 1, "label": "person", "type": "vertex",
            "properties": {"name": [{"id": 3, "value": "marko"}]}}"#;
        let vertex = Vertex::try_from(deserialize(doc, GraphProtocol::GraphSon1).unwrap()).unwrap();
        assert_eq!(vertex.id, GraphValue::Long(1));
        assert_eq!(vertex.properties[0].label, "name");

        let bytes = serialize(&GraphValue::Int(5), GraphProtocol::GraphSon1).unwrap();
        assert_eq!(bytes, b"5");
    }

    #[test]
    fn test_malformed_document() {
        let err = deserialize(b"{\"result\":", GraphProtocol::GraphSon2).unwrap_err();
        assert!(matches!(err, GraphError::Serialization(_)));

        let err = deserialize(br#"{"@type": "g:Unknown", "@value": 1}"#, GraphProtocol::GraphSon2)
            .unwrap_err();
        assert!(err.to_string().contains("g:Unknown"));
    }
}
