//! Statement to message conversion.
//!
//! Builds the outbound QUERY message and the option map for a statement
//! under a given sub-protocol:
//!
//! | Statement | GraphBinary | GraphSON |
//! |---|---|---|
//! | script | `Query(text)`, params blob | `Query(text)`, params blob |
//! | fluent / batch | `RawBytesQuery("")`, bytecode in `graph-binary-query` | `RawBytesQuery(json bytecode)` |

use bytes::Bytes;

use super::binary::GraphBinaryModule;
use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::graphson;
use super::options::ResolvedOptions;
use super::paging::PagingSettings;
use super::statement::{GraphStatement, StatementKind};
use super::types::GraphValue;
use crate::protocol::{encode_bigint, encode_text, Message, OptionMap, QueryOptions, RequestFrame};

// ============================================================================
// Option keys
// ============================================================================

/// Traversal source.
pub const GRAPH_SOURCE_KEY: &str = "graph-source";
/// Graph name.
pub const GRAPH_NAME_KEY: &str = "graph-name";
/// Result sub-protocol.
pub const GRAPH_RESULTS_KEY: &str = "graph-results";
/// Query language.
pub const GRAPH_LANG_KEY: &str = "graph-lang";
/// Server-side timeout in milliseconds (BIGINT).
pub const GRAPH_TIMEOUT_KEY: &str = "graph-timeout";
/// Graph read consistency.
pub const GRAPH_READ_CONSISTENCY_KEY: &str = "graph-read-consistency";
/// Graph write consistency.
pub const GRAPH_WRITE_CONSISTENCY_KEY: &str = "graph-write-consistency";
/// Bytecode carried out-of-band under GraphBinary.
pub const GRAPH_BINARY_QUERY_KEY: &str = "graph-binary-query";

/// Language of script statements.
pub const LANGUAGE_GROOVY: &str = "gremlin-groovy";
/// Language of fluent and batch statements.
pub const LANGUAGE_BYTECODE: &str = "bytecode-json";

/// Query string of messages whose payload travels in the option map.
pub const EMPTY_STRING_QUERY: &[u8] = b"";

// ============================================================================
// Serialization helpers
// ============================================================================

/// Serialize a value under the given sub-protocol.
pub fn serialize_value(
    value: &GraphValue,
    protocol: GraphProtocol,
    module: &GraphBinaryModule,
) -> GraphResult<Bytes> {
    if protocol.is_graph_binary() {
        module.serialize(value)
    } else {
        graphson::serialize(value, protocol).map(Bytes::from)
    }
}

/// The traversal payload of a fluent or batch statement.
///
/// Batches are sent as a list of bytecode. Script statements have none.
pub fn bytecode_to_serialize(statement: &GraphStatement) -> Option<GraphValue> {
    match statement.kind() {
        StatementKind::Script { .. } => None,
        StatementKind::Fluent(bytecode) => Some(GraphValue::Bytecode(bytecode.clone())),
        StatementKind::Batch(traversals) => Some(GraphValue::List(
            traversals.iter().cloned().map(GraphValue::Bytecode).collect(),
        )),
    }
}

fn check_bytecode_support(protocol: GraphProtocol) -> GraphResult<()> {
    if protocol.supports_bytecode() {
        Ok(())
    } else {
        Err(GraphError::configuration(format!(
            "{} does not support bytecode statements, use graphson-2.0 or later",
            protocol
        )))
    }
}

fn serialize_bytecode(
    statement: &GraphStatement,
    protocol: GraphProtocol,
    module: &GraphBinaryModule,
) -> GraphResult<Option<Bytes>> {
    let Some(payload) = bytecode_to_serialize(statement) else {
        return Ok(None);
    };
    check_bytecode_support(protocol)?;
    serialize_value(&payload, protocol, module).map(Some)
}

// ============================================================================
// Messages
// ============================================================================

fn query_options(resolved: &ResolvedOptions) -> QueryOptions {
    let mut options = QueryOptions::new(resolved.consistency);
    options.serial_consistency = resolved.serial_consistency;
    options.default_timestamp = resolved.timestamp;
    options
}

fn build_message(
    statement: &GraphStatement,
    protocol: GraphProtocol,
    mut options: QueryOptions,
    module: &GraphBinaryModule,
) -> GraphResult<Message> {
    if let StatementKind::Script { query, params } = statement.kind() {
        if !params.is_empty() {
            let blob = serialize_value(&GraphValue::from_params(params), protocol, module)?;
            options.positional_values.push(blob);
        }
        return Ok(Message::Query {
            query: query.clone(),
            options,
        });
    }

    // GraphBinary bytecode travels in the option map
    let query = if protocol.is_graph_binary() {
        check_bytecode_support(protocol)?;
        Bytes::from_static(EMPTY_STRING_QUERY)
    } else {
        serialize_bytecode(statement, protocol, module)?.unwrap_or_default()
    };
    Ok(Message::RawBytesQuery { query, options })
}

/// Build the message of a single-page request.
pub fn create_message(
    statement: &GraphStatement,
    protocol: GraphProtocol,
    resolved: &ResolvedOptions,
    module: &GraphBinaryModule,
) -> GraphResult<Message> {
    build_message(statement, protocol, query_options(resolved), module)
}

/// Build the message of a continuously paged request.
pub fn create_continuous_message(
    statement: &GraphStatement,
    protocol: GraphProtocol,
    resolved: &ResolvedOptions,
    paging: PagingSettings,
    module: &GraphBinaryModule,
) -> GraphResult<Message> {
    let mut options = query_options(resolved);
    options.page_size = paging.page_size;
    options.continuous_paging = Some(paging.to_options());
    build_message(statement, protocol, options, module)
}

// ============================================================================
// Option map
// ============================================================================

/// Build the option map.
///
/// Starts from the statement's own entries, which are never overwritten,
/// and adds every resolved option. Graph name and traversal source are left
/// out of system queries, including statement-supplied entries.
pub fn create_option_map(
    statement: &GraphStatement,
    protocol: GraphProtocol,
    resolved: &ResolvedOptions,
    module: &GraphBinaryModule,
) -> GraphResult<OptionMap> {
    let mut payload = statement.options().custom_payload.clone();

    if protocol.is_graph_binary() && !payload.contains_key(GRAPH_BINARY_QUERY_KEY) {
        if let Some(encoded) = serialize_bytecode(statement, protocol, module)? {
            payload.insert(GRAPH_BINARY_QUERY_KEY.to_string(), encoded);
        }
    }

    let language = if statement.is_script() {
        LANGUAGE_GROOVY
    } else {
        LANGUAGE_BYTECODE
    };
    put_if_absent(&mut payload, GRAPH_LANG_KEY, || encode_text(language));

    if resolved.system_query {
        payload.remove(GRAPH_NAME_KEY);
        payload.remove(GRAPH_SOURCE_KEY);
    } else {
        if let Some(source) = &resolved.traversal_source {
            put_if_absent(&mut payload, GRAPH_SOURCE_KEY, || encode_text(source));
        }
        if let Some(name) = &resolved.graph_name {
            put_if_absent(&mut payload, GRAPH_NAME_KEY, || encode_text(name));
        }
    }

    put_if_absent(&mut payload, GRAPH_RESULTS_KEY, || {
        encode_text(protocol.to_internal_code())
    });

    if let Some(level) = &resolved.read_consistency {
        put_if_absent(&mut payload, GRAPH_READ_CONSISTENCY_KEY, || encode_text(level));
    }
    if let Some(level) = &resolved.write_consistency {
        put_if_absent(&mut payload, GRAPH_WRITE_CONSISTENCY_KEY, || encode_text(level));
    }
    if let Some(timeout) = resolved.timeout {
        let millis = i64::try_from(timeout.as_millis()).unwrap_or(i64::MAX);
        put_if_absent(&mut payload, GRAPH_TIMEOUT_KEY, || encode_bigint(millis));
    }

    Ok(payload)
}

fn put_if_absent(payload: &mut OptionMap, key: &str, value: impl FnOnce() -> Bytes) {
    if !payload.contains_key(key) {
        payload.insert(key.to_string(), value());
    }
}

/// Build the complete request frame.
///
/// `paging` selects the continuous message shape.
pub fn create_request(
    statement: &GraphStatement,
    protocol: GraphProtocol,
    resolved: &ResolvedOptions,
    paging: Option<PagingSettings>,
    module: &GraphBinaryModule,
) -> GraphResult<RequestFrame> {
    let message = match paging {
        Some(paging) => create_continuous_message(statement, protocol, resolved, paging, module)?,
        None => create_message(statement, protocol, resolved, module)?,
    };
    let payload = create_option_map(statement, protocol, resolved, module)?;
    Ok(RequestFrame::new(message, payload).with_tracing(statement.options().tracing))
}
