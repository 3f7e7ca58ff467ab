//! Graph statements.
//!
//! A statement is one of three kinds: a Gremlin script, a single fluent
//! traversal (bytecode) or a batch of traversals. Every kind carries the
//! same per-statement overrides in [`StatementOptions`]. Statements are
//! value objects: every `with_*` call consumes the statement and returns a
//! new one.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;

use super::paging::PagingEnabled;
use super::types::{Bytecode, GraphValue};
use crate::protocol::{ConsistencyLevel, OptionMap};

// ============================================================================
// StatementOptions
// ============================================================================

/// Per-statement overrides. `None` defers to the execution profile.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StatementOptions {
    /// Execution profile name
    pub execution_profile_name: Option<String>,
    /// Graph name
    pub graph_name: Option<String>,
    /// Traversal source
    pub traversal_source: Option<String>,
    /// Sub-protocol internal code, e.g. `graphson-2.0`
    pub sub_protocol: Option<String>,
    /// Server-side timeout
    pub timeout: Option<Duration>,
    /// Request consistency
    pub consistency: Option<ConsistencyLevel>,
    /// Graph read consistency
    pub read_consistency: Option<ConsistencyLevel>,
    /// Graph write consistency
    pub write_consistency: Option<ConsistencyLevel>,
    /// Default timestamp (microseconds)
    pub timestamp: Option<i64>,
    /// System query flag
    pub system_query: Option<bool>,
    /// Idempotence flag
    pub idempotent: Option<bool>,
    /// Continuous paging override
    pub paging_enabled: Option<PagingEnabled>,
    /// Entries merged into the outgoing option map; never overwritten
    pub custom_payload: OptionMap,
    /// Request server-side tracing
    pub tracing: bool,
}

// ============================================================================
// GraphStatement
// ============================================================================

/// What a statement executes.
#[derive(Debug, Clone, PartialEq)]
pub enum StatementKind {
    /// Gremlin-groovy script with named parameters
    Script {
        /// Script text
        query: String,
        /// Named parameters (keys unique)
        params: BTreeMap<String, GraphValue>,
    },
    /// Single traversal
    Fluent(Bytecode),
    /// Traversals executed together
    Batch(Vec<Bytecode>),
}

/// An immutable graph statement.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphStatement {
    kind: StatementKind,
    options: StatementOptions,
}

impl GraphStatement {
    /// Script statement.
    pub fn script(query: impl Into<String>) -> Self {
        Self::from_kind(StatementKind::Script {
            query: query.into(),
            params: BTreeMap::new(),
        })
    }

    /// Fluent statement for a single traversal.
    pub fn fluent(traversal: Bytecode) -> Self {
        Self::from_kind(StatementKind::Fluent(traversal))
    }

    /// Batch statement.
    pub fn batch(traversals: impl IntoIterator<Item = Bytecode>) -> Self {
        Self::from_kind(StatementKind::Batch(traversals.into_iter().collect()))
    }

    fn from_kind(kind: StatementKind) -> Self {
        Self {
            kind,
            options: StatementOptions::default(),
        }
    }

    /// Statement kind.
    pub fn kind(&self) -> &StatementKind {
        &self.kind
    }

    /// Per-statement overrides.
    pub fn options(&self) -> &StatementOptions {
        &self.options
    }

    /// Whether this is a script statement.
    pub fn is_script(&self) -> bool {
        matches!(self.kind, StatementKind::Script { .. })
    }

    /// Script text, for script statements.
    pub fn query(&self) -> Option<&str> {
        match &self.kind {
            StatementKind::Script { query, .. } => Some(query),
            _ => None,
        }
    }

    /// Named parameters, for script statements.
    pub fn params(&self) -> Option<&BTreeMap<String, GraphValue>> {
        match &self.kind {
            StatementKind::Script { params, .. } => Some(params),
            _ => None,
        }
    }

    /// Idempotence; statements are idempotent unless flagged otherwise.
    pub fn is_idempotent(&self) -> bool {
        self.options.idempotent.unwrap_or(true)
    }

    /// Short description for logs.
    pub fn describe(&self) -> String {
        match &self.kind {
            StatementKind::Script { query, params } => {
                format!("script[{}] ({} params)", query, params.len())
            }
            StatementKind::Fluent(bytecode) => format!("fluent[{}]", bytecode),
            StatementKind::Batch(traversals) => format!("batch[{} traversals]", traversals.len()),
        }
    }

    // ------------------------------------------------------------------------
    // Builders
    // ------------------------------------------------------------------------

    /// Set a named parameter. Only script statements carry parameters;
    /// other kinds are returned unchanged.
    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<GraphValue>) -> Self {
        if let StatementKind::Script { params, .. } = &mut self.kind {
            params.insert(name.into(), value.into());
        }
        self
    }

    /// Append a traversal to a batch statement; other kinds are returned
    /// unchanged.
    pub fn with_traversal(mut self, traversal: Bytecode) -> Self {
        if let StatementKind::Batch(traversals) = &mut self.kind {
            traversals.push(traversal);
        }
        self
    }

    /// Set the execution profile name.
    pub fn with_execution_profile_name(mut self, name: impl Into<String>) -> Self {
        self.options.execution_profile_name = Some(name.into());
        self
    }

    /// Set the graph name.
    pub fn with_graph_name(mut self, name: impl Into<String>) -> Self {
        self.options.graph_name = Some(name.into());
        self
    }

    /// Set the traversal source.
    pub fn with_traversal_source(mut self, source: impl Into<String>) -> Self {
        self.options.traversal_source = Some(source.into());
        self
    }

    /// Set the sub-protocol by internal code.
    pub fn with_sub_protocol(mut self, code: impl Into<String>) -> Self {
        self.options.sub_protocol = Some(code.into());
        self
    }

    /// Set the server-side timeout. Zero disables it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = Some(timeout);
        self
    }

    /// Set the request consistency.
    pub fn with_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.options.consistency = Some(level);
        self
    }

    /// Set the graph read consistency.
    pub fn with_read_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.options.read_consistency = Some(level);
        self
    }

    /// Set the graph write consistency.
    pub fn with_write_consistency(mut self, level: ConsistencyLevel) -> Self {
        self.options.write_consistency = Some(level);
        self
    }

    /// Set the default timestamp in microseconds.
    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.options.timestamp = Some(timestamp);
        self
    }

    /// Flag the statement as a system query.
    pub fn with_system_query(mut self, system_query: bool) -> Self {
        self.options.system_query = Some(system_query);
        self
    }

    /// Flag the statement idempotent or not.
    pub fn with_idempotent(mut self, idempotent: bool) -> Self {
        self.options.idempotent = Some(idempotent);
        self
    }

    /// Override continuous paging.
    pub fn with_paging_enabled(mut self, paging: PagingEnabled) -> Self {
        self.options.paging_enabled = Some(paging);
        self
    }

    /// Add an option map entry.
    pub fn with_custom_payload(mut self, key: impl Into<String>, value: impl Into<Bytes>) -> Self {
        self.options.custom_payload.insert(key.into(), value.into());
        self
    }

    /// Request server-side tracing.
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.options.tracing = tracing;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_statement() {
        let stmt = GraphStatement::script("g.V().has('name', n)")
            .with_param("n", "marko")
            .with_param("limit", 10i64);

        assert!(stmt.is_script());
        assert_eq!(stmt.query(), Some("g.V().has('name', n)"));
        let params = stmt.params().unwrap();
        assert_eq!(params.len(), 2);
        assert_eq!(params.get("n"), Some(&GraphValue::from("marko")));
    }

    #[test]
    fn test_param_keys_unique() {
        let stmt = GraphStatement::script("x").with_param("a", 1).with_param("a", 2);
        assert_eq!(stmt.params().unwrap().get("a"), Some(&GraphValue::Int(2)));
    }

    #[test]
    fn test_with_returns_new_value() {
        let base = GraphStatement::script("g.V()");
        let named = base.clone().with_graph_name("modern");
        assert_eq!(base.options().graph_name, None);
        assert_eq!(named.options().graph_name.as_deref(), Some("modern"));
    }

    #[test]
    fn test_fluent_and_batch() {
        let fluent = GraphStatement::fluent(Bytecode::new().add_step("V", vec![]));
        assert!(!fluent.is_script());
        assert!(fluent.query().is_none());
        assert!(fluent.clone().with_param("ignored", 1) == fluent);

        let batch = GraphStatement::batch(vec![Bytecode::new().add_step("addV", vec![])])
            .with_traversal(Bytecode::new().add_step("addE", vec!["knows".into()]));
        match batch.kind() {
            StatementKind::Batch(traversals) => assert_eq!(traversals.len(), 2),
            other => panic!("unexpected kind {:?}", other),
        }
    }

    #[test]
    fn test_overrides() {
        let stmt = GraphStatement::script("g.V()")
            .with_execution_profile_name("olap")
            .with_timeout(Duration::from_millis(2))
            .with_read_consistency(ConsistencyLevel::Two)
            .with_timestamp(2)
            .with_system_query(true)
            .with_idempotent(false)
            .with_custom_payload("graph-lang", Bytes::from_static(b"gremlin-groovy"));

        let options = stmt.options();
        assert_eq!(options.execution_profile_name.as_deref(), Some("olap"));
        assert_eq!(options.timeout, Some(Duration::from_millis(2)));
        assert_eq!(options.read_consistency, Some(ConsistencyLevel::Two));
        assert_eq!(options.timestamp, Some(2));
        assert_eq!(options.system_query, Some(true));
        assert!(!stmt.is_idempotent());
        assert!(options.custom_payload.contains_key("graph-lang"));
    }

    #[test]
    fn test_default_idempotent() {
        assert!(GraphStatement::script("g.V()").is_idempotent());
    }
}
