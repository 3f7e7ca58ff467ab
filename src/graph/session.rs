//! Graph session.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use graph_dispatch::graph::{DriverConfig, GraphContext, GraphSession, GraphStatement};
//!
//! let context = GraphContext::new(DriverConfig::default());
//! let session = GraphSession::new(Arc::new(my_transport), context);
//!
//! let result = session
//!     .execute_async(GraphStatement::script("g.V().count()"))
//!     .await?;
//! println!("{:?}", result.one());
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::debug;

use super::context::{GraphContext, Transport};
use super::error::{GraphError, GraphResult};
use super::processor::{ProcessorOutput, ProcessorRegistry, Request, ResultType};
use super::result::{AsyncGraphResultSet, GraphResultSet};
use super::statement::GraphStatement;

struct SessionInner {
    name: String,
    transport: Arc<dyn Transport>,
    context: GraphContext,
    processors: ProcessorRegistry,
    request_ids: AtomicU64,
}

/// Entry point for executing graph statements.
///
/// Cheap to clone; clones share the transport and the request counter.
#[derive(Clone)]
pub struct GraphSession {
    inner: Arc<SessionInner>,
}

impl GraphSession {
    /// New session with the graph processors.
    pub fn new(transport: Arc<dyn Transport>, context: GraphContext) -> Self {
        let processors = ProcessorRegistry::graph(&context);
        Self::with_processors(transport, context, processors)
    }

    /// New session with a custom processor list.
    pub fn with_processors(
        transport: Arc<dyn Transport>,
        context: GraphContext,
        processors: ProcessorRegistry,
    ) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                name: context.config().session_name.clone(),
                transport,
                context,
                processors,
                request_ids: AtomicU64::new(0),
            }),
        }
    }

    /// Session name, the first part of every log prefix.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// The context.
    pub fn context(&self) -> &GraphContext {
        &self.inner.context
    }

    /// Execute a statement and return its first page.
    pub async fn execute_async(&self, statement: GraphStatement) -> GraphResult<AsyncGraphResultSet> {
        match self.route(Request::Graph(statement), ResultType::AsyncGraph)? {
            ProcessorOutput::Async(pending) => pending.await,
            ProcessorOutput::Sync(_) => Err(GraphError::internal(
                "Processor returned a blocking result for an async request",
            )),
        }
    }

    /// Execute a statement, blocking until the first page arrives.
    ///
    /// Must not be called from async code.
    pub fn execute(&self, statement: GraphStatement) -> GraphResult<GraphResultSet> {
        match self.route(Request::Graph(statement), ResultType::SyncGraph)? {
            ProcessorOutput::Sync(result) => result,
            ProcessorOutput::Async(_) => Err(GraphError::internal(
                "Processor returned an async result for a blocking request",
            )),
        }
    }

    /// Route a request to the first processor that serves it.
    pub fn route(&self, request: Request, result_type: ResultType) -> GraphResult<ProcessorOutput> {
        let inner = &self.inner;
        let processor = inner
            .processors
            .find(&request, result_type)
            .ok_or_else(|| {
                GraphError::internal(format!(
                    "No processor for {:?} with result type {:?}",
                    request, result_type
                ))
            })?;

        let request_id = inner.request_ids.fetch_add(1, Ordering::Relaxed);
        let log_prefix = format!("{}|{}", inner.name, request_id);
        debug!("[{}] Processing {:?} request", log_prefix, result_type);
        Ok(processor.process(request, inner.transport.clone(), &inner.context, &log_prefix))
    }
}

impl fmt::Debug for GraphSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphSession")
            .field("name", &self.inner.name)
            .field("processors", &self.inner.processors)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use crate::graph::config::{DriverConfig, DriverOption};
    use crate::graph::format::GraphProtocol;
    use crate::graph::testing::{
        int_page, local_node, rows, MockTransport, RecordingTracker, TrackedKind,
    };
    use crate::graph::types::GraphValue;
    use crate::protocol::ProtocolVersion;

    fn session(transport: Arc<MockTransport>, tracker: Arc<RecordingTracker>) -> GraphSession {
        let config = DriverConfig::builder()
            .with_session_name("test-graph")
            .with_profile_option("test-graph", DriverOption::GraphName, "mockGraph")
            .build();
        let context = GraphContext::builder(config)
            .with_request_tracker(tracker)
            .build();
        GraphSession::new(transport, context)
    }

    #[tokio::test]
    async fn test_execute_async_streams_pages() {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(int_page(GraphProtocol::GraphBinary1, &[1, 2], 1, false)));
        transport.next_page(&local_node(), Ok(int_page(GraphProtocol::GraphBinary1, &[3], 2, true)));
        let tracker = Arc::new(RecordingTracker::default());
        let session = session(transport.clone(), tracker.clone());

        let result = session
            .execute_async(GraphStatement::script("g.V()").with_execution_profile_name("test-graph"))
            .await
            .unwrap();
        let values: Vec<i64> = result
            .into_stream()
            .try_collect()
            .await
            .unwrap()
            .iter()
            .map(|n| n.as_i64().unwrap())
            .collect();
        assert_eq!(values, vec![1, 2, 3]);

        let successes = tracker.of_kind(TrackedKind::Success);
        assert_eq!(successes.len(), 1);
        assert_eq!(successes[0].profile, "test-graph");
        assert!(successes[0].log_prefix.starts_with("test-graph|"));
    }

    #[tokio::test]
    async fn test_request_ids_are_distinct() {
        let transport = Arc::new(MockTransport::single());
        let tracker = Arc::new(RecordingTracker::default());
        let config = DriverConfig::builder().with_session_name("s1").build();
        let context = GraphContext::builder(config)
            .with_protocol_version(ProtocolVersion::V4)
            .with_request_tracker(tracker.clone())
            .build();
        let session = GraphSession::new(transport.clone(), context);

        for _ in 0..3 {
            transport.respond(&local_node(), Ok(rows(GraphProtocol::GraphSon2, &[GraphValue::Int(1)])));
            session.execute_async(GraphStatement::script("g.V()")).await.unwrap();
        }
        let prefixes: HashSet<String> = tracker
            .of_kind(TrackedKind::Success)
            .into_iter()
            .map(|e| e.log_prefix)
            .collect();
        assert_eq!(prefixes.len(), 3);
        assert!(prefixes.contains("s1|0|0"));
        assert_eq!(session.name(), "s1");
    }

    #[test]
    fn test_execute_blocking() {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(int_page(GraphProtocol::GraphBinary1, &[4], 1, true)));
        let session = session(transport, Arc::new(RecordingTracker::default()));

        let nodes = session.execute(GraphStatement::script("g.V()")).unwrap().all().unwrap();
        assert_eq!(nodes[0].as_i64().unwrap(), 4);
    }

    #[tokio::test]
    async fn test_no_processor() {
        let transport = Arc::new(MockTransport::single());
        let context = GraphContext::new(DriverConfig::default());
        let session = GraphSession::with_processors(transport, context, ProcessorRegistry::new());

        assert!(matches!(
            session.execute_async(GraphStatement::script("g.V()")).await,
            Err(GraphError::Internal(_))
        ));
        assert!(session
            .route(Request::Query("SELECT 1".to_string()), ResultType::AsyncRows)
            .is_err());
    }
}
