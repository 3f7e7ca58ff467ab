//! Request processors.
//!
//! A processor claims the requests it can serve through
//! [`RequestProcessor::can_process`]; the session asks each registered
//! processor in order and hands the request to the first that matches.

use std::fmt;
use std::sync::Arc;

use futures::future::BoxFuture;
use futures::FutureExt;
use tracing::trace;

use super::binary::GraphBinaryModule;
use super::context::{GraphContext, Transport};
use super::continuous::ContinuousGraphRequestHandler;
use super::error::{GraphError, GraphResult};
use super::handler::{GraphRequestHandler, RequestHandler};
use super::paging::is_paging_enabled;
use super::result::{AsyncGraphResultSet, GraphResultSet};
use super::statement::GraphStatement;

/// A request submitted to a session.
#[derive(Debug, Clone)]
pub enum Request {
    /// Graph statement
    Graph(GraphStatement),
    /// Plain query text, not served by the graph processors
    Query(String),
}

/// Result contract the caller expects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResultType {
    /// Future of an [`AsyncGraphResultSet`]
    AsyncGraph,
    /// Blocking [`GraphResultSet`]
    SyncGraph,
    /// Future of plain rows
    AsyncRows,
    /// Blocking plain rows
    SyncRows,
}

/// What a processor produced.
pub enum ProcessorOutput {
    /// A pending asynchronous result
    Async(BoxFuture<'static, GraphResult<AsyncGraphResultSet>>),
    /// A completed blocking result
    Sync(GraphResult<GraphResultSet>),
}

impl fmt::Debug for ProcessorOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Async(_) => f.write_str("ProcessorOutput::Async(..)"),
            Self::Sync(result) => f.debug_tuple("ProcessorOutput::Sync").field(result).finish(),
        }
    }
}

/// Serves one family of requests.
pub trait RequestProcessor: Send + Sync {
    /// Whether this processor serves `request` with the given result contract.
    fn can_process(&self, request: &Request, result_type: ResultType) -> bool;

    /// Start processing.
    fn process(
        &self,
        request: Request,
        transport: Arc<dyn Transport>,
        context: &GraphContext,
        log_prefix: &str,
    ) -> ProcessorOutput;

    /// An already failed result, for requests rejected before dispatch.
    fn new_failure(&self, error: GraphError) -> ProcessorOutput;
}

// ============================================================================
// GraphRequestAsyncProcessor
// ============================================================================

/// Serves graph statements with the async contract.
///
/// Chooses the continuous paging handler when paging is enabled for the
/// statement, the single-page handler otherwise.
#[derive(Debug, Clone)]
pub struct GraphRequestAsyncProcessor {
    module: GraphBinaryModule,
}

impl GraphRequestAsyncProcessor {
    /// New processor; the binary module is built from the context's registry.
    pub fn new(context: &GraphContext) -> Self {
        Self {
            module: GraphBinaryModule::new(context.registry().clone()),
        }
    }

    /// The shared binary module.
    pub fn module(&self) -> &GraphBinaryModule {
        &self.module
    }

    /// Build the handler for a statement.
    pub fn new_handler(
        &self,
        statement: GraphStatement,
        transport: Arc<dyn Transport>,
        context: &GraphContext,
        log_prefix: &str,
    ) -> GraphResult<Box<dyn RequestHandler>> {
        let profile = context
            .config()
            .profile(statement.options().execution_profile_name.as_deref())?;
        let paging = is_paging_enabled(&statement, &profile, context.protocol_version())?;
        trace!(
            "[{}] Using {} handler",
            log_prefix,
            if paging { "continuous" } else { "single-page" }
        );

        let handler: Box<dyn RequestHandler> = if paging {
            Box::new(ContinuousGraphRequestHandler::new(
                statement,
                transport,
                context.clone(),
                self.module.clone(),
                log_prefix,
            ))
        } else {
            Box::new(GraphRequestHandler::new(
                statement,
                transport,
                context.clone(),
                self.module.clone(),
                log_prefix,
            ))
        };
        Ok(handler)
    }

    /// Process a statement.
    pub fn process_statement(
        &self,
        statement: GraphStatement,
        transport: Arc<dyn Transport>,
        context: &GraphContext,
        log_prefix: &str,
    ) -> BoxFuture<'static, GraphResult<AsyncGraphResultSet>> {
        match self.new_handler(statement, transport, context, log_prefix) {
            Ok(handler) => handler.handle(),
            Err(error) => futures::future::ready(Err(error)).boxed(),
        }
    }
}

impl RequestProcessor for GraphRequestAsyncProcessor {
    fn can_process(&self, request: &Request, result_type: ResultType) -> bool {
        matches!(request, Request::Graph(_)) && result_type == ResultType::AsyncGraph
    }

    fn process(
        &self,
        request: Request,
        transport: Arc<dyn Transport>,
        context: &GraphContext,
        log_prefix: &str,
    ) -> ProcessorOutput {
        match request {
            Request::Graph(statement) => {
                ProcessorOutput::Async(self.process_statement(statement, transport, context, log_prefix))
            }
            other => self.new_failure(unsupported(&other)),
        }
    }

    fn new_failure(&self, error: GraphError) -> ProcessorOutput {
        ProcessorOutput::Async(futures::future::ready(Err(error)).boxed())
    }
}

fn unsupported(request: &Request) -> GraphError {
    GraphError::internal(format!("Unsupported request: {:?}", request))
}

// ============================================================================
// GraphRequestSyncProcessor
// ============================================================================

/// Serves graph statements with the blocking contract.
///
/// Blocks the calling thread; must not be used from async code.
#[derive(Debug, Clone)]
pub struct GraphRequestSyncProcessor {
    inner: GraphRequestAsyncProcessor,
}

impl GraphRequestSyncProcessor {
    /// Wrap an async processor.
    pub fn new(inner: GraphRequestAsyncProcessor) -> Self {
        Self { inner }
    }
}

impl RequestProcessor for GraphRequestSyncProcessor {
    fn can_process(&self, request: &Request, result_type: ResultType) -> bool {
        matches!(request, Request::Graph(_)) && result_type == ResultType::SyncGraph
    }

    fn process(
        &self,
        request: Request,
        transport: Arc<dyn Transport>,
        context: &GraphContext,
        log_prefix: &str,
    ) -> ProcessorOutput {
        match request {
            Request::Graph(statement) => {
                let pending = self
                    .inner
                    .process_statement(statement, transport, context, log_prefix);
                ProcessorOutput::Sync(futures::executor::block_on(pending).map(GraphResultSet::new))
            }
            other => self.new_failure(unsupported(&other)),
        }
    }

    fn new_failure(&self, error: GraphError) -> ProcessorOutput {
        ProcessorOutput::Sync(Err(error))
    }
}

// ============================================================================
// ProcessorRegistry
// ============================================================================

/// Ordered list of processors.
#[derive(Clone, Default)]
pub struct ProcessorRegistry {
    processors: Vec<Arc<dyn RequestProcessor>>,
}

impl ProcessorRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The graph processors: async first, then sync, sharing one binary module.
    pub fn graph(context: &GraphContext) -> Self {
        let async_processor = GraphRequestAsyncProcessor::new(context);
        Self::new()
            .with_processor(Arc::new(async_processor.clone()))
            .with_processor(Arc::new(GraphRequestSyncProcessor::new(async_processor)))
    }

    /// Append a processor.
    pub fn with_processor(mut self, processor: Arc<dyn RequestProcessor>) -> Self {
        self.processors.push(processor);
        self
    }

    /// First processor that serves the request.
    pub fn find(&self, request: &Request, result_type: ResultType) -> Option<&Arc<dyn RequestProcessor>> {
        self.processors
            .iter()
            .find(|p| p.can_process(request, result_type))
    }

    /// Number of processors.
    pub fn len(&self) -> usize {
        self.processors.len()
    }

    /// Check if no processor is registered.
    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }
}

impl fmt::Debug for ProcessorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorRegistry")
            .field("processors", &self.processors.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::config::{DriverConfig, DriverOption};
    use crate::graph::format::GraphProtocol;
    use crate::graph::paging::PagingEnabled;
    use crate::graph::testing::{int_page, local_node, rows, MockTransport};
    use crate::graph::types::{Bytecode, GraphValue, Vertex, VertexProperty};
    use crate::protocol::{ContinuousPageMetadata, ProtocolVersion};

    fn context(version: ProtocolVersion) -> GraphContext {
        GraphContext::builder(DriverConfig::default())
            .with_protocol_version(version)
            .build()
    }

    fn marko() -> GraphValue {
        GraphValue::from(
            Vertex::new(1, "person").with_property(VertexProperty::new(11, "name", "marko")),
        )
    }

    fn traversal() -> GraphStatement {
        GraphStatement::fluent(Bytecode::new().add_source("V", vec![]).add_step("hasLabel", vec![GraphValue::from("person")]))
    }

    #[test]
    fn test_can_process() {
        let ctx = context(ProtocolVersion::DseV2);
        let async_processor = GraphRequestAsyncProcessor::new(&ctx);
        let sync_processor = GraphRequestSyncProcessor::new(async_processor.clone());
        let graph = Request::Graph(GraphStatement::script("g.V()"));
        let query = Request::Query("SELECT * FROM t".to_string());

        assert!(async_processor.can_process(&graph, ResultType::AsyncGraph));
        assert!(!async_processor.can_process(&graph, ResultType::SyncGraph));
        assert!(!async_processor.can_process(&graph, ResultType::AsyncRows));
        assert!(!async_processor.can_process(&query, ResultType::AsyncGraph));

        assert!(sync_processor.can_process(&graph, ResultType::SyncGraph));
        assert!(!sync_processor.can_process(&graph, ResultType::AsyncGraph));
    }

    #[tokio::test]
    async fn test_new_failure() {
        let processor = GraphRequestAsyncProcessor::new(&context(ProtocolVersion::DseV2));
        match processor.new_failure(GraphError::configuration("rejected upstream")) {
            ProcessorOutput::Async(pending) => {
                assert!(matches!(pending.await, Err(GraphError::Configuration(_))));
            }
            other => panic!("unexpected output {:?}", other),
        }

        let sync = GraphRequestSyncProcessor::new(processor);
        assert!(matches!(
            sync.new_failure(GraphError::internal("x")),
            ProcessorOutput::Sync(Err(GraphError::Internal(_)))
        ));
    }

    #[tokio::test]
    async fn test_selects_continuous_handler() {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(int_page(GraphProtocol::GraphBinary1, &[1], 1, true)));
        let ctx = context(ProtocolVersion::DseV2);
        let processor = GraphRequestAsyncProcessor::new(&ctx);

        let result = processor
            .process_statement(GraphStatement::script("g.V()"), transport.clone(), &ctx, "s0|1")
            .await
            .unwrap();
        assert_eq!(result.execution_info().page_number, Some(1));
        assert_eq!(result.execution_info().protocol, GraphProtocol::GraphBinary1);
        assert!(transport.sent()[0].1.message.options().continuous_paging.is_some());
    }

    #[tokio::test]
    async fn test_selects_single_page_handler() {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(rows(GraphProtocol::GraphSon2, &[GraphValue::Int(1)])));
        let ctx = context(ProtocolVersion::V4);
        let processor = GraphRequestAsyncProcessor::new(&ctx);

        let result = processor
            .process_statement(GraphStatement::script("g.V()"), transport.clone(), &ctx, "s0|1")
            .await
            .unwrap();
        assert_eq!(result.execution_info().page_number, None);
        assert_eq!(result.execution_info().protocol, GraphProtocol::GraphSon2);
        assert!(transport.sent()[0].1.message.options().continuous_paging.is_none());
    }

    #[tokio::test]
    async fn test_unknown_profile_fails_without_io() {
        let transport = Arc::new(MockTransport::single());
        let ctx = context(ProtocolVersion::DseV2);
        let processor = GraphRequestAsyncProcessor::new(&ctx);

        let statement = GraphStatement::script("g.V()").with_execution_profile_name("nope");
        let output = processor.process(Request::Graph(statement), transport.clone(), &ctx, "s0|1");
        match output {
            ProcessorOutput::Async(pending) => {
                assert!(matches!(pending.await, Err(GraphError::Configuration(_))))
            }
            other => panic!("unexpected output {:?}", other),
        }
        assert!(transport.sent().is_empty());
    }

    #[test]
    fn test_sync_processor_decodes_vertex() {
        for protocol in [GraphProtocol::GraphSon2, GraphProtocol::GraphSon3, GraphProtocol::GraphBinary1] {
            let transport = Arc::new(MockTransport::single());
            transport.respond(&local_node(), Ok(rows(protocol, &[marko()])));
            let config = DriverConfig::builder()
                .with_option(DriverOption::GraphSubProtocol, protocol.to_internal_code())
                .build();
            let ctx = GraphContext::new(config);
            let processor = GraphRequestSyncProcessor::new(GraphRequestAsyncProcessor::new(&ctx));

            let statement = traversal().with_paging_enabled(PagingEnabled::Disabled);
            let output = processor.process(Request::Graph(statement), transport.clone(), &ctx, "s0|1");
            let nodes = match output {
                ProcessorOutput::Sync(result) => result.unwrap().all().unwrap(),
                other => panic!("unexpected output {:?}", other),
            };

            assert_eq!(nodes.len(), 1, "{}", protocol);
            let vertex = nodes[0].as_vertex().unwrap();
            assert_eq!(vertex.id, GraphValue::Int(1));
            assert_eq!(vertex.label, "person");
            if protocol.is_graphson() {
                assert_eq!(vertex.value("name"), Some(&GraphValue::from("marko")));
            }
        }
    }

    #[test]
    fn test_sync_processor_pages() {
        let transport = Arc::new(MockTransport::single());
        let protocol = GraphProtocol::GraphBinary1;
        let meta = |page_number, last| ContinuousPageMetadata {
            stream_id: 1,
            page_number,
            last,
        };
        transport.respond(
            &local_node(),
            Ok(rows(protocol, &[GraphValue::Int(1)]).with_continuous(meta(1, false))),
        );
        transport.next_page(
            &local_node(),
            Ok(rows(protocol, &[GraphValue::Int(2)]).with_continuous(meta(2, true))),
        );
        let ctx = context(ProtocolVersion::DseV2);
        let processor = GraphRequestSyncProcessor::new(GraphRequestAsyncProcessor::new(&ctx));

        let output = processor.process(Request::Graph(GraphStatement::script("g.V()")), transport.clone(), &ctx, "s0|1");
        let result = match output {
            ProcessorOutput::Sync(result) => result.unwrap(),
            other => panic!("unexpected output {:?}", other),
        };
        let values: Vec<i64> = result.map(|n| n.unwrap().as_i64().unwrap()).collect();
        assert_eq!(values, vec![1, 2]);
        assert_eq!(transport.next_page_calls(), 1);
    }

    #[test]
    fn test_registry_order() {
        let ctx = context(ProtocolVersion::DseV2);
        let registry = ProcessorRegistry::graph(&ctx);
        assert_eq!(registry.len(), 2);

        let graph = Request::Graph(GraphStatement::script("g.V()"));
        assert!(registry.find(&graph, ResultType::AsyncGraph).is_some());
        assert!(registry.find(&graph, ResultType::SyncGraph).is_some());
        assert!(registry.find(&graph, ResultType::SyncRows).is_none());
        assert!(registry
            .find(&Request::Query("SELECT 1".to_string()), ResultType::AsyncGraph)
            .is_none());
        assert!(ProcessorRegistry::new().is_empty());
    }
}
