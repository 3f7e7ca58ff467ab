//! Graph Module
//!
//! Converts graph statements into protocol requests, dispatches them
//! asynchronously and decodes the rows that come back.
//!
//! # Components
//!
//! - Statements: [`GraphStatement`] (script, fluent bytecode or batch)
//! - Formats: [`GraphProtocol`], GraphSON ([`graphson`]) and GraphBinary ([`binary`])
//! - Option resolution: statement, then execution profile, then defaults ([`options`])
//! - Message conversion: [`conversions`]
//! - Dispatch: [`GraphRequestAsyncProcessor`] picks the single-page
//!   [`GraphRequestHandler`] or the [`ContinuousGraphRequestHandler`]
//! - Results: [`AsyncGraphResultSet`], [`GraphNodeStream`], [`GraphResultSet`]
//!
//! # Example
//!
//! ```ignore
//! use graph_dispatch::graph::{DriverConfig, DriverOption, GraphContext, GraphSession, GraphStatement};
//!
//! let config = DriverConfig::builder()
//!     .with_option(DriverOption::GraphName, "modern")
//!     .build();
//! let session = GraphSession::new(transport, GraphContext::new(config));
//!
//! // Script with parameters
//! let statement = GraphStatement::script("g.V().has('name', name)")
//!     .with_param("name", "marko");
//! let result = session.execute_async(statement).await?;
//! for node in result.current_page() {
//!     println!("{}", node);
//! }
//!
//! // Blocking
//! let nodes = session.execute(GraphStatement::script("g.V().count()"))?.all()?;
//! ```

pub mod binary;
pub mod config;
pub mod conversions;
pub mod graphson;
pub mod options;
pub mod paging;
pub mod policy;
pub mod processor;
pub mod result;
mod context;
mod continuous;
mod decoder;
mod error;
mod format;
mod handler;
mod node;
mod numeric;
mod session;
mod statement;
mod types;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports
pub use binary::{GraphBinaryModule, TypeSerializerRegistry};
pub use config::{DriverConfig, DriverConfigBuilder, DriverOption, ExecutionProfile};
pub use context::{
    GraphContext, GraphContextBuilder, LoggingRequestTracker, MonotonicTimestampGenerator, Node,
    NoopRequestTracker, RequestTracker, ServerSideTimestampGenerator, TimestampGenerator,
    Transport,
};
pub use continuous::{ContinuousGraphRequestHandler, ContinuousState};
pub use decoder::{GraphRowDecoder, DEFAULT_MAX_PAGE_NODES};
pub use error::{GraphError, GraphResult, ServerErrorCode};
pub use format::GraphProtocol;
pub use handler::{GraphRequestHandler, HandlerState, RequestHandler};
pub use node::GraphNode;
pub use numeric::{BigDecimal, BigInteger};
pub use paging::{PagingEnabled, PagingSettings};
pub use policy::{
    DefaultRetryPolicy, LoadBalancingPolicy, RandomPolicy, RetryDecision, RetryPolicy,
    RoundRobinPolicy,
};
pub use processor::{
    GraphRequestAsyncProcessor, GraphRequestSyncProcessor, ProcessorOutput, ProcessorRegistry,
    Request, RequestProcessor, ResultType,
};
pub use result::{AsyncGraphResultSet, CancelHandle, ExecutionInfo, GraphNodeStream, GraphResultSet};
pub use session::GraphSession;
pub use statement::{GraphStatement, StatementKind, StatementOptions};
pub use types::{
    Bytecode, Edge, GraphValue, Instruction, Point, Property, Traverser, Vertex, VertexProperty,
};
