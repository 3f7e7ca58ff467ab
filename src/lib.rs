//! # Graph Dispatch
//!
//! Request conversion and asynchronous dispatch for graph queries sent over
//! a DSE-compatible native protocol.
//!
//! ## Features
//!
//! - **Three statement kinds** - Gremlin scripts, fluent traversal bytecode and batches
//! - **Multiple formats** - GraphSON 1.0 / 2.0 / 3.0 and GraphBinary 1.0
//! - **Layered options** - Statement overrides, execution profiles and defaults
//! - **Async dispatch** - Built on Tokio, with retries and node exclusion
//! - **Continuous paging** - Lazy, cancellable multi-page results
//!
//! ## Basic Usage
//!
//! The crate does not open connections itself. Plug a [`graph::Transport`]
//! implementation into a session:
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use graph_dispatch::{DriverConfig, GraphContext, GraphSession, GraphStatement};
//!
//! # async fn example(transport: Arc<dyn graph_dispatch::Transport>) -> graph_dispatch::GraphResult<()> {
//! let session = GraphSession::new(transport, GraphContext::new(DriverConfig::default()));
//!
//! let result = session
//!     .execute_async(GraphStatement::script("g.V().hasLabel('person')"))
//!     .await?;
//! for node in result.current_page() {
//!     let vertex = node.as_vertex()?;
//!     println!("{} {}", vertex.label, vertex.id);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Streaming pages
//!
//! ```rust,ignore
//! use tokio_stream::StreamExt;
//!
//! let mut nodes = session.execute_async(statement).await?.into_stream();
//! while let Some(node) = nodes.next().await {
//!     println!("{}", node?);
//! }
//! ```
//!
//! ## Configuration
//!
//! ```rust
//! use graph_dispatch::{DriverConfig, DriverOption};
//!
//! let config = DriverConfig::builder()
//!     .with_option(DriverOption::GraphName, "modern")
//!     .with_profile_option("analytics", DriverOption::GraphTraversalSource, "a")
//!     .with_profile_option("analytics", DriverOption::GraphTimeout, "30 seconds")
//!     .build();
//! assert!(config.profile(Some("analytics")).is_ok());
//! ```
//!
//! ## Modules
//!
//! - [`graph`] - Statements, formats, dispatch and results
//! - [`protocol`] - Wire-level messages and responses
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod graph;
pub mod protocol;

// Re-exports for convenience
pub use graph::{
    AsyncGraphResultSet, DriverConfig, DriverConfigBuilder, DriverOption, ExecutionProfile,
    GraphContext, GraphError, GraphNode, GraphProtocol, GraphResult, GraphResultSet,
    GraphSession, GraphStatement, GraphValue, Node, Transport,
};

pub use protocol::{ConsistencyLevel, Message, ProtocolVersion, RequestFrame, RowsPage};

/// Config alias for convenience
pub type Config = DriverConfig;
