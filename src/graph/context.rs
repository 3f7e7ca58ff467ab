//! Client context and collaborator traits.
//!
//! [`GraphContext`] is the immutable bundle every processor and handler is
//! built from: configuration, negotiated protocol version, type registry and
//! the pluggable collaborators (transport-independent). The transport itself
//! is passed separately through the session.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use super::binary::TypeSerializerRegistry;
use super::config::{DriverConfig, ExecutionProfile};
use super::error::{GraphError, GraphResult};
use super::policy::{DefaultRetryPolicy, LoadBalancingPolicy, RetryPolicy, RoundRobinPolicy};
use super::statement::GraphStatement;
use crate::protocol::{ProtocolVersion, QueryOptions, RequestFrame, RowsPage};

// ============================================================================
// Node
// ============================================================================

/// A server node requests can be sent to.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Node {
    /// Host
    pub host: String,
    /// Port
    pub port: u16,
    /// Datacenter, if known
    pub datacenter: Option<String>,
}

impl Node {
    /// New node.
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            datacenter: None,
        }
    }

    /// Set the datacenter.
    pub fn with_datacenter(mut self, datacenter: impl Into<String>) -> Self {
        self.datacenter = Some(datacenter.into());
        self
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ============================================================================
// Transport
// ============================================================================

/// Writes requests to nodes and returns their responses.
///
/// Connection pooling, framing and compression are the implementor's
/// concern. Errors should be classified (`Connection`, `Timeout`, `Server`)
/// so the retry policy can act on them.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Nodes currently available for requests.
    fn nodes(&self) -> Vec<Node>;

    /// Send a request and wait for its first (or only) page.
    async fn send(&self, node: &Node, request: RequestFrame) -> GraphResult<RowsPage>;

    /// Ask for the next page of a continuous paging stream.
    async fn request_next_page(&self, node: &Node, stream_id: i16) -> GraphResult<RowsPage>;

    /// Abort a continuous paging stream.
    async fn cancel(&self, node: &Node, stream_id: i16) -> GraphResult<()>;
}

// ============================================================================
// RequestTracker
// ============================================================================

/// Notified of every request outcome.
pub trait RequestTracker: Send + Sync {
    /// A request succeeded.
    fn on_success(
        &self,
        statement: &GraphStatement,
        latency: Duration,
        profile: &ExecutionProfile,
        node: &Node,
        log_prefix: &str,
    );

    /// A request failed for good.
    fn on_error(
        &self,
        _statement: &GraphStatement,
        _error: &GraphError,
        _latency: Duration,
        _profile: &ExecutionProfile,
        _node: Option<&Node>,
        _log_prefix: &str,
    ) {
    }

    /// One attempt on a node failed; the request may still be retried.
    fn on_node_error(
        &self,
        _statement: &GraphStatement,
        _error: &GraphError,
        _latency: Duration,
        _profile: &ExecutionProfile,
        _node: &Node,
        _log_prefix: &str,
    ) {
    }
}

/// Tracker that ignores everything.
#[derive(Debug, Default)]
pub struct NoopRequestTracker;

impl RequestTracker for NoopRequestTracker {
    fn on_success(&self, _: &GraphStatement, _: Duration, _: &ExecutionProfile, _: &Node, _: &str) {}
}

/// Tracker that reports outcomes through `tracing`.
#[derive(Debug, Default)]
pub struct LoggingRequestTracker;

impl RequestTracker for LoggingRequestTracker {
    fn on_success(
        &self,
        statement: &GraphStatement,
        latency: Duration,
        profile: &ExecutionProfile,
        node: &Node,
        log_prefix: &str,
    ) {
        debug!(
            "[{}] Success ({:?}, profile {}) on {}: {}",
            log_prefix,
            latency,
            profile.name(),
            node,
            statement.describe()
        );
    }

    fn on_error(
        &self,
        statement: &GraphStatement,
        error: &GraphError,
        latency: Duration,
        profile: &ExecutionProfile,
        node: Option<&Node>,
        log_prefix: &str,
    ) {
        let node = node.map(|n| n.to_string()).unwrap_or_else(|| "-".to_string());
        warn!(
            "[{}] Error ({:?}, profile {}) on {}: {} ({})",
            log_prefix,
            latency,
            profile.name(),
            node,
            error,
            statement.describe()
        );
    }

    fn on_node_error(
        &self,
        _statement: &GraphStatement,
        error: &GraphError,
        latency: Duration,
        _profile: &ExecutionProfile,
        node: &Node,
        log_prefix: &str,
    ) {
        debug!("[{}] Node error ({:?}) on {}: {}", log_prefix, latency, node, error);
    }
}

// ============================================================================
// TimestampGenerator
// ============================================================================

/// Supplies default timestamps for requests without one.
pub trait TimestampGenerator: Send + Sync {
    /// Next timestamp in microseconds, or `i64::MIN` to let the server
    /// assign one.
    fn next(&self) -> i64;
}

/// Leaves timestamps to the server.
#[derive(Debug, Default)]
pub struct ServerSideTimestampGenerator;

impl TimestampGenerator for ServerSideTimestampGenerator {
    fn next(&self) -> i64 {
        QueryOptions::NO_DEFAULT_TIMESTAMP
    }
}

/// Strictly increasing client-side timestamps (microseconds since epoch).
#[derive(Debug, Default)]
pub struct MonotonicTimestampGenerator {
    last: AtomicI64,
}

impl MonotonicTimestampGenerator {
    /// New generator.
    pub fn new() -> Self {
        Self::default()
    }
}

impl TimestampGenerator for MonotonicTimestampGenerator {
    fn next(&self) -> i64 {
        let now = Utc::now().timestamp_micros();
        let mut last = self.last.load(Ordering::Relaxed);
        loop {
            let next = if now > last { now } else { last + 1 };
            match self
                .last
                .compare_exchange_weak(last, next, Ordering::AcqRel, Ordering::Relaxed)
            {
                Ok(_) => return next,
                Err(actual) => last = actual,
            }
        }
    }
}

// ============================================================================
// GraphContext
// ============================================================================

/// Immutable client context shared by processors and handlers.
#[derive(Clone)]
pub struct GraphContext {
    config: Arc<DriverConfig>,
    protocol_version: ProtocolVersion,
    registry: Arc<TypeSerializerRegistry>,
    request_tracker: Arc<dyn RequestTracker>,
    timestamp_generator: Arc<dyn TimestampGenerator>,
    retry_policy: Arc<dyn RetryPolicy>,
    load_balancing_policy: Arc<dyn LoadBalancingPolicy>,
}

impl GraphContext {
    /// Start a builder.
    pub fn builder(config: DriverConfig) -> GraphContextBuilder {
        GraphContextBuilder::new(config)
    }

    /// Context with default collaborators.
    pub fn new(config: DriverConfig) -> Self {
        Self::builder(config).build()
    }

    /// Configuration.
    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Negotiated protocol version.
    pub fn protocol_version(&self) -> ProtocolVersion {
        self.protocol_version
    }

    /// Merged type serializer registry.
    pub fn registry(&self) -> &Arc<TypeSerializerRegistry> {
        &self.registry
    }

    /// Request tracker.
    pub fn request_tracker(&self) -> &dyn RequestTracker {
        self.request_tracker.as_ref()
    }

    /// Timestamp generator.
    pub fn timestamp_generator(&self) -> &dyn TimestampGenerator {
        self.timestamp_generator.as_ref()
    }

    /// Retry policy.
    pub fn retry_policy(&self) -> &dyn RetryPolicy {
        self.retry_policy.as_ref()
    }

    /// Load balancing policy.
    pub fn load_balancing_policy(&self) -> &dyn LoadBalancingPolicy {
        self.load_balancing_policy.as_ref()
    }
}

impl fmt::Debug for GraphContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphContext")
            .field("session", &self.config.session_name)
            .field("protocol_version", &self.protocol_version)
            .field("registry", &self.registry)
            .field("retry_policy", &self.retry_policy)
            .field("load_balancing_policy", &self.load_balancing_policy)
            .finish()
    }
}

/// Builder for [`GraphContext`].
pub struct GraphContextBuilder {
    context: GraphContext,
}

impl GraphContextBuilder {
    fn new(config: DriverConfig) -> Self {
        let retry_policy = Arc::new(DefaultRetryPolicy::new(config.max_retries));
        Self {
            context: GraphContext {
                config: Arc::new(config),
                protocol_version: ProtocolVersion::DseV2,
                registry: Arc::new(TypeSerializerRegistry::dse()),
                request_tracker: Arc::new(NoopRequestTracker),
                timestamp_generator: Arc::new(ServerSideTimestampGenerator),
                retry_policy,
                load_balancing_policy: Arc::new(RoundRobinPolicy::new()),
            },
        }
    }

    /// Negotiated protocol version.
    pub fn with_protocol_version(mut self, version: ProtocolVersion) -> Self {
        self.context.protocol_version = version;
        self
    }

    /// Type serializer registry.
    pub fn with_registry(mut self, registry: TypeSerializerRegistry) -> Self {
        self.context.registry = Arc::new(registry);
        self
    }

    /// Request tracker.
    pub fn with_request_tracker(mut self, tracker: Arc<dyn RequestTracker>) -> Self {
        self.context.request_tracker = tracker;
        self
    }

    /// Timestamp generator.
    pub fn with_timestamp_generator(mut self, generator: Arc<dyn TimestampGenerator>) -> Self {
        self.context.timestamp_generator = generator;
        self
    }

    /// Retry policy.
    pub fn with_retry_policy(mut self, policy: Arc<dyn RetryPolicy>) -> Self {
        self.context.retry_policy = policy;
        self
    }

    /// Load balancing policy.
    pub fn with_load_balancing_policy(mut self, policy: Arc<dyn LoadBalancingPolicy>) -> Self {
        self.context.load_balancing_policy = policy;
        self
    }

    /// Build.
    pub fn build(self) -> GraphContext {
        self.context
    }
}
