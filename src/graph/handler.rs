//! Request handlers.
//!
//! A handler drives one request from message building to a decoded result.
//! [`GraphRequestHandler`] covers single-page requests; the continuously
//! paged counterpart lives in [`super::continuous`]. Both share the
//! node/retry loop defined here.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace, warn};

use super::binary::GraphBinaryModule;
use super::config::ExecutionProfile;
use super::context::{GraphContext, Node, Transport};
use super::conversions::create_request;
use super::decoder::GraphRowDecoder;
use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::options::{resolve, ResolvedOptions};
use super::paging::infer_graph_protocol;
use super::policy::RetryDecision;
use super::result::{AsyncGraphResultSet, ExecutionInfo};
use super::statement::GraphStatement;
use crate::protocol::{RequestFrame, RowsPage};

/// Runs a request to completion.
#[async_trait]
pub trait RequestHandler: Send {
    /// Execute the request and return its first page.
    async fn handle(self: Box<Self>) -> GraphResult<AsyncGraphResultSet>;
}

// ============================================================================
// Shared dispatch
// ============================================================================

/// A successful attempt.
pub(crate) struct Execution {
    pub node: Node,
    pub page: RowsPage,
    pub retry_count: u32,
    pub errors: Vec<(Node, String)>,
    pub log_prefix: String,
}

/// A request that failed for good.
pub(crate) struct FailedExecution {
    pub error: GraphError,
    pub node: Option<Node>,
}

/// Send `request` along the query plan until a node answers or the retry
/// policy gives up. A node that failed is not tried again.
pub(crate) async fn send_with_retries(
    transport: &dyn Transport,
    context: &GraphContext,
    statement: &GraphStatement,
    profile: &ExecutionProfile,
    request: &RequestFrame,
    log_prefix: &str,
) -> Result<Execution, FailedExecution> {
    let mut plan = context
        .load_balancing_policy()
        .new_query_plan(statement, &transport.nodes());
    let mut errors: Vec<(Node, String)> = Vec::new();
    let mut retry_count = 0;
    let mut last_node = None;
    let mut execution_index = 0;

    loop {
        let node = match plan.pop_front() {
            Some(node) => node,
            None => {
                let error = if errors.is_empty() {
                    GraphError::NoNodeAvailable("Query plan is empty".to_string())
                } else {
                    GraphError::NoNodeAvailable(format!(
                        "All nodes failed: {}",
                        summarize(&errors)
                    ))
                };
                return Err(FailedExecution {
                    error,
                    node: last_node,
                });
            }
        };

        let execution_prefix = format!("{}|{}", log_prefix, execution_index);
        trace!(
            "[{}] Sending {} to {}",
            execution_prefix,
            request.message.name(),
            node
        );
        let started = Instant::now();
        match transport.send(&node, request.clone()).await {
            Ok(page) => {
                return Ok(Execution {
                    node,
                    page,
                    retry_count,
                    errors,
                    log_prefix: execution_prefix,
                })
            }
            Err(error) => {
                context.request_tracker().on_node_error(
                    statement,
                    &error,
                    started.elapsed(),
                    profile,
                    &node,
                    &execution_prefix,
                );
                match context.retry_policy().on_error(statement, &error, retry_count) {
                    RetryDecision::Retry => {
                        debug!(
                            "[{}] Error on {}, retrying on next node: {}",
                            execution_prefix, node, error
                        );
                        errors.push((node.clone(), error.to_string()));
                        last_node = Some(node);
                        retry_count += 1;
                        execution_index += 1;
                    }
                    RetryDecision::Rethrow => {
                        return Err(FailedExecution {
                            error,
                            node: Some(node),
                        })
                    }
                }
            }
        }
    }
}

fn summarize(errors: &[(Node, String)]) -> String {
    errors
        .iter()
        .map(|(node, error)| format!("{}: {}", node, error))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Log server warnings carried by a page.
pub(crate) fn log_warnings(page: &RowsPage, log_prefix: &str) {
    for warning in &page.warnings {
        warn!("[{}] Server warning: {}", log_prefix, warning);
    }
}

/// Resolved options and sub-protocol of a request about to be built.
pub(crate) fn prepare(
    statement: &GraphStatement,
    context: &GraphContext,
    paging_enabled: bool,
) -> GraphResult<(ResolvedOptions, GraphProtocol)> {
    let resolved = resolve(statement, context.config(), context.timestamp_generator())?;
    let protocol = infer_graph_protocol(statement, &resolved.profile, paging_enabled)?;
    Ok((resolved, protocol))
}

// ============================================================================
// GraphRequestHandler
// ============================================================================

/// States of a single-page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandlerState {
    /// Building the message
    Building,
    /// Waiting for the response
    AwaitingResponse,
    /// Decoding the rows
    Decoding,
    /// Done
    Completed,
    /// Failed
    Failed,
}

impl HandlerState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Handler for requests answered with a single page.
pub struct GraphRequestHandler {
    statement: GraphStatement,
    transport: Arc<dyn Transport>,
    context: GraphContext,
    module: GraphBinaryModule,
    log_prefix: String,
    state: HandlerState,
}

impl GraphRequestHandler {
    /// New handler; nothing is sent until [`RequestHandler::handle`].
    pub fn new(
        statement: GraphStatement,
        transport: Arc<dyn Transport>,
        context: GraphContext,
        module: GraphBinaryModule,
        log_prefix: impl Into<String>,
    ) -> Self {
        Self {
            statement,
            transport,
            context,
            module,
            log_prefix: log_prefix.into(),
            state: HandlerState::Building,
        }
    }

    /// Current state.
    pub fn state(&self) -> HandlerState {
        self.state
    }

    pub(crate) async fn execute(&mut self) -> GraphResult<AsyncGraphResultSet> {
        let started = Instant::now();
        let profile = match self.context.config().profile(
            self.statement.options().execution_profile_name.as_deref(),
        ) {
            Ok(profile) => profile,
            Err(error) => return self.fail(error, started.elapsed(), None, None),
        };

        let (resolved, protocol, request) = match self.build() {
            Ok(built) => built,
            Err(error) => return self.fail(error, started.elapsed(), Some(profile.as_ref()), None),
        };

        self.state = HandlerState::AwaitingResponse;
        let execution = match send_with_retries(
            self.transport.as_ref(),
            &self.context,
            &self.statement,
            &resolved.profile,
            &request,
            &self.log_prefix,
        )
        .await
        {
            Ok(execution) => execution,
            Err(failed) => {
                return self.fail(
                    failed.error,
                    started.elapsed(),
                    Some(resolved.profile.as_ref()),
                    failed.node.as_ref(),
                )
            }
        };

        self.state = HandlerState::Decoding;
        log_warnings(&execution.page, &execution.log_prefix);
        let decoder = GraphRowDecoder::new(protocol, self.module.clone());
        let nodes = match decoder.decode_page(&execution.page) {
            Ok(nodes) => nodes,
            Err(error) => {
                return self.fail(
                    error,
                    started.elapsed(),
                    Some(resolved.profile.as_ref()),
                    Some(&execution.node),
                )
            }
        };

        self.state = HandlerState::Completed;
        self.context.request_tracker().on_success(
            &self.statement,
            started.elapsed(),
            &resolved.profile,
            &execution.node,
            &execution.log_prefix,
        );
        debug!(
            "[{}] Received {} results from {}",
            execution.log_prefix,
            nodes.len(),
            execution.node
        );

        let info = ExecutionInfo {
            statement: self.statement.clone(),
            coordinator: execution.node,
            protocol,
            retry_count: execution.retry_count,
            errors: execution.errors,
            warnings: execution.page.warnings,
            page_number: None,
            log_prefix: execution.log_prefix,
        };
        Ok(AsyncGraphResultSet::single_page(nodes, info))
    }

    fn build(&self) -> GraphResult<(ResolvedOptions, GraphProtocol, RequestFrame)> {
        let (resolved, protocol) = prepare(&self.statement, &self.context, false)?;
        let request = create_request(&self.statement, protocol, &resolved, None, &self.module)?;
        Ok((resolved, protocol, request))
    }

    fn fail(
        &mut self,
        error: GraphError,
        latency: Duration,
        profile: Option<&ExecutionProfile>,
        node: Option<&Node>,
    ) -> GraphResult<AsyncGraphResultSet> {
        self.state = HandlerState::Failed;
        let profile = profile.unwrap_or_else(|| self.context.config().default_profile().as_ref());
        self.context.request_tracker().on_error(
            &self.statement,
            &error,
            latency,
            profile,
            node,
            &self.log_prefix,
        );
        Err(error)
    }
}

#[async_trait]
impl RequestHandler for GraphRequestHandler {
    async fn handle(self: Box<Self>) -> GraphResult<AsyncGraphResultSet> {
        let mut handler = self;
        handler.execute().await
    }
}

impl fmt::Debug for GraphRequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphRequestHandler")
            .field("statement", &self.statement.describe())
            .field("log_prefix", &self.log_prefix)
            .field("state", &self.state)
            .finish()
    }
}
