//! Continuous paging.
//!
//! The server streams pages of one request on a single node. The handler
//! sends the request and emits the first page; every later page is
//! requested by the [`ContinuousPager`] only when the consumer asks for it,
//! so at most one page request is outstanding at a time.
//!
//! Cancelling (explicitly, or by dropping an unfinished result) aborts the
//! in-flight page future, notifies the transport once and suppresses any
//! further page request. Pages already handed out stay valid.

use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};

use super::binary::GraphBinaryModule;
use super::config::ExecutionProfile;
use super::context::{GraphContext, Node, Transport};
use super::conversions::create_request;
use super::decoder::GraphRowDecoder;
use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::handler::{log_warnings, prepare, send_with_retries, RequestHandler};
use super::options::ResolvedOptions;
use super::paging::PagingSettings;
use super::policy::RetryDecision;
use super::result::{AsyncGraphResultSet, ExecutionInfo, PageFetcher};
use super::statement::GraphStatement;
use crate::protocol::{RequestFrame, RowsPage};

/// States of a continuously paged request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContinuousState {
    /// Building the message
    Building,
    /// A page request is in flight
    AwaitingPage,
    /// Decoding and handing out a page
    EmittingPage,
    /// Idle until the consumer asks for the next page
    AwaitingNextPage,
    /// The last page was emitted
    Completed,
    /// Cancelled by the consumer
    Cancelled,
    /// Failed
    Failed,
}

impl ContinuousState {
    /// Whether no further transition can happen.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled | Self::Failed)
    }
}

// ============================================================================
// ContinuousGraphRequestHandler
// ============================================================================

/// Handler for continuously paged requests.
pub struct ContinuousGraphRequestHandler {
    statement: GraphStatement,
    transport: Arc<dyn Transport>,
    context: GraphContext,
    module: GraphBinaryModule,
    log_prefix: String,
}

impl ContinuousGraphRequestHandler {
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
        }
    }

    /// Send the request and emit the first page.
    pub(crate) async fn start(self) -> GraphResult<(Arc<ContinuousPager>, AsyncGraphResultSet)> {
        let started = Instant::now();
        let (resolved, protocol, request) = match self.build() {
            Ok(built) => built,
            Err(error) => {
                let profile = self.context.config().default_profile().clone();
                self.report_error(&error, started, &profile, None);
                return Err(error);
            }
        };

        trace!("[{}] Starting continuous paging", self.log_prefix);
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
                self.report_error(&failed.error, started, &resolved.profile, failed.node.as_ref());
                return Err(failed.error);
            }
        };

        let stream_id = match &execution.page.continuous {
            Some(metadata) => metadata.stream_id,
            None => {
                let error = GraphError::protocol("Continuous paging response has no paging metadata");
                self.report_error(&error, started, &resolved.profile, Some(&execution.node));
                return Err(error);
            }
        };

        let pager = Arc::new_cyclic(|this| ContinuousPager {
            this: this.clone(),
            statement: self.statement,
            transport: self.transport,
            context: self.context,
            profile: resolved.profile,
            decoder: GraphRowDecoder::new(protocol, self.module),
            node: execution.node,
            stream_id,
            log_prefix: execution.log_prefix,
            started,
            state: Mutex::new(PagerState {
                state: ContinuousState::AwaitingPage,
                next_page: 1,
            }),
            token: CancellationToken::new(),
        });
        let first = pager.accept(execution.page, execution.retry_count, execution.errors)?;
        Ok((pager, first))
    }

    fn build(&self) -> GraphResult<(ResolvedOptions, GraphProtocol, RequestFrame)> {
        let (resolved, protocol) = prepare(&self.statement, &self.context, true)?;
        let paging = PagingSettings::from_profile(&resolved.profile)?;
        let request = create_request(
            &self.statement,
            protocol,
            &resolved,
            Some(paging),
            &self.module,
        )?;
        Ok((resolved, protocol, request))
    }

    fn report_error(
        &self,
        error: &GraphError,
        started: Instant,
        profile: &ExecutionProfile,
        node: Option<&Node>,
    ) {
        self.context.request_tracker().on_error(
            &self.statement,
            error,
            started.elapsed(),
            profile,
            node,
            &self.log_prefix,
        );
    }
}

#[async_trait]
impl RequestHandler for ContinuousGraphRequestHandler {
    async fn handle(self: Box<Self>) -> GraphResult<AsyncGraphResultSet> {
        let (_pager, first) = (*self).start().await?;
        Ok(first)
    }
}

impl fmt::Debug for ContinuousGraphRequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContinuousGraphRequestHandler")
            .field("statement", &self.statement.describe())
            .field("log_prefix", &self.log_prefix)
            .finish()
    }
}

// ============================================================================
// ContinuousPager
// ============================================================================

struct PagerState {
    state: ContinuousState,
    next_page: i32,
}

/// Page source shared by every result set of one continuous request.
pub(crate) struct ContinuousPager {
    this: Weak<ContinuousPager>,
    statement: GraphStatement,
    transport: Arc<dyn Transport>,
    context: GraphContext,
    profile: Arc<ExecutionProfile>,
    decoder: GraphRowDecoder,
    node: Node,
    stream_id: i16,
    log_prefix: String,
    started: Instant,
    state: Mutex<PagerState>,
    token: CancellationToken,
}

impl ContinuousPager {
    pub(crate) fn state(&self) -> ContinuousState {
        self.state.lock().state
    }

    /// Validate, decode and emit a page that just arrived.
    fn accept(
        &self,
        page: RowsPage,
        retry_count: u32,
        errors: Vec<(Node, String)>,
    ) -> GraphResult<AsyncGraphResultSet> {
        let metadata = match page.continuous {
            Some(metadata) => metadata,
            None => {
                return Err(self.fail(GraphError::protocol(
                    "Continuous paging response has no paging metadata",
                )))
            }
        };

        {
            let mut guard = self.state.lock();
            if guard.state == ContinuousState::Cancelled {
                return Err(cancelled());
            }
            if metadata.page_number != guard.next_page {
                let expected = guard.next_page;
                drop(guard);
                return Err(self.fail(GraphError::protocol(format!(
                    "Expected page {}, received page {}",
                    expected, metadata.page_number
                ))));
            }
            guard.state = ContinuousState::EmittingPage;
        }

        log_warnings(&page, &self.log_prefix);
        let nodes = match self.decoder.decode_page(&page) {
            Ok(nodes) => nodes,
            Err(error) => return Err(self.fail(error)),
        };

        {
            let mut guard = self.state.lock();
            if guard.state == ContinuousState::Cancelled {
                return Err(cancelled());
            }
            guard.state = if metadata.last {
                ContinuousState::Completed
            } else {
                ContinuousState::AwaitingNextPage
            };
            guard.next_page += 1;
        }
        debug!(
            "[{}] Page {} ({} results{})",
            self.log_prefix,
            metadata.page_number,
            nodes.len(),
            if metadata.last { ", last" } else { "" }
        );

        if metadata.last {
            self.context.request_tracker().on_success(
                &self.statement,
                self.started.elapsed(),
                &self.profile,
                &self.node,
                &self.log_prefix,
            );
        }

        let this = self
            .this
            .upgrade()
            .ok_or_else(|| GraphError::internal("Continuous pager released while emitting"))?;
        let info = ExecutionInfo {
            statement: self.statement.clone(),
            coordinator: self.node.clone(),
            protocol: self.decoder.protocol(),
            retry_count,
            errors,
            warnings: page.warnings,
            page_number: Some(metadata.page_number),
            log_prefix: self.log_prefix.clone(),
        };
        Ok(AsyncGraphResultSet::paged(nodes, info, !metadata.last, this))
    }

    /// Move to `Failed` unless already terminal, and report.
    fn fail(&self, error: GraphError) -> GraphError {
        {
            let mut guard = self.state.lock();
            if guard.state.is_terminal() {
                return error;
            }
            guard.state = ContinuousState::Failed;
        }
        self.context.request_tracker().on_error(
            &self.statement,
            &error,
            self.started.elapsed(),
            &self.profile,
            Some(&self.node),
            &self.log_prefix,
        );
        error
    }

    fn notify_transport(&self) {
        let transport = self.transport.clone();
        let node = self.node.clone();
        let stream_id = self.stream_id;
        let prefix = self.log_prefix.clone();
        let cancel = async move {
            if let Err(e) = transport.cancel(&node, stream_id).await {
                debug!("[{}] Cancel on {} failed: {}", prefix, node, e);
            }
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(cancel);
            }
            Err(_) => futures::executor::block_on(cancel),
        }
    }
}

fn cancelled() -> GraphError {
    GraphError::cancelled("Continuous paging was cancelled")
}

/// Cancels the request when a page fetch is dropped while still
/// `AwaitingPage`; the stream position on the server is then unknown.
struct PageInFlight<'a> {
    pager: &'a ContinuousPager,
}

impl Drop for PageInFlight<'_> {
    fn drop(&mut self) {
        if self.pager.state() == ContinuousState::AwaitingPage {
            debug!(
                "[{}] Page fetch abandoned on {}",
                self.pager.log_prefix, self.pager.node
            );
            self.pager.cancel();
        }
    }
}

#[async_trait]
impl PageFetcher for ContinuousPager {
    async fn fetch_next(&self) -> GraphResult<AsyncGraphResultSet> {
        {
            let mut guard = self.state.lock();
            match guard.state {
                ContinuousState::AwaitingNextPage => guard.state = ContinuousState::AwaitingPage,
                ContinuousState::Cancelled => return Err(cancelled()),
                other => {
                    return Err(GraphError::internal(format!(
                        "Cannot request a page while {:?}",
                        other
                    )))
                }
            }
        }
        let _in_flight = PageInFlight { pager: self };

        let mut retry_count = 0;
        let mut errors = Vec::new();
        let page = loop {
            let attempt_started = Instant::now();
            let result = tokio::select! {
                biased;
                _ = self.token.cancelled() => return Err(cancelled()),
                result = self.transport.request_next_page(&self.node, self.stream_id) => result,
            };
            match result {
                Ok(page) => break page,
                Err(error) => {
                    self.context.request_tracker().on_node_error(
                        &self.statement,
                        &error,
                        attempt_started.elapsed(),
                        &self.profile,
                        &self.node,
                        &self.log_prefix,
                    );
                    match self
                        .context
                        .retry_policy()
                        .on_error(&self.statement, &error, retry_count)
                    {
                        RetryDecision::Retry => {
                            debug!(
                                "[{}] Page request failed on {}, retrying: {}",
                                self.log_prefix, self.node, error
                            );
                            errors.push((self.node.clone(), error.to_string()));
                            retry_count += 1;
                        }
                        RetryDecision::Rethrow => return Err(self.fail(error)),
                    }
                }
            }
        };
        self.accept(page, retry_count, errors)
    }

    fn cancel(&self) {
        {
            let mut guard = self.state.lock();
            if guard.state.is_terminal() {
                return;
            }
            guard.state = ContinuousState::Cancelled;
        }
        debug!("[{}] Cancelling continuous paging on {}", self.log_prefix, self.node);
        self.token.cancel();
        self.notify_transport();
    }

    fn is_cancelled(&self) -> bool {
        self.state() == ContinuousState::Cancelled
    }
}

impl Drop for ContinuousPager {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::config::{DriverConfig, DriverOption};
    use crate::graph::error::ServerErrorCode;
    use crate::graph::node::GraphNode;
    use crate::graph::testing::{
        int_page, local_node, module, MockTransport, RecordingTracker, TrackedKind,
    };
    use crate::graph::types::GraphValue;
    use tokio_stream::StreamExt;

    const BINARY: GraphProtocol = GraphProtocol::GraphBinary1;

    fn context(tracker: Arc<RecordingTracker>) -> GraphContext {
        let config = DriverConfig::builder()
            .with_option(DriverOption::GraphPageSize, "2")
            .build();
        GraphContext::builder(config)
            .with_request_tracker(tracker)
            .build()
    }

    fn handler(transport: Arc<MockTransport>, tracker: Arc<RecordingTracker>) -> ContinuousGraphRequestHandler {
        ContinuousGraphRequestHandler::new(
            GraphStatement::script("g.V()"),
            transport,
            context(tracker),
            module(),
            "test-graph|3",
        )
    }

    fn ints(nodes: &[GraphNode]) -> Vec<i64> {
        nodes.iter().map(|n| n.as_i64().unwrap()).collect()
    }

    fn three_pages() -> Arc<MockTransport> {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(int_page(BINARY, &[1, 2], 1, false)));
        transport.next_page(&local_node(), Ok(int_page(BINARY, &[3, 4], 2, false)));
        transport.next_page(&local_node(), Ok(int_page(BINARY, &[5], 3, true)));
        transport
    }

    #[tokio::test]
    async fn test_three_pages_then_completed() {
        let transport = three_pages();
        let tracker = Arc::new(RecordingTracker::default());
        let (pager, first) = handler(transport.clone(), tracker.clone()).start().await.unwrap();

        let mut batches = vec![ints(first.current_page())];
        assert_eq!(pager.state(), ContinuousState::AwaitingNextPage);
        let mut current = first;
        while current.has_more_pages() {
            current = current.fetch_next_page().await.unwrap();
            batches.push(ints(current.current_page()));
        }

        assert_eq!(batches, vec![vec![1, 2], vec![3, 4], vec![5]]);
        assert_eq!(pager.state(), ContinuousState::Completed);
        assert_eq!(current.execution_info().page_number, Some(3));
        assert_eq!(transport.sent().len(), 1);
        assert_eq!(transport.next_page_calls(), 2);
        assert_eq!(transport.cancel_calls(), 0);

        let (_, frame) = &transport.sent()[0];
        let options = frame.message.options();
        assert_eq!(options.page_size, 2);
        assert!(options.continuous_paging.is_some());

        let successes = tracker.of_kind(TrackedKind::Success);
        assert_eq!(successes.len(), 1);
        let parts: Vec<&str> = successes[0].log_prefix.split('|').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "test-graph");
        assert!(parts[1..].iter().all(|p| p.chars().all(|c| c.is_ascii_digit())));
    }

    #[tokio::test]
    async fn test_cancel_after_first_page() {
        let transport = three_pages();
        let tracker = Arc::new(RecordingTracker::default());
        let (pager, first) = handler(transport.clone(), tracker).start().await.unwrap();
        assert_eq!(ints(first.current_page()), vec![1, 2]);

        first.cancel();
        first.cancel();
        assert_eq!(pager.state(), ContinuousState::Cancelled);
        assert!(first.cancel_handle().is_cancelled());

        let err = first.fetch_next_page().await.unwrap_err();
        assert!(matches!(err, GraphError::Cancelled(_)));
        assert_eq!(transport.next_page_calls(), 0);
        assert_eq!(transport.wait_for_cancel().await, 1);
    }

    #[tokio::test]
    async fn test_drop_unfinished_cancels() {
        let transport = three_pages();
        let tracker = Arc::new(RecordingTracker::default());
        let (pager, first) = handler(transport.clone(), tracker).start().await.unwrap();

        drop(pager);
        drop(first);
        assert_eq!(transport.wait_for_cancel().await, 1);
        assert_eq!(transport.next_page_calls(), 0);
    }

    #[tokio::test]
    async fn test_drop_completed_does_not_cancel() {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(int_page(BINARY, &[1], 1, true)));
        let tracker = Arc::new(RecordingTracker::default());

        let first = Box::new(handler(transport.clone(), tracker)).handle().await.unwrap();
        assert!(!first.has_more_pages());
        drop(first);
        tokio::task::yield_now().await;
        assert_eq!(transport.cancel_calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_aborts_in_flight_page() {
        let transport = three_pages();
        transport.stall_next_page();
        let tracker = Arc::new(RecordingTracker::default());
        let (_pager, first) = handler(transport.clone(), tracker).start().await.unwrap();

        let cancel = first.cancel_handle();
        let pending = tokio::spawn(first.fetch_next_page());
        while transport.next_page_calls() == 0 {
            tokio::task::yield_now().await;
        }
        cancel.cancel();

        let result = pending.await.unwrap();
        assert!(matches!(result, Err(GraphError::Cancelled(_))));
        assert_eq!(transport.wait_for_cancel().await, 1);
    }

    #[tokio::test]
    async fn test_abandoned_page_fetch_cancels() {
        let transport = three_pages();
        transport.stall_next_page();
        let tracker = Arc::new(RecordingTracker::default());
        let (pager, first) = handler(transport.clone(), tracker).start().await.unwrap();

        let pending = tokio::spawn(first.fetch_next_page());
        while transport.next_page_calls() == 0 {
            tokio::task::yield_now().await;
        }
        pending.abort();
        assert!(pending.await.unwrap_err().is_cancelled());

        assert_eq!(pager.state(), ContinuousState::Cancelled);
        assert_eq!(transport.wait_for_cancel().await, 1);
        let err = pager.fetch_next().await.unwrap_err();
        assert!(matches!(err, GraphError::Cancelled(_)));
        assert_eq!(transport.next_page_calls(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_failure_keeps_emitted_pages() {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(int_page(BINARY, &[1, 2], 1, false)));
        transport.next_page(
            &local_node(),
            Err(GraphError::server(ServerErrorCode::INVALID, "traversal failed")),
        );
        let tracker = Arc::new(RecordingTracker::default());
        let (pager, first) = handler(transport.clone(), tracker.clone()).start().await.unwrap();

        let items: Vec<GraphResult<GraphNode>> = first.into_stream().collect().await;
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap().value(), &GraphValue::Int(1));
        assert_eq!(items[1].as_ref().unwrap().value(), &GraphValue::Int(2));
        assert!(matches!(items[2], Err(GraphError::Server { .. })));

        assert_eq!(pager.state(), ContinuousState::Failed);
        assert_eq!(tracker.of_kind(TrackedKind::Error).len(), 1);
        assert_eq!(transport.cancel_calls(), 0);
    }

    #[tokio::test]
    async fn test_page_retry_stays_on_node() {
        let transport = Arc::new(MockTransport::new(vec![
            local_node(),
            Node::new("127.0.0.2", 9042),
        ]));
        transport.respond(&local_node(), Ok(int_page(BINARY, &[1], 1, false)));
        transport.next_page(&local_node(), Err(GraphError::connection("reset")));
        transport.next_page(&local_node(), Ok(int_page(BINARY, &[2], 2, true)));
        let tracker = Arc::new(RecordingTracker::default());
        let (pager, first) = handler(transport.clone(), tracker.clone()).start().await.unwrap();

        let second = first.fetch_next_page().await.unwrap();
        assert_eq!(ints(second.current_page()), vec![2]);
        assert_eq!(second.execution_info().retry_count, 1);
        assert_eq!(second.execution_info().coordinator, local_node());
        assert_eq!(transport.next_page_calls(), 2);
        assert_eq!(pager.state(), ContinuousState::Completed);
        assert_eq!(tracker.of_kind(TrackedKind::NodeError).len(), 1);
    }

    #[tokio::test]
    async fn test_page_number_gap() {
        let transport = Arc::new(MockTransport::single());
        transport.respond(&local_node(), Ok(int_page(BINARY, &[1], 1, false)));
        transport.next_page(&local_node(), Ok(int_page(BINARY, &[3], 3, true)));
        let tracker = Arc::new(RecordingTracker::default());
        let (pager, first) = handler(transport, tracker).start().await.unwrap();

        assert!(matches!(
            first.fetch_next_page().await,
            Err(GraphError::Protocol(_))
        ));
        assert_eq!(pager.state(), ContinuousState::Failed);
    }

    #[tokio::test]
    async fn test_missing_metadata() {
        let transport = Arc::new(MockTransport::single());
        let mut page = int_page(BINARY, &[1], 1, true);
        page.continuous = None;
        transport.respond(&local_node(), Ok(page));
        let tracker = Arc::new(RecordingTracker::default());

        let err = Box::new(handler(transport, tracker.clone())).handle().await.unwrap_err();
        assert!(matches!(err, GraphError::Protocol(_)));
        assert_eq!(tracker.of_kind(TrackedKind::Error).len(), 1);
    }

    #[tokio::test]
    async fn test_invalid_page_size() {
        let transport = Arc::new(MockTransport::single());
        let config = DriverConfig::builder()
            .with_option(DriverOption::GraphPageSize, "0")
            .build();
        let handler = ContinuousGraphRequestHandler::new(
            GraphStatement::script("g.V()"),
            transport.clone(),
            GraphContext::new(config),
            module(),
            "s0|1",
        );
        assert!(matches!(
            Box::new(handler).handle().await,
            Err(GraphError::Configuration(_))
        ));
        assert!(transport.sent().is_empty());
    }
}
