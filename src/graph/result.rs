//! Graph result sets.
//!
//! [`AsyncGraphResultSet`] is one page of nodes plus, for continuously
//! paged requests, a handle to fetch the next page. Pages are only
//! requested when the caller asks for them, either with
//! [`AsyncGraphResultSet::fetch_next_page`] or by pulling from the
//! [`GraphNodeStream`] returned by [`AsyncGraphResultSet::into_stream`].
//!
//! # Example
//!
//! ```ignore
//! use tokio_stream::StreamExt;
//!
//! let result = session.execute_async(GraphStatement::script("g.V()")).await?;
//! let mut nodes = result.into_stream();
//! while let Some(node) = nodes.next().await {
//!     println!("{}", node?);
//! }
//! ```

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures::Stream;

use super::context::Node;
use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::node::GraphNode;
use super::statement::GraphStatement;

// ============================================================================
// ExecutionInfo
// ============================================================================

/// How a request (or one of its pages) was executed.
#[derive(Debug, Clone)]
pub struct ExecutionInfo {
    /// The statement
    pub statement: GraphStatement,
    /// Node that answered
    pub coordinator: Node,
    /// Sub-protocol of the results
    pub protocol: GraphProtocol,
    /// Retries before the successful attempt
    pub retry_count: u32,
    /// Errors of failed attempts, by node
    pub errors: Vec<(Node, String)>,
    /// Server warnings
    pub warnings: Vec<String>,
    /// Page number, for continuous paging
    pub page_number: Option<i32>,
    /// Log prefix of the successful execution
    pub log_prefix: String,
}

// ============================================================================
// Page fetching
// ============================================================================

/// Source of further pages of a continuously paged request.
#[async_trait]
pub(crate) trait PageFetcher: Send + Sync {
    /// Fetch the next page.
    async fn fetch_next(&self) -> GraphResult<AsyncGraphResultSet>;

    /// Cancel the request.
    fn cancel(&self);

    /// Whether the request was cancelled.
    fn is_cancelled(&self) -> bool;
}

/// Cancels a continuously paged request from anywhere.
#[derive(Clone)]
pub struct CancelHandle {
    fetcher: Option<Arc<dyn PageFetcher>>,
}

impl CancelHandle {
    /// Cancel. Idempotent; a no-op for single-page results.
    pub fn cancel(&self) {
        if let Some(fetcher) = &self.fetcher {
            fetcher.cancel();
        }
    }

    /// Whether the request was cancelled.
    pub fn is_cancelled(&self) -> bool {
        self.fetcher.as_ref().map_or(false, |f| f.is_cancelled())
    }
}

impl fmt::Debug for CancelHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancelHandle")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

// ============================================================================
// AsyncGraphResultSet
// ============================================================================

/// One page of graph results.
pub struct AsyncGraphResultSet {
    current_page: Vec<GraphNode>,
    execution_info: ExecutionInfo,
    has_more_pages: bool,
    fetcher: Option<Arc<dyn PageFetcher>>,
}

impl AsyncGraphResultSet {
    /// Result of a single-page request.
    pub(crate) fn single_page(nodes: Vec<GraphNode>, execution_info: ExecutionInfo) -> Self {
        Self {
            current_page: nodes,
            execution_info,
            has_more_pages: false,
            fetcher: None,
        }
    }

    /// One page of a continuously paged request.
    pub(crate) fn paged(
        nodes: Vec<GraphNode>,
        execution_info: ExecutionInfo,
        has_more_pages: bool,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Self {
        Self {
            current_page: nodes,
            execution_info,
            has_more_pages,
            fetcher: Some(fetcher),
        }
    }

    /// Nodes of the current page.
    pub fn current_page(&self) -> &[GraphNode] {
        &self.current_page
    }

    /// Number of nodes in the current page.
    pub fn remaining(&self) -> usize {
        self.current_page.len()
    }

    /// First node of the current page.
    pub fn one(&self) -> Option<&GraphNode> {
        self.current_page.first()
    }

    /// Take the nodes of the current page.
    pub fn take_current_page(&mut self) -> Vec<GraphNode> {
        std::mem::take(&mut self.current_page)
    }

    /// Whether another page can be fetched.
    pub fn has_more_pages(&self) -> bool {
        self.has_more_pages
    }

    /// Execution details of this page.
    pub fn execution_info(&self) -> &ExecutionInfo {
        &self.execution_info
    }

    /// Fetch the next page.
    pub async fn fetch_next_page(self) -> GraphResult<AsyncGraphResultSet> {
        match (&self.fetcher, self.has_more_pages) {
            (Some(fetcher), true) => fetcher.fetch_next().await,
            _ => Err(GraphError::internal(
                "No next page, check has_more_pages() before fetching",
            )),
        }
    }

    /// Cancel the remaining pages. Idempotent.
    pub fn cancel(&self) {
        self.cancel_handle().cancel();
    }

    /// Handle to cancel the remaining pages from elsewhere.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            fetcher: self.fetcher.clone(),
        }
    }

    /// Stream all nodes, fetching pages as they are consumed.
    pub fn into_stream(self) -> GraphNodeStream {
        GraphNodeStream::new(self)
    }
}

impl fmt::Debug for AsyncGraphResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncGraphResultSet")
            .field("remaining", &self.current_page.len())
            .field("has_more_pages", &self.has_more_pages)
            .field("coordinator", &self.execution_info.coordinator)
            .finish()
    }
}

// ============================================================================
// GraphNodeStream
// ============================================================================

/// Lazy stream over every node of a result, across pages.
pub struct GraphNodeStream {
    inner: Pin<Box<dyn Stream<Item = GraphResult<GraphNode>> + Send>>,
}

impl GraphNodeStream {
    fn new(mut first: AsyncGraphResultSet) -> Self {
        let buffer: VecDeque<GraphNode> = first.take_current_page().into();
        let stream = futures::stream::unfold(
            (buffer, Some(first)),
            |(mut buffer, mut rest)| async move {
                loop {
                    if let Some(node) = buffer.pop_front() {
                        return Some((Ok(node), (buffer, rest)));
                    }
                    let result_set = rest.take()?;
                    if !result_set.has_more_pages() {
                        return None;
                    }
                    match result_set.fetch_next_page().await {
                        Ok(mut next) => {
                            buffer = next.take_current_page().into();
                            rest = Some(next);
                        }
                        Err(e) => return Some((Err(e), (buffer, None))),
                    }
                }
            },
        );
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Collect every node; stops at the first error.
    pub async fn try_collect(self) -> GraphResult<Vec<GraphNode>> {
        use tokio_stream::StreamExt;

        let mut nodes = Vec::new();
        let mut stream = self.inner;
        while let Some(node) = stream.next().await {
            nodes.push(node?);
        }
        Ok(nodes)
    }

    /// First node.
    pub async fn first(self) -> Option<GraphResult<GraphNode>> {
        use tokio_stream::StreamExt;

        let mut stream = self.inner;
        stream.next().await
    }
}

impl Stream for GraphNodeStream {
    type Item = GraphResult<GraphNode>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

impl fmt::Debug for GraphNodeStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphNodeStream").finish_non_exhaustive()
    }
}

// ============================================================================
// GraphResultSet
// ============================================================================

/// Blocking iterator over every node of a result, across pages.
///
/// Fetching a page blocks the calling thread; do not use from async code.
pub struct GraphResultSet {
    buffer: VecDeque<GraphNode>,
    current: Option<AsyncGraphResultSet>,
    execution_infos: Vec<ExecutionInfo>,
}

impl GraphResultSet {
    /// Wrap the first page of a result.
    pub fn new(mut first: AsyncGraphResultSet) -> Self {
        Self {
            buffer: first.take_current_page().into(),
            execution_infos: vec![first.execution_info().clone()],
            current: Some(first),
        }
    }

    /// Execution details of every page fetched so far.
    pub fn execution_infos(&self) -> &[ExecutionInfo] {
        &self.execution_infos
    }

    /// Execution details of the first page.
    pub fn execution_info(&self) -> Option<&ExecutionInfo> {
        self.execution_infos.first()
    }

    /// Collect every remaining node.
    pub fn all(self) -> GraphResult<Vec<GraphNode>> {
        self.collect()
    }

    /// Next node, or `None` when the result is exhausted.
    pub fn one(&mut self) -> GraphResult<Option<GraphNode>> {
        self.next().transpose()
    }

    /// Cancel the remaining pages.
    pub fn cancel(&self) {
        if let Some(current) = &self.current {
            current.cancel();
        }
    }
}

impl Iterator for GraphResultSet {
    type Item = GraphResult<GraphNode>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(node) = self.buffer.pop_front() {
                return Some(Ok(node));
            }
            let current = self.current.take()?;
            if !current.has_more_pages() {
                return None;
            }
            match futures::executor::block_on(current.fetch_next_page()) {
                Ok(mut next) => {
                    self.buffer = next.take_current_page().into();
                    self.execution_infos.push(next.execution_info().clone());
                    self.current = Some(next);
                }
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

impl fmt::Debug for GraphResultSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GraphResultSet")
            .field("buffered", &self.buffer.len())
            .field("pages", &self.execution_infos.len())
            .finish()
    }
}
