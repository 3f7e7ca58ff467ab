//! In-memory collaborators for unit tests.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;

use super::binary::{GraphBinaryModule, TypeSerializerRegistry};
use super::config::ExecutionProfile;
use super::context::{Node, RequestTracker, TimestampGenerator, Transport};
use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::graphson;
use super::statement::GraphStatement;
use super::types::{GraphValue, Traverser};
use crate::protocol::{ColumnSpec, ColumnType, ContinuousPageMetadata, RequestFrame, RowsPage};

// ============================================================================
// MockTransport
// ============================================================================

/// Transport answering from per-node scripts.
#[derive(Default)]
pub(crate) struct MockTransport {
    nodes: Vec<Node>,
    responses: Mutex<HashMap<Node, VecDeque<GraphResult<RowsPage>>>>,
    next_pages: Mutex<HashMap<Node, VecDeque<GraphResult<RowsPage>>>>,
    sent: Mutex<Vec<(Node, RequestFrame)>>,
    next_page_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    stall_next_page: AtomicBool,
}

impl MockTransport {
    pub(crate) fn new(nodes: Vec<Node>) -> Self {
        Self {
            nodes,
            ..Default::default()
        }
    }

    /// Single node at 127.0.0.1:9042.
    pub(crate) fn single() -> Self {
        Self::new(vec![local_node()])
    }

    /// Queue the answer to the next `send` on a node.
    pub(crate) fn respond(&self, node: &Node, response: GraphResult<RowsPage>) {
        self.responses
            .lock()
            .entry(node.clone())
            .or_default()
            .push_back(response);
    }

    /// Queue the answer to the next `request_next_page` on a node.
    pub(crate) fn next_page(&self, node: &Node, response: GraphResult<RowsPage>) {
        self.next_pages
            .lock()
            .entry(node.clone())
            .or_default()
            .push_back(response);
    }

    /// Make `request_next_page` never complete.
    pub(crate) fn stall_next_page(&self) {
        self.stall_next_page.store(true, Ordering::SeqCst);
    }

    pub(crate) fn sent(&self) -> Vec<(Node, RequestFrame)> {
        self.sent.lock().clone()
    }

    pub(crate) fn sent_to(&self) -> Vec<Node> {
        self.sent.lock().iter().map(|(node, _)| node.clone()).collect()
    }

    pub(crate) fn next_page_calls(&self) -> usize {
        self.next_page_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }

    /// Yield until a spawned cancel reached the transport.
    pub(crate) async fn wait_for_cancel(&self) -> usize {
        for _ in 0..16 {
            if self.cancel_calls() > 0 {
                break;
            }
            tokio::task::yield_now().await;
        }
        self.cancel_calls()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn nodes(&self) -> Vec<Node> {
        self.nodes.clone()
    }

    async fn send(&self, node: &Node, request: RequestFrame) -> GraphResult<RowsPage> {
        self.sent.lock().push((node.clone(), request));
        self.responses
            .lock()
            .get_mut(node)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(GraphError::connection(format!("no response scripted for {}", node))))
    }

    async fn request_next_page(&self, node: &Node, _stream_id: i16) -> GraphResult<RowsPage> {
        self.next_page_calls.fetch_add(1, Ordering::SeqCst);
        if self.stall_next_page.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        self.next_pages
            .lock()
            .get_mut(node)
            .and_then(|queue| queue.pop_front())
            .unwrap_or_else(|| Err(GraphError::connection(format!("no page scripted for {}", node))))
    }

    async fn cancel(&self, _node: &Node, _stream_id: i16) -> GraphResult<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// ============================================================================
// RecordingTracker
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TrackedKind {
    Success,
    Error,
    NodeError,
}

#[derive(Debug, Clone)]
pub(crate) struct TrackedEvent {
    pub kind: TrackedKind,
    pub profile: String,
    pub node: Option<Node>,
    pub log_prefix: String,
}

/// Tracker that keeps every notification.
#[derive(Debug, Default)]
pub(crate) struct RecordingTracker {
    events: Mutex<Vec<TrackedEvent>>,
}

impl RecordingTracker {
    pub(crate) fn events(&self) -> Vec<TrackedEvent> {
        self.events.lock().clone()
    }

    pub(crate) fn of_kind(&self, kind: TrackedKind) -> Vec<TrackedEvent> {
        self.events().into_iter().filter(|e| e.kind == kind).collect()
    }

    fn record(&self, kind: TrackedKind, profile: &ExecutionProfile, node: Option<&Node>, prefix: &str) {
        self.events.lock().push(TrackedEvent {
            kind,
            profile: profile.name().to_string(),
            node: node.cloned(),
            log_prefix: prefix.to_string(),
        });
    }
}

impl RequestTracker for RecordingTracker {
    fn on_success(
        &self,
        _statement: &GraphStatement,
        _latency: Duration,
        profile: &ExecutionProfile,
        node: &Node,
        log_prefix: &str,
    ) {
        self.record(TrackedKind::Success, profile, Some(node), log_prefix);
    }

    fn on_error(
        &self,
        _statement: &GraphStatement,
        _error: &GraphError,
        _latency: Duration,
        profile: &ExecutionProfile,
        node: Option<&Node>,
        log_prefix: &str,
    ) {
        self.record(TrackedKind::Error, profile, node, log_prefix);
    }

    fn on_node_error(
        &self,
        _statement: &GraphStatement,
        _error: &GraphError,
        _latency: Duration,
        profile: &ExecutionProfile,
        node: &Node,
        log_prefix: &str,
    ) {
        self.record(TrackedKind::NodeError, profile, Some(node), log_prefix);
    }
}

/// Always the same timestamp.
#[derive(Debug)]
pub(crate) struct FixedTimestampGenerator(pub i64);

impl TimestampGenerator for FixedTimestampGenerator {
    fn next(&self) -> i64 {
        self.0
    }
}

// ============================================================================
// Pages
// ============================================================================

pub(crate) fn local_node() -> Node {
    Node::new("127.0.0.1", 9042)
}

pub(crate) fn module() -> GraphBinaryModule {
    GraphBinaryModule::new(Arc::new(TypeSerializerRegistry::dse()))
}

/// A page with one row per value, encoded for `protocol`.
pub(crate) fn rows(protocol: GraphProtocol, values: &[GraphValue]) -> RowsPage {
    let module = module();
    let rows = values
        .iter()
        .map(|value| {
            if protocol.is_graph_binary() {
                let traverser = GraphValue::Traverser(Box::new(Traverser::new(value.clone(), 1)));
                module.serialize(&traverser).unwrap()
            } else {
                let json = String::from_utf8(graphson::serialize(value, protocol).unwrap()).unwrap();
                Bytes::from(format!(r#"{{"result": {}}}"#, json))
            }
        })
        .collect();
    let column_type = if protocol.is_graph_binary() {
        ColumnType::Blob
    } else {
        ColumnType::Varchar
    };
    RowsPage::single_column(ColumnSpec::new("gremlin", column_type), rows)
}

/// A continuous page of integers.
pub(crate) fn int_page(protocol: GraphProtocol, values: &[i32], page_number: i32, last: bool) -> RowsPage {
    let values: Vec<GraphValue> = values.iter().map(|v| GraphValue::Int(*v)).collect();
    rows(protocol, &values).with_continuous(ContinuousPageMetadata {
        stream_id: 7,
        page_number,
        last,
    })
}
