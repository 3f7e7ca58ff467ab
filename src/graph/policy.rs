//! Load balancing and retry policies.
//!
//! Both are consulted per request: the load balancing policy orders the
//! candidate nodes into a query plan, the retry policy decides what happens
//! after a failed attempt.

use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use rand::seq::SliceRandom;

use super::context::Node;
use super::error::GraphError;
use super::statement::GraphStatement;

// ============================================================================
// Load balancing
// ============================================================================

/// Orders candidate nodes for a request.
pub trait LoadBalancingPolicy: Send + Sync + fmt::Debug {
    /// Build the query plan: nodes to try, in order.
    fn new_query_plan(&self, statement: &GraphStatement, nodes: &[Node]) -> VecDeque<Node>;
}

/// Rotates the node list by one position per request.
#[derive(Debug, Default)]
pub struct RoundRobinPolicy {
    index: AtomicUsize,
}

impl RoundRobinPolicy {
    /// New policy starting at the first node.
    pub fn new() -> Self {
        Self::default()
    }
}

impl LoadBalancingPolicy for RoundRobinPolicy {
    fn new_query_plan(&self, _statement: &GraphStatement, nodes: &[Node]) -> VecDeque<Node> {
        if nodes.is_empty() {
            return VecDeque::new();
        }
        let start = self.index.fetch_add(1, Ordering::Relaxed) % nodes.len();
        let mut plan: VecDeque<Node> = nodes.iter().cloned().collect();
        plan.rotate_left(start);
        plan
    }
}

/// Shuffles the node list for each request.
#[derive(Debug, Default)]
pub struct RandomPolicy;

impl LoadBalancingPolicy for RandomPolicy {
    fn new_query_plan(&self, _statement: &GraphStatement, nodes: &[Node]) -> VecDeque<Node> {
        let mut shuffled = nodes.to_vec();
        shuffled.shuffle(&mut rand::thread_rng());
        shuffled.into()
    }
}

// ============================================================================
// Retry
// ============================================================================

/// What to do after a failed attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// Try again
    Retry,
    /// Give up and surface the error
    Rethrow,
}

/// Decides whether a failed attempt is retried.
pub trait RetryPolicy: Send + Sync + fmt::Debug {
    /// Called after the `retry_count`-th retry (0 for the first attempt) failed.
    fn on_error(
        &self,
        statement: &GraphStatement,
        error: &GraphError,
        retry_count: u32,
    ) -> RetryDecision;
}

/// Retries retryable errors up to a bound.
///
/// Non-idempotent statements are not retried after errors that may have
/// been applied by the server.
#[derive(Debug, Clone)]
pub struct DefaultRetryPolicy {
    max_retries: u32,
}

impl DefaultRetryPolicy {
    /// New policy.
    pub fn new(max_retries: u32) -> Self {
        Self { max_retries }
    }

    /// Retry bound.
    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }
}

impl RetryPolicy for DefaultRetryPolicy {
    fn on_error(
        &self,
        statement: &GraphStatement,
        error: &GraphError,
        retry_count: u32,
    ) -> RetryDecision {
        if retry_count >= self.max_retries || !error.is_retryable() {
            return RetryDecision::Rethrow;
        }
        if !statement.is_idempotent() && error.may_have_executed() {
            return RetryDecision::Rethrow;
        }
        RetryDecision::Retry
    }
}
