//! Row decoding.
//!
//! Every response row has a single column. Under GraphBinary the column is
//! a serialized traverser; under GraphSON it is a JSON document of the form
//! `{"result": <value>, "bulk": <n>}` (bulk optional). Either way the value
//! is emitted `bulk` times.
//!
//! Bulks come from the server and are bounded by a per-page node limit
//! before anything is allocated.

use bytes::Bytes;

use super::binary::GraphBinaryModule;
use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::graphson;
use super::node::GraphNode;
use super::types::GraphValue;
use crate::protocol::RowsPage;

/// Default limit on the nodes one page may expand to.
pub const DEFAULT_MAX_PAGE_NODES: usize = 1 << 20;

/// Decodes response rows into graph nodes for one sub-protocol.
#[derive(Debug, Clone)]
pub struct GraphRowDecoder {
    protocol: GraphProtocol,
    module: GraphBinaryModule,
    max_page_nodes: usize,
}

impl GraphRowDecoder {
    /// New decoder.
    pub fn new(protocol: GraphProtocol, module: GraphBinaryModule) -> Self {
        Self {
            protocol,
            module,
            max_page_nodes: DEFAULT_MAX_PAGE_NODES,
        }
    }

    /// Set the limit on nodes per page after bulk expansion.
    pub fn with_max_page_nodes(mut self, max: usize) -> Self {
        self.max_page_nodes = max;
        self
    }

    /// Sub-protocol in use.
    pub fn protocol(&self) -> GraphProtocol {
        self.protocol
    }

    /// Decode all rows of a page, in order.
    pub fn decode_page(&self, page: &RowsPage) -> GraphResult<Vec<GraphNode>> {
        let mut nodes = Vec::with_capacity(page.len().min(self.max_page_nodes));
        for row in &page.rows {
            self.decode_into(row, &mut nodes)?;
        }
        Ok(nodes)
    }

    /// Decode one row into zero or more nodes.
    pub fn decode_row(&self, row: &[Option<Bytes>]) -> GraphResult<Vec<GraphNode>> {
        let mut nodes = Vec::new();
        self.decode_into(row, &mut nodes)?;
        Ok(nodes)
    }

    fn decode_into(&self, row: &[Option<Bytes>], out: &mut Vec<GraphNode>) -> GraphResult<()> {
        let column = match row {
            [Some(column)] => column,
            [None] => return Err(GraphError::protocol("Graph result row has a null column")),
            _ => {
                return Err(GraphError::protocol(format!(
                    "Graph result rows must have exactly one column, got {}",
                    row.len()
                )))
            }
        };

        let value = if self.protocol.is_graph_binary() {
            self.module.deserialize(column)?
        } else {
            graphson::deserialize(column, self.protocol)?
        };
        let (value, bulk) = self.split_bulk(value)?;
        let count = self.bulk_count(bulk, out.len())?;
        out.extend(std::iter::repeat(GraphNode::new(value)).take(count));
        Ok(())
    }

    fn split_bulk(&self, value: GraphValue) -> GraphResult<(GraphValue, i64)> {
        let (value, bulk) = match value {
            GraphValue::Traverser(traverser) => (traverser.value, traverser.bulk),
            GraphValue::Map(entries) if self.protocol.is_graphson() => {
                let mut result = None;
                let mut bulk = 1;
                for (key, value) in entries {
                    match key.as_str() {
                        Some("result") => result = Some(value),
                        Some("bulk") => {
                            bulk = value.as_i64().ok_or_else(|| {
                                GraphError::protocol(format!(
                                    "Graph result bulk is not an integer: {}",
                                    value
                                ))
                            })?
                        }
                        _ => {}
                    }
                }
                let result = result.ok_or_else(|| {
                    GraphError::protocol("Graph result document has no 'result' field")
                })?;
                (result, bulk)
            }
            other if self.protocol.is_graph_binary() => (other, 1),
            other => {
                return Err(GraphError::protocol(format!(
                    "Unexpected graph result document: {}",
                    other
                )))
            }
        };

        Ok((value, bulk))
    }

    // `decoded` nodes are already in the page.
    fn bulk_count(&self, bulk: i64, decoded: usize) -> GraphResult<usize> {
        let count = usize::try_from(bulk).map_err(|_| {
            GraphError::serialization(format!("Negative graph result bulk: {}", bulk))
        })?;
        if count > self.max_page_nodes.saturating_sub(decoded) {
            return Err(GraphError::serialization(format!(
                "Graph result bulk {} exceeds the limit of {} nodes per page",
                bulk, self.max_page_nodes
            )));
        }
        Ok(count)
    }
}
