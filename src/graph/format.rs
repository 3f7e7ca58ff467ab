//! Graph sub-protocols (serialization formats).

use std::fmt;
use std::str::FromStr;

use super::error::{GraphError, GraphResult};

/// Serialization format used for graph parameters, bytecode and results.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GraphProtocol {
    /// Untyped JSON, script statements only
    GraphSon1,
    /// Typed JSON
    GraphSon2,
    /// Typed JSON with typed collections
    GraphSon3,
    /// Compact binary encoding
    GraphBinary1,
}

impl GraphProtocol {
    /// All formats.
    pub const ALL: [GraphProtocol; 4] = [
        GraphProtocol::GraphSon1,
        GraphProtocol::GraphSon2,
        GraphProtocol::GraphSon3,
        GraphProtocol::GraphBinary1,
    ];

    /// The code sent in the `graph-results` option.
    pub fn to_internal_code(self) -> &'static str {
        match self {
            GraphProtocol::GraphSon1 => "graphson-1.0",
            GraphProtocol::GraphSon2 => "graphson-2.0",
            GraphProtocol::GraphSon3 => "graphson-3.0",
            GraphProtocol::GraphBinary1 => "graph-binary-1.0",
        }
    }

    /// Look up a format by its internal code.
    pub fn from_internal_code(code: &str) -> GraphResult<Self> {
        Self::ALL
            .into_iter()
            .find(|p| p.to_internal_code() == code)
            .ok_or_else(|| {
                let known: Vec<&str> = Self::ALL.iter().map(|p| p.to_internal_code()).collect();
                GraphError::configuration(format!(
                    "Graph protocol used [\"{}\"] unknown. Possible values are: [{}]",
                    code,
                    known.join(", ")
                ))
            })
    }

    /// Check if this is the binary format.
    pub fn is_graph_binary(self) -> bool {
        matches!(self, GraphProtocol::GraphBinary1)
    }

    /// Check if this is a textual (JSON) format.
    pub fn is_graphson(self) -> bool {
        !self.is_graph_binary()
    }

    /// Check if bytecode statements can be sent in this format.
    pub fn supports_bytecode(self) -> bool {
        !matches!(self, GraphProtocol::GraphSon1)
    }
}

impl FromStr for GraphProtocol {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_internal_code(s)
    }
}

impl fmt::Display for GraphProtocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.to_internal_code())
    }
}
