//! Outbound request messages.
//!
//! Graph requests are sent as QUERY messages. Script statements use the
//! regular textual form; bytecode statements use a raw-bytes form whose query
//! string is either serialized JSON bytecode or the empty-string sentinel.

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use bytes::Bytes;

use super::error::ProtocolError;

/// Out-of-band key/value map attached to a request (the custom payload).
pub type OptionMap = HashMap<String, Bytes>;

// ============================================================================
// ConsistencyLevel
// ============================================================================

/// Request consistency levels with their protocol codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConsistencyLevel {
    /// ANY
    Any,
    /// ONE
    One,
    /// TWO
    Two,
    /// THREE
    Three,
    /// QUORUM
    Quorum,
    /// ALL
    All,
    /// LOCAL_QUORUM
    LocalQuorum,
    /// EACH_QUORUM
    EachQuorum,
    /// SERIAL
    Serial,
    /// LOCAL_SERIAL
    LocalSerial,
    /// LOCAL_ONE
    LocalOne,
}

impl ConsistencyLevel {
    /// Get the protocol code.
    pub fn code(self) -> u16 {
        match self {
            ConsistencyLevel::Any => 0x0000,
            ConsistencyLevel::One => 0x0001,
            ConsistencyLevel::Two => 0x0002,
            ConsistencyLevel::Three => 0x0003,
            ConsistencyLevel::Quorum => 0x0004,
            ConsistencyLevel::All => 0x0005,
            ConsistencyLevel::LocalQuorum => 0x0006,
            ConsistencyLevel::EachQuorum => 0x0007,
            ConsistencyLevel::Serial => 0x0008,
            ConsistencyLevel::LocalSerial => 0x0009,
            ConsistencyLevel::LocalOne => 0x000A,
        }
    }

    /// Create from a protocol code.
    pub fn from_code(code: u16) -> Result<Self, ProtocolError> {
        match code {
            0x0000 => Ok(ConsistencyLevel::Any),
            0x0001 => Ok(ConsistencyLevel::One),
            0x0002 => Ok(ConsistencyLevel::Two),
            0x0003 => Ok(ConsistencyLevel::Three),
            0x0004 => Ok(ConsistencyLevel::Quorum),
            0x0005 => Ok(ConsistencyLevel::All),
            0x0006 => Ok(ConsistencyLevel::LocalQuorum),
            0x0007 => Ok(ConsistencyLevel::EachQuorum),
            0x0008 => Ok(ConsistencyLevel::Serial),
            0x0009 => Ok(ConsistencyLevel::LocalSerial),
            0x000A => Ok(ConsistencyLevel::LocalOne),
            other => Err(ProtocolError::UnknownConsistency(format!("0x{:04X}", other))),
        }
    }

    /// Get the canonical name, as used in configuration and option maps.
    pub fn name(self) -> &'static str {
        match self {
            ConsistencyLevel::Any => "ANY",
            ConsistencyLevel::One => "ONE",
            ConsistencyLevel::Two => "TWO",
            ConsistencyLevel::Three => "THREE",
            ConsistencyLevel::Quorum => "QUORUM",
            ConsistencyLevel::All => "ALL",
            ConsistencyLevel::LocalQuorum => "LOCAL_QUORUM",
            ConsistencyLevel::EachQuorum => "EACH_QUORUM",
            ConsistencyLevel::Serial => "SERIAL",
            ConsistencyLevel::LocalSerial => "LOCAL_SERIAL",
            ConsistencyLevel::LocalOne => "LOCAL_ONE",
        }
    }

    /// Check if this is a serial (lightweight transaction) level.
    pub fn is_serial(self) -> bool {
        matches!(self, ConsistencyLevel::Serial | ConsistencyLevel::LocalSerial)
    }
}

impl FromStr for ConsistencyLevel {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ANY" => Ok(ConsistencyLevel::Any),
            "ONE" => Ok(ConsistencyLevel::One),
            "TWO" => Ok(ConsistencyLevel::Two),
            "THREE" => Ok(ConsistencyLevel::Three),
            "QUORUM" => Ok(ConsistencyLevel::Quorum),
            "ALL" => Ok(ConsistencyLevel::All),
            "LOCAL_QUORUM" => Ok(ConsistencyLevel::LocalQuorum),
            "EACH_QUORUM" => Ok(ConsistencyLevel::EachQuorum),
            "SERIAL" => Ok(ConsistencyLevel::Serial),
            "LOCAL_SERIAL" => Ok(ConsistencyLevel::LocalSerial),
            "LOCAL_ONE" => Ok(ConsistencyLevel::LocalOne),
            _ => Err(ProtocolError::UnknownConsistency(s.to_string())),
        }
    }
}

impl fmt::Display for ConsistencyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

// ============================================================================
// QueryOptions
// ============================================================================

/// Continuous paging parameters (DSE protocol versions only).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ContinuousPagingOptions {
    /// Maximum number of pages to return, 0 for no limit
    pub max_pages: i32,
    /// Maximum pages per second the server may push, 0 for no limit
    pub max_pages_per_second: i32,
    /// Pages the server may send before waiting for a revision, 0 for no limit
    pub next_pages: i32,
}

/// Options attached to a QUERY message.
#[derive(Debug, Clone, PartialEq)]
pub struct QueryOptions {
    /// Request consistency
    pub consistency: ConsistencyLevel,
    /// Positional bound values
    pub positional_values: Vec<Bytes>,
    /// Named bound values
    pub named_values: HashMap<String, Bytes>,
    /// Skip result metadata
    pub skip_metadata: bool,
    /// Page size, -1 to disable paging
    pub page_size: i32,
    /// Paging state of a previous page
    pub paging_state: Option<Bytes>,
    /// Serial consistency
    pub serial_consistency: ConsistencyLevel,
    /// Default timestamp, `i64::MIN` when none
    pub default_timestamp: i64,
    /// Continuous paging parameters
    pub continuous_paging: Option<ContinuousPagingOptions>,
}

impl QueryOptions {
    /// Sentinel meaning "no default timestamp".
    pub const NO_DEFAULT_TIMESTAMP: i64 = i64::MIN;

    /// Create options with the given consistency and no bound values.
    pub fn new(consistency: ConsistencyLevel) -> Self {
        Self {
            consistency,
            positional_values: Vec::new(),
            named_values: HashMap::new(),
            skip_metadata: false,
            page_size: -1,
            paging_state: None,
            serial_consistency: ConsistencyLevel::LocalSerial,
            default_timestamp: Self::NO_DEFAULT_TIMESTAMP,
            continuous_paging: None,
        }
    }

    /// Check if a default timestamp is set.
    pub fn has_default_timestamp(&self) -> bool {
        self.default_timestamp != Self::NO_DEFAULT_TIMESTAMP
    }
}

impl Default for QueryOptions {
    fn default() -> Self {
        Self::new(ConsistencyLevel::LocalOne)
    }
}

// ============================================================================
// Message
// ============================================================================

/// Outbound request message.
#[derive(Debug, Clone, PartialEq)]
pub enum Message {
    /// QUERY with a textual query string
    Query {
        /// Query text
        query: String,
        /// Query options
        options: QueryOptions,
    },
    /// QUERY whose query string is given as raw bytes
    RawBytesQuery {
        /// Query bytes
        query: Bytes,
        /// Query options
        options: QueryOptions,
    },
}

impl Message {
    /// Get the query options.
    pub fn options(&self) -> &QueryOptions {
        match self {
            Message::Query { options, .. } | Message::RawBytesQuery { options, .. } => options,
        }
    }

    /// Get the query string bytes.
    pub fn query_bytes(&self) -> &[u8] {
        match self {
            Message::Query { query, .. } => query.as_bytes(),
            Message::RawBytesQuery { query, .. } => query,
        }
    }

    /// Message name, for logs.
    pub fn name(&self) -> &'static str {
        match self {
            Message::Query { .. } => "QUERY",
            Message::RawBytesQuery { .. } => "QUERY(raw)",
        }
    }
}

/// A message ready to be written to a node, with its option map.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestFrame {
    /// The message
    pub message: Message,
    /// Custom payload
    pub custom_payload: OptionMap,
    /// Request server-side tracing
    pub tracing: bool,
}

impl RequestFrame {
    /// Create a frame.
    pub fn new(message: Message, custom_payload: OptionMap) -> Self {
        Self {
            message,
            custom_payload,
            tracing: false,
        }
    }

    /// Enable server-side tracing.
    pub fn with_tracing(mut self, tracing: bool) -> Self {
        self.tracing = tracing;
        self
    }
}
