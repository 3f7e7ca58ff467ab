//! Graph Error Types

use std::io;
use thiserror::Error;

use crate::protocol::ProtocolError;

// ============================================================================
// GraphError
// ============================================================================

/// Errors raised while converting, dispatching or decoding graph requests.
#[derive(Error, Debug)]
pub enum GraphError {
    /// A required option is missing or malformed
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A value could not be encoded or a buffer could not be decoded
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The request could not be written to the node
    #[error("Connection error: {0}")]
    Connection(String),

    /// The node did not answer in time
    #[error("Timeout: {0}")]
    Timeout(String),

    /// The node answered with an error
    #[error("Server error: 0x{code:04X} - {message}")]
    Server { code: i32, message: String },

    /// Unexpected response shape
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Every candidate node was tried or excluded
    #[error("No node was available to execute the request: {0}")]
    NoNodeAvailable(String),

    /// The request was cancelled
    #[error("Request cancelled: {0}")]
    Cancelled(String),

    /// A result element is not of the requested type
    #[error("Type conversion error: {0}")]
    TypeConversion(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl GraphError {
    /// Create a configuration error.
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// Create a serialization error.
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Create a connection error.
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a timeout error.
    pub fn timeout(msg: impl Into<String>) -> Self {
        Self::Timeout(msg.into())
    }

    /// Create a server error.
    pub fn server(code: i32, message: impl Into<String>) -> Self {
        Self::Server {
            code,
            message: message.into(),
        }
    }

    /// Create a protocol error.
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a cancellation error.
    pub fn cancelled(msg: impl Into<String>) -> Self {
        Self::Cancelled(msg.into())
    }

    /// Create a type conversion error.
    pub fn type_conversion(msg: impl Into<String>) -> Self {
        Self::TypeConversion(msg.into())
    }

    /// Create an internal error.
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Whether another attempt, possibly on another node, could succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::Timeout(_) => true,
            Self::Server { code, .. } => ServerErrorCode::is_retryable(*code),
            _ => false,
        }
    }

    /// Whether the request may have been applied by the server before failing.
    ///
    /// Non-idempotent statements are never retried after such errors.
    pub fn may_have_executed(&self) -> bool {
        match self {
            Self::Timeout(_) => true,
            Self::Server { code, .. } => {
                *code == ServerErrorCode::READ_TIMEOUT || *code == ServerErrorCode::WRITE_TIMEOUT
            }
            _ => false,
        }
    }

    /// Whether the error comes from the caller's input rather than the cluster.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_) | Self::Serialization(_) | Self::TypeConversion(_)
        )
    }
}

impl From<ProtocolError> for GraphError {
    fn from(err: ProtocolError) -> Self {
        match err {
            ProtocolError::UnknownConsistency(_) => GraphError::Configuration(err.to_string()),
            _ => GraphError::Serialization(err.to_string()),
        }
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// Graph result type.
pub type GraphResult<T> = Result<T, GraphError>;

// ============================================================================
// Server Error Codes
// ============================================================================

/// Error codes returned by the server in ERROR responses.
pub struct ServerErrorCode;

impl ServerErrorCode {
    /// Server-side internal error
    pub const SERVER_ERROR: i32 = 0x0000;
    /// Not enough replicas alive
    pub const UNAVAILABLE: i32 = 0x1000;
    /// Coordinator is overloaded
    pub const OVERLOADED: i32 = 0x1001;
    /// Coordinator is still bootstrapping
    pub const IS_BOOTSTRAPPING: i32 = 0x1002;
    /// Replicas did not acknowledge a write in time
    pub const WRITE_TIMEOUT: i32 = 0x1100;
    /// Replicas did not answer a read in time
    pub const READ_TIMEOUT: i32 = 0x1200;
    /// Query syntax error
    pub const SYNTAX_ERROR: i32 = 0x2000;
    /// Invalid query
    pub const INVALID: i32 = 0x2200;

    /// Whether the code signals a transient node condition.
    pub fn is_retryable(code: i32) -> bool {
        matches!(
            code,
            Self::UNAVAILABLE
                | Self::OVERLOADED
                | Self::IS_BOOTSTRAPPING
                | Self::READ_TIMEOUT
                | Self::WRITE_TIMEOUT
        )
    }
}
