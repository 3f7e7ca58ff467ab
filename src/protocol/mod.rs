//! # Wire Protocol Layer
//!
//! Low-level pieces of the binary wire protocol that the graph layer builds on.
//!
//! ## Overview
//!
//! Graph requests travel as ordinary protocol QUERY messages. This module
//! provides the parts the graph layer needs from the protocol itself:
//!
//! - **Version** - Negotiated protocol versions and their capabilities
//! - **Codec** - Generic value codec for option-map entries (TEXT, BIGINT)
//! - **Message** - Outbound QUERY / raw-bytes QUERY messages and their options
//! - **Response** - Rows pages returned by the server, including continuous paging metadata
//!
//! ## Note
//!
//! Framing, compression and connection handling live in the transport that
//! implements [`crate::graph::Transport`]; nothing here performs I/O.

pub mod codec;
pub mod error;
pub mod message;
pub mod response;
pub mod version;

pub use codec::{decode_bigint, decode_text, encode_bigint, encode_text};
pub use error::{ProtocolError, ProtocolResult};
pub use message::{
    ConsistencyLevel, ContinuousPagingOptions, Message, OptionMap, QueryOptions, RequestFrame,
};
pub use response::{ColumnSpec, ColumnType, ContinuousPageMetadata, RowsPage};
pub use version::ProtocolVersion;
