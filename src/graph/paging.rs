//! Paging capability checks and sub-protocol inference.

use std::fmt;
use std::str::FromStr;

use tracing::trace;

use super::config::{DriverOption, ExecutionProfile};
use super::conversions::GRAPH_RESULTS_KEY;
use super::error::{GraphError, GraphResult};
use super::format::GraphProtocol;
use super::statement::GraphStatement;
use crate::protocol::{decode_text, ContinuousPagingOptions, ProtocolVersion};

// ============================================================================
// PagingEnabled
// ============================================================================

/// Continuous paging switch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PagingEnabled {
    /// Always page
    Enabled,
    /// Never page
    Disabled,
    /// Page when the negotiated protocol supports it
    #[default]
    Auto,
}

impl FromStr for PagingEnabled {
    type Err = GraphError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ENABLED" => Ok(PagingEnabled::Enabled),
            "DISABLED" => Ok(PagingEnabled::Disabled),
            "AUTO" => Ok(PagingEnabled::Auto),
            _ => Err(GraphError::configuration(format!(
                "Invalid value '{}' for {}: expected ENABLED, DISABLED or AUTO",
                s,
                DriverOption::GraphPagingEnabled
            ))),
        }
    }
}

impl fmt::Display for PagingEnabled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PagingEnabled::Enabled => "ENABLED",
            PagingEnabled::Disabled => "DISABLED",
            PagingEnabled::Auto => "AUTO",
        })
    }
}

// ============================================================================
// Capability checks
// ============================================================================

/// Decide whether a statement runs with continuous paging.
///
/// The statement's explicit setting wins, then the profile's. `AUTO`
/// enables paging when the negotiated protocol version supports it.
pub fn is_paging_enabled(
    statement: &GraphStatement,
    profile: &ExecutionProfile,
    protocol_version: ProtocolVersion,
) -> GraphResult<bool> {
    let setting = match statement.options().paging_enabled {
        Some(setting) => setting,
        None => match profile.get_raw(DriverOption::GraphPagingEnabled) {
            Some(raw) => raw.parse()?,
            None => PagingEnabled::Auto,
        },
    };

    let enabled = match setting {
        PagingEnabled::Enabled => true,
        PagingEnabled::Disabled => false,
        PagingEnabled::Auto => protocol_version.supports_continuous_paging(),
    };
    trace!(
        "Paging {} for {} ({} on {})",
        if enabled { "enabled" } else { "disabled" },
        statement.describe(),
        setting,
        protocol_version
    );
    Ok(enabled)
}

/// Pick the sub-protocol for a statement.
///
/// Order: a `graph-results` entry in the statement's option map, the
/// statement's sub-protocol, the profile's sub-protocol, then GraphBinary
/// when paging and GraphSON 2.0 otherwise.
pub fn infer_graph_protocol(
    statement: &GraphStatement,
    profile: &ExecutionProfile,
    paging_enabled: bool,
) -> GraphResult<GraphProtocol> {
    let options = statement.options();

    if let Some(bytes) = options.custom_payload.get(GRAPH_RESULTS_KEY) {
        let code = decode_text(bytes)?;
        return GraphProtocol::from_internal_code(&code);
    }
    if let Some(code) = &options.sub_protocol {
        return GraphProtocol::from_internal_code(code);
    }
    if let Some(code) = profile.get_raw(DriverOption::GraphSubProtocol) {
        return GraphProtocol::from_internal_code(code);
    }

    Ok(if paging_enabled {
        GraphProtocol::GraphBinary1
    } else {
        GraphProtocol::GraphSon2
    })
}

// ============================================================================
// PagingSettings
// ============================================================================

/// Continuous paging parameters read from a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PagingSettings {
    /// Rows per page
    pub page_size: i32,
    /// Page limit, 0 for none
    pub max_pages: i32,
    /// Page rate limit, 0 for none
    pub max_pages_per_second: i32,
    /// Pages the server may push ahead of the consumer
    pub max_enqueued_pages: i32,
}

impl PagingSettings {
    /// Read from a profile.
    pub fn from_profile(profile: &ExecutionProfile) -> GraphResult<Self> {
        let settings = Self {
            page_size: profile.get_int(DriverOption::GraphPageSize, 5000)?,
            max_pages: profile.get_int(DriverOption::GraphMaxPages, 0)?,
            max_pages_per_second: profile.get_int(DriverOption::GraphMaxPagesPerSecond, 0)?,
            max_enqueued_pages: profile.get_int(DriverOption::GraphMaxEnqueuedPages, 4)?,
        };
        if settings.page_size <= 0 {
            return Err(GraphError::configuration(format!(
                "{} must be positive, got {}",
                DriverOption::GraphPageSize,
                settings.page_size
            )));
        }
        Ok(settings)
    }

    /// Message-level paging options.
    pub fn to_options(self) -> ContinuousPagingOptions {
        ContinuousPagingOptions {
            max_pages: self.max_pages,
            max_pages_per_second: self.max_pages_per_second,
            next_pages: self.max_enqueued_pages,
        }
    }
}
