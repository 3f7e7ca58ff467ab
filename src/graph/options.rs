//! Option resolution.
//!
//! Every field is looked up in three tiers: the statement override, the
//! statement's execution profile, then the default profile (which carries
//! the built-in defaults). System queries drop the graph name and the
//! traversal source whatever their source.

use std::sync::Arc;
use std::time::Duration;

use super::config::{DriverConfig, DriverOption, ExecutionProfile};
use super::context::TimestampGenerator;
use super::error::{GraphError, GraphResult};
use super::statement::GraphStatement;
use crate::protocol::ConsistencyLevel;

/// Effective options of one request.
#[derive(Debug, Clone)]
pub struct ResolvedOptions {
    /// Profile the request runs with
    pub profile: Arc<ExecutionProfile>,
    /// Request consistency
    pub consistency: ConsistencyLevel,
    /// Serial consistency
    pub serial_consistency: ConsistencyLevel,
    /// Server-side timeout; `None` when unset or zero
    pub timeout: Option<Duration>,
    /// Graph name
    pub graph_name: Option<String>,
    /// Traversal source
    pub traversal_source: Option<String>,
    /// Graph read consistency, as sent
    pub read_consistency: Option<String>,
    /// Graph write consistency, as sent
    pub write_consistency: Option<String>,
    /// System query flag
    pub system_query: bool,
    /// Default timestamp, `i64::MIN` for none
    pub timestamp: i64,
    /// Idempotence
    pub idempotent: bool,
}

/// Resolve the options of a statement.
pub fn resolve(
    statement: &GraphStatement,
    config: &DriverConfig,
    timestamps: &dyn TimestampGenerator,
) -> GraphResult<ResolvedOptions> {
    let overrides = statement.options();
    let profile = config.profile(overrides.execution_profile_name.as_deref())?;

    let consistency = match overrides.consistency {
        Some(level) => level,
        None => profile_consistency(&profile, DriverOption::RequestConsistency)?
            .unwrap_or(ConsistencyLevel::LocalOne),
    };
    let serial_consistency = profile_consistency(&profile, DriverOption::RequestSerialConsistency)?
        .unwrap_or(ConsistencyLevel::Serial);
    if !serial_consistency.is_serial() {
        return Err(GraphError::configuration(format!(
            "{} must be SERIAL or LOCAL_SERIAL, got {}",
            DriverOption::RequestSerialConsistency,
            serial_consistency
        )));
    }

    let timeout = match overrides.timeout {
        Some(timeout) => Some(timeout),
        None => profile.get_duration(DriverOption::GraphTimeout, None)?,
    }
    .filter(|t| !t.is_zero());

    let system_query = match overrides.system_query {
        Some(flag) => flag,
        None => profile.get_boolean(DriverOption::GraphIsSystemQuery, false)?,
    };

    let (graph_name, traversal_source) = if system_query {
        (None, None)
    } else {
        (
            overrides
                .graph_name
                .clone()
                .or_else(|| profile.get_string(DriverOption::GraphName, None)),
            overrides
                .traversal_source
                .clone()
                .or_else(|| profile.get_string(DriverOption::GraphTraversalSource, Some("g"))),
        )
    };

    let read_consistency = overrides
        .read_consistency
        .map(|level| level.name().to_string())
        .or_else(|| profile.get_string(DriverOption::GraphReadConsistencyLevel, None));
    let write_consistency = overrides
        .write_consistency
        .map(|level| level.name().to_string())
        .or_else(|| profile.get_string(DriverOption::GraphWriteConsistencyLevel, None));

    let timestamp = overrides.timestamp.unwrap_or_else(|| timestamps.next());

    Ok(ResolvedOptions {
        profile,
        consistency,
        serial_consistency,
        timeout,
        graph_name,
        traversal_source,
        read_consistency,
        write_consistency,
        system_query,
        timestamp,
        idempotent: statement.is_idempotent(),
    })
}

fn profile_consistency(
    profile: &ExecutionProfile,
    option: DriverOption,
) -> GraphResult<Option<ConsistencyLevel>> {
    match profile.get_raw(option) {
        None => Ok(None),
        Some(raw) => raw.parse::<ConsistencyLevel>().map(Some).map_err(|_| {
            GraphError::configuration(format!(
                "Invalid value '{}' for {}: unknown consistency level",
                raw, option
            ))
        }),
    }
}
