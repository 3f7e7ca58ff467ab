//! Driver configuration and execution profiles.
//!
//! Options are addressed by [`DriverOption`] and stored as raw strings in
//! named [`ExecutionProfile`]s. Every named profile falls back to the
//! default profile, which is seeded with the built-in defaults.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use super::error::{GraphError, GraphResult};

/// Name of the default execution profile.
pub const DEFAULT_PROFILE_NAME: &str = "default";

// ============================================================================
// DriverOption
// ============================================================================

/// Option paths read by the graph layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DriverOption {
    /// `basic.graph.name`
    GraphName,
    /// `basic.graph.traversal-source`
    GraphTraversalSource,
    /// `basic.graph.timeout`
    GraphTimeout,
    /// `basic.graph.read-consistency-level`
    GraphReadConsistencyLevel,
    /// `basic.graph.write-consistency-level`
    GraphWriteConsistencyLevel,
    /// `advanced.graph.sub-protocol`
    GraphSubProtocol,
    /// `advanced.graph.is-system-query`
    GraphIsSystemQuery,
    /// `advanced.graph.paging-enabled`
    GraphPagingEnabled,
    /// `advanced.graph.paging-options.page-size`
    GraphPageSize,
    /// `advanced.graph.paging-options.max-pages`
    GraphMaxPages,
    /// `advanced.graph.paging-options.max-pages-per-second`
    GraphMaxPagesPerSecond,
    /// `advanced.graph.paging-options.max-enqueued-pages`
    GraphMaxEnqueuedPages,
    /// `basic.request.consistency`
    RequestConsistency,
    /// `basic.request.serial-consistency`
    RequestSerialConsistency,
}

impl DriverOption {
    /// All options.
    pub const ALL: [DriverOption; 14] = [
        DriverOption::GraphName,
        DriverOption::GraphTraversalSource,
        DriverOption::GraphTimeout,
        DriverOption::GraphReadConsistencyLevel,
        DriverOption::GraphWriteConsistencyLevel,
        DriverOption::GraphSubProtocol,
        DriverOption::GraphIsSystemQuery,
        DriverOption::GraphPagingEnabled,
        DriverOption::GraphPageSize,
        DriverOption::GraphMaxPages,
        DriverOption::GraphMaxPagesPerSecond,
        DriverOption::GraphMaxEnqueuedPages,
        DriverOption::RequestConsistency,
        DriverOption::RequestSerialConsistency,
    ];

    /// Configuration path.
    pub fn path(self) -> &'static str {
        match self {
            DriverOption::GraphName => "basic.graph.name",
            DriverOption::GraphTraversalSource => "basic.graph.traversal-source",
            DriverOption::GraphTimeout => "basic.graph.timeout",
            DriverOption::GraphReadConsistencyLevel => "basic.graph.read-consistency-level",
            DriverOption::GraphWriteConsistencyLevel => "basic.graph.write-consistency-level",
            DriverOption::GraphSubProtocol => "advanced.graph.sub-protocol",
            DriverOption::GraphIsSystemQuery => "advanced.graph.is-system-query",
            DriverOption::GraphPagingEnabled => "advanced.graph.paging-enabled",
            DriverOption::GraphPageSize => "advanced.graph.paging-options.page-size",
            DriverOption::GraphMaxPages => "advanced.graph.paging-options.max-pages",
            DriverOption::GraphMaxPagesPerSecond => {
                "advanced.graph.paging-options.max-pages-per-second"
            }
            DriverOption::GraphMaxEnqueuedPages => {
                "advanced.graph.paging-options.max-enqueued-pages"
            }
            DriverOption::RequestConsistency => "basic.request.consistency",
            DriverOption::RequestSerialConsistency => "basic.request.serial-consistency",
        }
    }

    /// Look an option up by path.
    pub fn from_path(path: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|o| o.path() == path)
    }

    fn default_value(self) -> Option<&'static str> {
        match self {
            DriverOption::GraphTraversalSource => Some("g"),
            DriverOption::GraphPagingEnabled => Some("AUTO"),
            DriverOption::GraphPageSize => Some("5000"),
            DriverOption::GraphMaxPages => Some("0"),
            DriverOption::GraphMaxPagesPerSecond => Some("0"),
            DriverOption::GraphMaxEnqueuedPages => Some("4"),
            DriverOption::RequestConsistency => Some("LOCAL_ONE"),
            DriverOption::RequestSerialConsistency => Some("SERIAL"),
            _ => None,
        }
    }
}

impl fmt::Display for DriverOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

// ============================================================================
// ExecutionProfile
// ============================================================================

/// A named bag of option values.
#[derive(Debug, Clone)]
pub struct ExecutionProfile {
    name: String,
    values: HashMap<DriverOption, String>,
    fallback: Option<Arc<ExecutionProfile>>,
}

impl ExecutionProfile {
    fn seeded_default() -> Self {
        let values = DriverOption::ALL
            .iter()
            .filter_map(|o| o.default_value().map(|v| (*o, v.to_string())))
            .collect();
        Self {
            name: DEFAULT_PROFILE_NAME.to_string(),
            values,
            fallback: None,
        }
    }

    /// Profile name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Raw value, looked up in this profile then in the default profile.
    pub fn get_raw(&self, option: DriverOption) -> Option<&str> {
        match self.values.get(&option) {
            Some(value) => Some(value),
            None => self.fallback.as_ref().and_then(|p| p.get_raw(option)),
        }
    }

    /// Whether the option has a value.
    pub fn is_defined(&self, option: DriverOption) -> bool {
        self.get_raw(option).is_some()
    }

    /// String value.
    pub fn get_string(&self, option: DriverOption, default: Option<&str>) -> Option<String> {
        self.get_raw(option).or(default).map(str::to_string)
    }

    /// Boolean value.
    pub fn get_boolean(&self, option: DriverOption, default: bool) -> GraphResult<bool> {
        match self.get_raw(option) {
            None => Ok(default),
            Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(invalid(option, raw, "a boolean")),
            },
        }
    }

    /// Integer value.
    pub fn get_int(&self, option: DriverOption, default: i32) -> GraphResult<i32> {
        match self.get_raw(option) {
            None => Ok(default),
            Some(raw) => raw
                .trim()
                .parse()
                .map_err(|_| invalid(option, raw, "an integer")),
        }
    }

    /// Duration value.
    pub fn get_duration(
        &self,
        option: DriverOption,
        default: Option<Duration>,
    ) -> GraphResult<Option<Duration>> {
        match self.get_raw(option) {
            None => Ok(default),
            Some(raw) => parse_duration(raw)
                .map(Some)
                .ok_or_else(|| invalid(option, raw, "a duration")),
        }
    }
}

fn invalid(option: DriverOption, raw: &str, expected: &str) -> GraphError {
    GraphError::configuration(format!(
        "Invalid value '{}' for {}: expected {}",
        raw, option, expected
    ))
}

/// Parse `500ms`, `2 seconds`, `1m` or bare milliseconds.
pub fn parse_duration(raw: &str) -> Option<Duration> {
    let raw = raw.trim();
    let split = raw
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(raw.len());
    let (amount, unit) = raw.split_at(split);
    let amount: u64 = amount.parse().ok()?;

    let millis = match unit.trim() {
        "" | "ms" | "millis" | "millisecond" | "milliseconds" => amount,
        "s" | "second" | "seconds" => amount.checked_mul(1_000)?,
        "m" | "minute" | "minutes" => amount.checked_mul(60_000)?,
        "h" | "hour" | "hours" => amount.checked_mul(3_600_000)?,
        _ => return None,
    };
    Some(Duration::from_millis(millis))
}

// ============================================================================
// DriverConfig
// ============================================================================

/// Driver configuration: execution profiles plus request settings.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    default_profile: Arc<ExecutionProfile>,
    profiles: HashMap<String, Arc<ExecutionProfile>>,
    /// Session name used as log prefix
    pub session_name: String,
    /// Retries allowed per request
    pub max_retries: u32,
}

impl DriverConfig {
    /// Start a builder.
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::new()
    }

    /// Load from a JSON document.
    ///
    /// ```json
    /// {
    ///   "session_name": "s0",
    ///   "max_retries": 3,
    ///   "profiles": {
    ///     "default": { "basic.graph.name": "modern" },
    ///     "olap": { "basic.graph.traversal-source": "a" }
    ///   }
    /// }
    /// ```
    pub fn from_json(json: &str) -> GraphResult<Self> {
        let document: ConfigDocument = serde_json::from_str(json)
            .map_err(|e| GraphError::configuration(format!("Invalid configuration: {}", e)))?;

        let mut builder = DriverConfigBuilder::new();
        if let Some(name) = document.session_name {
            builder = builder.with_session_name(name);
        }
        if let Some(retries) = document.max_retries {
            builder = builder.with_max_retries(retries);
        }
        for (profile, values) in document.profiles {
            for (path, value) in values {
                let option = DriverOption::from_path(&path).ok_or_else(|| {
                    GraphError::configuration(format!("Unknown option {} in profile {}", path, profile))
                })?;
                let value = match value {
                    serde_json::Value::String(s) => s,
                    other => other.to_string(),
                };
                builder = builder.with_profile_option(&profile, option, value);
            }
        }
        Ok(builder.build())
    }

    /// The default profile.
    pub fn default_profile(&self) -> &Arc<ExecutionProfile> {
        &self.default_profile
    }

    /// Look up a profile; `None` selects the default profile.
    pub fn profile(&self, name: Option<&str>) -> GraphResult<Arc<ExecutionProfile>> {
        match name {
            None | Some(DEFAULT_PROFILE_NAME) => Ok(self.default_profile.clone()),
            Some(name) => self.profiles.get(name).cloned().ok_or_else(|| {
                GraphError::configuration(format!("Unknown execution profile '{}'", name))
            }),
        }
    }

    /// Named profile names.
    pub fn profile_names(&self) -> Vec<&str> {
        self.profiles.keys().map(String::as_str).collect()
    }
}

impl Default for DriverConfig {
    fn default() -> Self {
        DriverConfigBuilder::new().build()
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigDocument {
    #[serde(default)]
    session_name: Option<String>,
    #[serde(default)]
    max_retries: Option<u32>,
    #[serde(default)]
    profiles: HashMap<String, HashMap<String, serde_json::Value>>,
}

// ============================================================================
// DriverConfigBuilder
// ============================================================================

/// Builder for [`DriverConfig`].
#[derive(Debug, Clone)]
pub struct DriverConfigBuilder {
    default_values: HashMap<DriverOption, String>,
    profiles: HashMap<String, HashMap<DriverOption, String>>,
    session_name: String,
    max_retries: u32,
}

impl DriverConfigBuilder {
    /// New builder with built-in defaults.
    pub fn new() -> Self {
        Self {
            default_values: HashMap::new(),
            profiles: HashMap::new(),
            session_name: "s0".to_string(),
            max_retries: 3,
        }
    }

    /// Set an option in the default profile.
    pub fn with_option(mut self, option: DriverOption, value: impl Into<String>) -> Self {
        self.default_values.insert(option, value.into());
        self
    }

    /// Set an option in a named profile.
    pub fn with_profile_option(
        mut self,
        profile: &str,
        option: DriverOption,
        value: impl Into<String>,
    ) -> Self {
        if profile == DEFAULT_PROFILE_NAME {
            return self.with_option(option, value);
        }
        self.profiles
            .entry(profile.to_string())
            .or_default()
            .insert(option, value.into());
        self
    }

    /// Session name.
    pub fn with_session_name(mut self, name: impl Into<String>) -> Self {
        self.session_name = name.into();
        self
    }

    /// Retries per request.
    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Build.
    pub fn build(self) -> DriverConfig {
        let mut default_profile = ExecutionProfile::seeded_default();
        default_profile.values.extend(self.default_values);
        let default_profile = Arc::new(default_profile);

        let profiles = self
            .profiles
            .into_iter()
            .map(|(name, values)| {
                let profile = ExecutionProfile {
                    name: name.clone(),
                    values,
                    fallback: Some(default_profile.clone()),
                };
                (name, Arc::new(profile))
            })
            .collect();

        DriverConfig {
            default_profile,
            profiles,
            session_name: self.session_name,
            max_retries: self.max_retries,
        }
    }
}

impl Default for DriverConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_profile_seeds() {
        let config = DriverConfig::default();
        let profile = config.profile(None).unwrap();
        assert_eq!(profile.name(), DEFAULT_PROFILE_NAME);
        assert_eq!(
            profile.get_string(DriverOption::GraphTraversalSource, None),
            Some("g".to_string())
        );
        assert_eq!(
            profile.get_string(DriverOption::RequestConsistency, None),
            Some("LOCAL_ONE".to_string())
        );
        assert_eq!(profile.get_int(DriverOption::GraphPageSize, 0).unwrap(), 5000);
        assert!(!profile.is_defined(DriverOption::GraphName));
        assert_eq!(profile.get_duration(DriverOption::GraphTimeout, None).unwrap(), None);
    }

    #[test]
    fn test_named_profile_falls_back() {
        let config = DriverConfig::builder()
            .with_option(DriverOption::GraphName, "modern")
            .with_profile_option("olap", DriverOption::GraphTraversalSource, "a")
            .build();

        let olap = config.profile(Some("olap")).unwrap();
        assert_eq!(olap.name(), "olap");
        assert_eq!(olap.get_raw(DriverOption::GraphTraversalSource), Some("a"));
        assert_eq!(olap.get_raw(DriverOption::GraphName), Some("modern"));
        assert_eq!(olap.get_raw(DriverOption::RequestConsistency), Some("LOCAL_ONE"));
    }

    #[test]
    fn test_unknown_profile() {
        let err = DriverConfig::default().profile(Some("missing")).unwrap_err();
        assert!(matches!(err, GraphError::Configuration(_)));
    }

    #[test]
    fn test_typed_accessors() {
        let config = DriverConfig::builder()
            .with_option(DriverOption::GraphIsSystemQuery, "TRUE")
            .with_option(DriverOption::GraphTimeout, "2 seconds")
            .with_option(DriverOption::GraphPageSize, "lots")
            .build();
        let profile = config.default_profile();

        assert!(profile.get_boolean(DriverOption::GraphIsSystemQuery, false).unwrap());
        assert_eq!(
            profile.get_duration(DriverOption::GraphTimeout, None).unwrap(),
            Some(Duration::from_secs(2))
        );
        assert!(matches!(
            profile.get_int(DriverOption::GraphPageSize, 0),
            Err(GraphError::Configuration(_))
        ));
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("500ms"), Some(Duration::from_millis(500)));
        assert_eq!(parse_duration("2 seconds"), Some(Duration::from_secs(2)));
        assert_eq!(parse_duration("1m"), Some(Duration::from_secs(60)));
        assert_eq!(parse_duration("250"), Some(Duration::from_millis(250)));
        assert_eq!(parse_duration("2 fortnights"), None);
        assert_eq!(parse_duration("ms"), None);
    }

    #[test]
    fn test_from_json() {
        let config = DriverConfig::from_json(
            r#"{
                "session_name": "test-graph",
                "max_retries": 1,
                "profiles": {
                    "default": { "basic.graph.name": "modern" },
                    "olap": {
                        "basic.graph.traversal-source": "a",
                        "advanced.graph.paging-options.page-size": 100
                    }
                }
            }"#,
        )
        .unwrap();

        assert_eq!(config.session_name, "test-graph");
        assert_eq!(config.max_retries, 1);
        let olap = config.profile(Some("olap")).unwrap();
        assert_eq!(olap.get_int(DriverOption::GraphPageSize, 0).unwrap(), 100);
        assert_eq!(olap.get_raw(DriverOption::GraphName), Some("modern"));
    }

    #[test]
    fn test_from_json_rejects_unknown_option() {
        let err = DriverConfig::from_json(r#"{"profiles": {"default": {"basic.nope": 1}}}"#)
            .unwrap_err();
        assert!(err.to_string().contains("basic.nope"));
    }
}
