//! Aggregator configuration
//!
//! Loads and validates aggregator settings from TOML files.
//! Default location: /etc/flowmd/aggregator.toml

use crate::error::{AggregatorError, Result};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Default configuration file location
pub const DEFAULT_CONFIG_PATH: &str = "/etc/flowmd/aggregator.toml";

/// Static metadata describing the reporting node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeInfo {
    #[serde(default)]
    pub node_id: String,

    #[serde(default)]
    pub location_id: String,
}

impl NodeInfo {
    pub fn new(node_id: impl Into<String>, location_id: impl Into<String>) -> Self {
        Self {
            node_id: node_id.into(),
            location_id: location_id.into(),
        }
    }
}

/// Whether reported counters are running totals or per-window deltas
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportType {
    #[default]
    Absolute,
    Relative,
}

/// Complete aggregator configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatorConfig {
    /// Node metadata attached to every report
    #[serde(default)]
    pub node_info: NodeInfo,

    /// Number of windows a report holds before it must be sent
    #[serde(default = "default_max_windows")]
    pub max_windows: usize,

    /// Idle seconds before an inactive accumulator is evicted; unset means never
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub acc_ttl_secs: Option<u64>,

    /// Counter semantics of reported flows
    #[serde(default)]
    pub report_type: ReportType,

    /// Also report every L2-only flow individually, next to its pair aggregate
    #[serde(default)]
    pub report_all_samples: bool,
}

fn default_max_windows() -> usize {
    1
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            node_info: NodeInfo::default(),
            max_windows: default_max_windows(),
            acc_ttl_secs: None,
            report_type: ReportType::default(),
            report_all_samples: false,
        }
    }
}

impl AggregatorConfig {
    /// Creates a configuration for the given node with default settings
    pub fn new(node_info: NodeInfo) -> Self {
        Self {
            node_info,
            ..Self::default()
        }
    }

    pub fn with_max_windows(mut self, max_windows: usize) -> Self {
        self.max_windows = max_windows;
        self
    }

    /// Sets the accumulator TTL. Sub-second parts round up to the next
    /// whole second, so the TTL is never shorter than requested.
    pub fn with_acc_ttl(mut self, ttl: Option<Duration>) -> Self {
        self.acc_ttl_secs =
            ttl.map(|d| d.as_secs().saturating_add(u64::from(d.subsec_nanos() > 0)));
        self
    }

    pub fn with_report_type(mut self, report_type: ReportType) -> Self {
        self.report_type = report_type;
        self
    }

    pub fn with_report_all_samples(mut self, enable: bool) -> Self {
        self.report_all_samples = enable;
        self
    }

    /// Load configuration from file, falling back to defaults if file not found
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        match fs::read_to_string(path) {
            Ok(content) => {
                let config: Self = toml::from_str(&content).map_err(|e| {
                    AggregatorError::Config(format!(
                        "Failed to parse config file {}: {}",
                        path.display(),
                        e
                    ))
                })?;
                config.validate()?;
                Ok(config)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "config file not found, using defaults");
                Ok(Self::default())
            }
            Err(e) => Err(AggregatorError::Io(e)),
        }
    }

    /// Load from default location or defaults
    pub fn load() -> Result<Self> {
        Self::load_or_default(DEFAULT_CONFIG_PATH)
    }

    /// Accumulator time-to-live, `None` meaning accumulators never expire
    pub fn acc_ttl(&self) -> Option<Duration> {
        self.acc_ttl_secs.map(Duration::from_secs)
    }

    /// The TTL as a chrono delta. `None` both when no TTL is set and when
    /// it is out of range; `validate` rejects the latter.
    pub fn acc_ttl_delta(&self) -> Option<TimeDelta> {
        self.acc_ttl_secs.and_then(ttl_delta)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.max_windows == 0 {
            return Err(AggregatorError::Config(
                "max_windows must be > 0".to_string(),
            ));
        }

        if let Some(secs) = self.acc_ttl_secs {
            if ttl_delta(secs).is_none() {
                return Err(AggregatorError::Config(format!(
                    "acc_ttl_secs {} is out of range",
                    secs
                )));
            }
        }

        Ok(())
    }
}

fn ttl_delta(secs: u64) -> Option<TimeDelta> {
    i64::try_from(secs).ok().and_then(TimeDelta::try_seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = AggregatorConfig::default();
        assert_eq!(config.max_windows, 1);
        assert_eq!(config.acc_ttl(), None);
        assert_eq!(config.report_type, ReportType::Absolute);
        assert!(!config.report_all_samples);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_builder_setters() {
        let config = AggregatorConfig::new(NodeInfo::new("node-1", "loc-1"))
            .with_max_windows(4)
            .with_acc_ttl(Some(Duration::from_secs(120)))
            .with_report_type(ReportType::Relative)
            .with_report_all_samples(true);
        assert_eq!(config.node_info.node_id, "node-1");
        assert_eq!(config.max_windows, 4);
        assert_eq!(config.acc_ttl(), Some(Duration::from_secs(120)));
        assert_eq!(config.report_type, ReportType::Relative);
        assert!(config.report_all_samples);
    }

    #[test]
    fn test_acc_ttl_rounds_up_to_whole_seconds() {
        let ttl = |d: Duration| AggregatorConfig::default().with_acc_ttl(Some(d)).acc_ttl_secs;
        assert_eq!(ttl(Duration::from_millis(1500)), Some(2));
        assert_eq!(ttl(Duration::from_nanos(1)), Some(1));
        assert_eq!(ttl(Duration::from_secs(3)), Some(3));
        assert_eq!(ttl(Duration::ZERO), Some(0));
        assert_eq!(AggregatorConfig::default().with_acc_ttl(None).acc_ttl_secs, None);
    }

    #[test]
    fn test_acc_ttl_delta() {
        let config = AggregatorConfig::default().with_acc_ttl(Some(Duration::from_secs(90)));
        assert_eq!(config.acc_ttl_delta(), Some(TimeDelta::seconds(90)));
        assert_eq!(AggregatorConfig::default().acc_ttl_delta(), None);
    }

    #[test]
    fn test_validate_zero_windows() {
        let config = AggregatorConfig::default().with_max_windows(0);
        assert!(matches!(
            config.validate(),
            Err(AggregatorError::Config(_))
        ));
    }

    #[test]
    fn test_validate_huge_ttl() {
        let mut config = AggregatorConfig::default();
        config.acc_ttl_secs = Some(u64::MAX);
        assert!(config.validate().is_err());
        assert_eq!(config.acc_ttl_delta(), None);
    }

    #[test]
    fn test_toml_deserialization() {
        let toml_str = r#"
max_windows = 3
acc_ttl_secs = 60
report_type = "relative"

[node_info]
node_id = "ap-1"
location_id = "home"
"#;
        let config: AggregatorConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.max_windows, 3);
        assert_eq!(config.acc_ttl(), Some(Duration::from_secs(60)));
        assert_eq!(config.report_type, ReportType::Relative);
        assert_eq!(config.node_info, NodeInfo::new("ap-1", "home"));
        // Unspecified values should use defaults
        assert!(!config.report_all_samples);
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_windows = 2\nreport_all_samples = true").unwrap();

        let config = AggregatorConfig::load_or_default(file.path()).unwrap();
        assert_eq!(config.max_windows, 2);
        assert!(config.report_all_samples);
    }

    #[test]
    fn test_load_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_windows = 0").unwrap();
        assert!(AggregatorConfig::load_or_default(file.path()).is_err());

        let mut garbage = tempfile::NamedTempFile::new().unwrap();
        writeln!(garbage, "max_windows = [").unwrap();
        assert!(matches!(
            AggregatorConfig::load_or_default(garbage.path()),
            Err(AggregatorError::Config(_))
        ));
    }

    #[test]
    fn test_load_nonexistent_file_defaults() {
        let config = AggregatorConfig::load_or_default("/nonexistent/flowmd.toml").unwrap();
        assert_eq!(config, AggregatorConfig::default());
    }
}
