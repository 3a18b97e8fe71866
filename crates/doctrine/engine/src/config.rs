//! Configuration for the doctrine engine and `doctrined`.

use doctrine_types::GovernanceThresholds;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Main engine configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DoctrineConfig {
    /// Overlay gates and scanner cadence
    #[serde(default)]
    pub thresholds: GovernanceThresholds,

    /// Background scanner configuration
    #[serde(default)]
    pub scheduler: SchedulerConfig,

    /// Rule bundle locations
    #[serde(default)]
    pub registry: RegistryConfig,

    /// History provider configuration
    #[serde(default)]
    pub history: HistoryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Run the background scanner at all
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Per-user budget for fetching history and scanning it
    #[serde(default = "default_user_timeout")]
    pub user_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            user_timeout_secs: default_user_timeout(),
        }
    }
}

/// Registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Directory holding the rule bundle files
    #[serde(default = "default_bundle_dir")]
    pub bundle_dir: PathBuf,

    /// Canonical rule source file (JSON or YAML)
    #[serde(default = "default_rule_source")]
    pub rule_source: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            bundle_dir: default_bundle_dir(),
            rule_source: default_rule_source(),
        }
    }
}

/// History provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// One `<user_id>.json` file per user
    #[serde(default = "default_history_dir")]
    pub dir: PathBuf,

    /// Most recent events kept per scan
    #[serde(default = "default_max_events")]
    pub max_events: usize,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            dir: default_history_dir(),
            max_events: default_max_events(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,

    /// JSON format
    #[serde(default)]
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

// Default value helpers
fn default_true() -> bool {
    true
}

fn default_user_timeout() -> u64 {
    30
}

fn default_bundle_dir() -> PathBuf {
    PathBuf::from("doctrine/bundles")
}

fn default_rule_source() -> PathBuf {
    PathBuf::from("doctrine/canonical.yaml")
}

fn default_history_dir() -> PathBuf {
    PathBuf::from("doctrine/history")
}

fn default_max_events() -> usize {
    500
}

fn default_log_level() -> String {
    "info".to_string()
}

impl DoctrineConfig {
    /// Load configuration: defaults, then the optional file, then
    /// `DOCTRINE_*` environment variables (`DOCTRINE_THRESHOLDS__MAX_PER_WEEK`).
    pub fn load(path: Option<&str>) -> Result<Self, config::ConfigError> {
        let mut builder = config::Config::builder();

        builder = builder.add_source(config::Config::try_from(&DoctrineConfig::default())?);

        if let Some(path) = path {
            builder = builder.add_source(config::File::with_name(path).required(false));
        }

        builder = builder.add_source(
            config::Environment::with_prefix("DOCTRINE")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        builder.build()?.try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = DoctrineConfig::default();
        assert_eq!(config.thresholds, GovernanceThresholds::default());
        assert!(config.scheduler.enabled);
        assert_eq!(config.history.max_events, 500);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_load_without_file_uses_defaults() {
        let config = DoctrineConfig::load(None).unwrap();
        assert_eq!(config.thresholds.max_per_week, 5);
        assert_eq!(config.registry.bundle_dir, PathBuf::from("doctrine/bundles"));
    }

    #[test]
    fn test_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[thresholds]\nmax_per_week = 2\n\n[scheduler]\nenabled = false\n"
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let config = DoctrineConfig::load(Some(&path)).unwrap();
        assert_eq!(config.thresholds.max_per_week, 2);
        assert_eq!(config.thresholds.min_confidence, 0.70);
        assert!(!config.scheduler.enabled);
    }
}
