//! # SENTINEL Surge - Core Library
//!
//! Traffic-surge detection daemon for web access logs.
//!
//! SENTINEL Surge reduces an access log to a stream of (address, time-bucket)
//! records, aggregates each time unit into a bucket of per-address request
//! counts, and keeps a fixed-length window of recent buckets as its statistical
//! baseline. A retiring bucket whose total request count AND per-address
//! request counts both land more than two standard deviations above baseline
//! flips the detector into attack mode; offending addresses are appended to an
//! alert log until the surge subsides.
//!
//! ## Design Philosophy
//! - **Watch and flag.** No blocking, no retaliation - the alert log is the output.
//! - One log source, one thread, one pass over the feed.
//! - Baselines are frozen at attack onset so a surge cannot poison the
//!   statistics used to decide when it ends.

pub mod alert;
pub mod detection;
pub mod log_sources;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Unified error type for SENTINEL Surge.
#[derive(Error, Debug)]
pub enum SurgeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Log parse error: {0}")]
    LogParse(String),

    #[error("Alert sink error: {0}")]
    Sink(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type SurgeResult<T> = Result<T, SurgeError>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Top-level configuration for SENTINEL Surge.
///
/// Loaded from `sentinel-surge.toml` in the working directory or a path
/// supplied via CLI flag.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurgeConfig {
    /// Detector tuning knobs.
    pub detector: DetectorConfig,

    /// Where the access log lives and how often to poll it.
    pub log_source: LogSourceConfig,

    /// Alert sink settings.
    pub alerts: AlertConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// How many retired time units the history window holds.
    pub window_len: usize,

    /// Width of one time unit in seconds. Record timestamps are floored to
    /// this granularity to form bucket labels.
    pub bucket_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogSourceConfig {
    /// Path to the web server access log (Apache/Nginx combined format).
    pub access_log_path: PathBuf,

    /// How often (in seconds) follow mode polls the log for new lines.
    pub poll_interval_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertConfig {
    /// Path to the alert log file. One flagged address per line, appended.
    pub alert_log_path: PathBuf,
}

impl Default for SurgeConfig {
    fn default() -> Self {
        Self {
            detector: DetectorConfig {
                window_len: 60,
                bucket_secs: 60,
            },
            log_source: LogSourceConfig {
                access_log_path: PathBuf::from("/var/log/nginx/access.log"),
                poll_interval_secs: 5,
            },
            alerts: AlertConfig {
                alert_log_path: PathBuf::from("./surge-data/alerts.log"),
            },
        }
    }
}

impl SurgeConfig {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &std::path::Path) -> SurgeResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SurgeConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default configuration to a TOML file.
    pub fn write_default(path: &std::path::Path) -> SurgeResult<()> {
        let config = Self::default();
        let content = toml::to_string_pretty(&config)
            .map_err(|e| SurgeError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Reject configurations the engine cannot run with.
    ///
    /// A zero-length window never accumulates a baseline (roll-ins are
    /// dropped), and a non-positive bucket width makes label flooring
    /// meaningless. Both are configuration mistakes, not runtime conditions.
    pub fn validate(&self) -> SurgeResult<()> {
        if self.detector.window_len == 0 {
            return Err(SurgeError::Config(
                "detector.window_len must be positive".to_string(),
            ));
        }
        if self.detector.bucket_secs <= 0 {
            return Err(SurgeError::Config(
                "detector.bucket_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates() {
        assert!(SurgeConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_window_rejected() {
        let mut config = SurgeConfig::default();
        config.detector.window_len = 0;
        assert!(matches!(config.validate(), Err(SurgeError::Config(_))));
    }

    #[test]
    fn test_zero_bucket_width_rejected() {
        let mut config = SurgeConfig::default();
        config.detector.bucket_secs = 0;
        assert!(matches!(config.validate(), Err(SurgeError::Config(_))));
    }

    #[test]
    fn test_config_round_trips_through_toml() {
        let config = SurgeConfig::default();
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: SurgeConfig = toml::from_str(&text).unwrap();
        assert_eq!(parsed.detector.window_len, config.detector.window_len);
        assert_eq!(parsed.detector.bucket_secs, config.detector.bucket_secs);
        assert_eq!(parsed.alerts.alert_log_path, config.alerts.alert_log_path);
    }

    #[test]
    fn test_write_default_and_reload() {
        let dir = std::env::temp_dir().join("sentinel_surge_config_test");
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();

        let path = dir.join("sentinel-surge.toml");
        SurgeConfig::write_default(&path).unwrap();
        let loaded = SurgeConfig::from_file(&path).unwrap();
        assert_eq!(loaded.detector.window_len, 60);
        assert_eq!(loaded.log_source.poll_interval_secs, 5);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
