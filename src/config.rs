use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

use crate::constants::*;
use crate::error::{NavigatorError, Result};

/// Environment variable pointing at an alternative configuration file
pub const CONFIG_PATH_ENV: &str = "CORBAN_CONFIG";
/// Configuration file looked up in the working directory
pub const DEFAULT_CONFIG_PATH: &str = "corban.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NavigatorConfig {
    #[serde(default)]
    pub ingestion: IngestionConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub quality: QualityConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestionConfig {
    /// Bytes read per transfer step
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Seconds without any data before a transfer is abandoned
    #[serde(default = "default_stall_timeout_secs")]
    pub stall_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExplorerConfig {
    #[serde(default = "default_page_size")]
    pub default_page_size: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QualityConfig {
    /// Score at or above which a check is a success
    #[serde(default = "default_success_threshold")]
    pub success_threshold: f64,
    /// Score at or above which a check is a warning (below is an error)
    #[serde(default = "default_warning_threshold")]
    pub warning_threshold: f64,
    #[serde(default = "default_min_commission_rate")]
    pub min_commission_rate: f64,
    #[serde(default = "default_max_commission_rate")]
    pub max_commission_rate: f64,
    #[serde(default = "default_max_issue_details")]
    pub max_issue_details: usize,
    /// Reference date for future-date checks; today when unset
    #[serde(default)]
    pub as_of: Option<NaiveDate>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub directory: String,
    #[serde(default = "default_log_file")]
    pub file_name: String,
}

fn default_chunk_size() -> usize {
    DEFAULT_CHUNK_SIZE
}
fn default_stall_timeout_secs() -> u64 {
    DEFAULT_STALL_TIMEOUT_SECS
}
fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}
fn default_success_threshold() -> f64 {
    DEFAULT_SUCCESS_THRESHOLD
}
fn default_warning_threshold() -> f64 {
    DEFAULT_WARNING_THRESHOLD
}
fn default_min_commission_rate() -> f64 {
    DEFAULT_MIN_COMMISSION_RATE
}
fn default_max_commission_rate() -> f64 {
    DEFAULT_MAX_COMMISSION_RATE
}
fn default_max_issue_details() -> usize {
    DEFAULT_MAX_ISSUE_DETAILS
}
fn default_log_dir() -> String {
    "logs".to_string()
}
fn default_log_file() -> String {
    "navigator.log".to_string()
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            stall_timeout_secs: default_stall_timeout_secs(),
        }
    }
}

impl IngestionConfig {
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_secs(self.stall_timeout_secs)
    }
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            default_page_size: default_page_size(),
        }
    }
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            success_threshold: default_success_threshold(),
            warning_threshold: default_warning_threshold(),
            min_commission_rate: default_min_commission_rate(),
            max_commission_rate: default_max_commission_rate(),
            max_issue_details: default_max_issue_details(),
            as_of: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file_name: default_log_file(),
        }
    }
}

impl NavigatorConfig {
    /// Load configuration from `CORBAN_CONFIG` or `corban.toml`; defaults when absent
    pub fn load() -> Result<Self> {
        let _ = dotenv::dotenv();
        let config_path =
            std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

        if !Path::new(&config_path).exists() {
            debug!("No config file at '{}', using defaults", config_path);
            let config = Self::default();
            config.validate()?;
            return Ok(config);
        }

        Self::from_file(&config_path)
    }

    pub fn from_file(config_path: &str) -> Result<Self> {
        let config_content = fs::read_to_string(config_path).map_err(|e| {
            NavigatorError::Config(format!("Failed to read config file '{}': {}", config_path, e))
        })?;
        let config = Self::from_toml_str(&config_content)?;
        info!("Loaded configuration from {}", config_path);
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: NavigatorConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make analysis or ingestion meaningless
    pub fn validate(&self) -> Result<()> {
        let q = &self.quality;
        if !(0.0..=100.0).contains(&q.success_threshold) || !(0.0..=100.0).contains(&q.warning_threshold) {
            return Err(NavigatorError::Config(
                "quality thresholds must lie within 0..=100".to_string(),
            ));
        }
        if q.warning_threshold > q.success_threshold {
            return Err(NavigatorError::Config(format!(
                "warning_threshold ({}) exceeds success_threshold ({})",
                q.warning_threshold, q.success_threshold
            )));
        }
        if q.min_commission_rate > q.max_commission_rate {
            return Err(NavigatorError::Config(
                "min_commission_rate exceeds max_commission_rate".to_string(),
            ));
        }
        if self.ingestion.chunk_size == 0 {
            return Err(NavigatorError::Config("chunk_size must be positive".to_string()));
        }
        if self.ingestion.stall_timeout_secs == 0 {
            return Err(NavigatorError::Config(
                "stall_timeout_secs must be positive".to_string(),
            ));
        }
        if self.explorer.default_page_size == 0 {
            return Err(NavigatorError::Config(
                "default_page_size must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_toml_yields_defaults() {
        let config = NavigatorConfig::from_toml_str("").unwrap();
        assert_eq!(config.explorer.default_page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(config.quality.success_threshold, DEFAULT_SUCCESS_THRESHOLD);
        assert_eq!(config.ingestion.stall_timeout(), Duration::from_secs(DEFAULT_STALL_TIMEOUT_SECS));
        assert!(config.quality.as_of.is_none());
    }

    #[test]
    fn test_partial_sections_override() {
        let config = NavigatorConfig::from_toml_str(
            r#"
            [quality]
            success_threshold = 98.0
            as_of = "2024-08-21"

            [explorer]
            default_page_size = 25
            "#,
        )
        .unwrap();
        assert_eq!(config.quality.success_threshold, 98.0);
        assert_eq!(config.quality.warning_threshold, DEFAULT_WARNING_THRESHOLD);
        assert_eq!(config.quality.as_of, NaiveDate::from_ymd_opt(2024, 8, 21));
        assert_eq!(config.explorer.default_page_size, 25);
    }

    #[test]
    fn test_inverted_thresholds_are_rejected() {
        let result = NavigatorConfig::from_toml_str(
            r#"
            [quality]
            success_threshold = 80.0
            warning_threshold = 90.0
            "#,
        );
        assert!(matches!(result, Err(NavigatorError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("corban.toml");
        fs::write(&path, "[ingestion]\nchunk_size = 1024\n").unwrap();
        let config = NavigatorConfig::from_file(path.to_str().unwrap()).unwrap();
        assert_eq!(config.ingestion.chunk_size, 1024);
    }
}
