//! Configuration management for metron.
//!
//! This module provides configuration handling with:
//! - YAML file support
//! - Builder overrides for programmatic setup
//! - Validation and defaults

use crate::core::{MetricsError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Complete configuration for metron
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Metric collection configuration
    pub collection: CollectionConfig,
    /// Periodic reporting configuration
    pub reporting: ReportingConfig,
    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Swap every metric factory for the no-op variant
    pub disabled: bool,
    /// Maximum completed request timings buffered between report cycles
    pub request_timing_capacity: usize,
}

/// Reporting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportingConfig {
    /// Time between report cycles
    #[serde(with = "humantime_serde")]
    pub interval: Duration,
    /// Approximate time between reporter cleanup calls
    #[serde(with = "humantime_serde")]
    pub cleanup_interval: Duration,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: LogLevel,
    /// Structured (JSON) logging format
    pub structured: bool,
}

/// Log levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            collection: CollectionConfig::default(),
            reporting: ReportingConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CollectionConfig {
    fn default() -> Self {
        CollectionConfig {
            disabled: false,
            request_timing_capacity: 1024,
        }
    }
}

impl Default for ReportingConfig {
    fn default() -> Self {
        ReportingConfig {
            interval: Duration::from_secs(60),
            cleanup_interval: Duration::from_secs(8 * 60 * 60), // 8 hours
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: LogLevel::Info,
            structured: false,
        }
    }
}

impl Config {
    /// Create new config with defaults
    pub fn new() -> Result<Self> {
        let config = Config::default();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.collection.request_timing_capacity == 0 {
            return Err(MetricsError::config("request_timing_capacity must be greater than 0"));
        }

        if self.reporting.interval.is_zero() {
            return Err(MetricsError::InvalidInterval);
        }

        Ok(())
    }
}

impl ReportingConfig {
    /// Number of report cycles between reporter cleanups.
    ///
    /// Derived from whole cycles so the cleanup cadence follows the tick
    /// count rather than the wall clock.
    pub fn cleanup_every_ticks(&self) -> u64 {
        let interval = self.interval.as_millis().max(1);
        let ticks = (self.cleanup_interval.as_millis() + interval - 1) / interval;
        u64::try_from(ticks).unwrap_or(u64::MAX).max(1)
    }
}

impl LogLevel {
    /// Convert to tracing filter string
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Configuration builder for programmatic construction
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Create a new builder with defaults
    pub fn new() -> Self {
        ConfigBuilder {
            config: Config::default(),
        }
    }

    /// Load configuration from YAML string
    pub fn from_yaml(mut self, yaml: &str) -> Result<Self> {
        self.config = serde_yaml::from_str(yaml)?;
        Ok(self)
    }

    /// Load configuration from a YAML file
    pub fn from_file(self, path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MetricsError::config(format!("Failed to read config file {:?}: {}", path, e))
        })?;
        tracing::info!("Loaded configuration from: {:?}", path);
        self.from_yaml(&content)
    }

    /// Disable metric collection
    pub fn disabled(mut self, disabled: bool) -> Self {
        self.config.collection.disabled = disabled;
        self
    }

    /// Set request timing buffer capacity
    pub fn request_timing_capacity(mut self, capacity: usize) -> Self {
        self.config.collection.request_timing_capacity = capacity;
        self
    }

    /// Set report interval
    pub fn report_interval(mut self, interval: Duration) -> Self {
        self.config.reporting.interval = interval;
        self
    }

    /// Set cleanup interval
    pub fn cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.reporting.cleanup_interval = interval;
        self
    }

    /// Set log level
    pub fn log_level(mut self, level: LogLevel) -> Self {
        self.config.logging.level = level;
        self
    }

    /// Enable structured logging
    pub fn structured_logging(mut self, structured: bool) -> Self {
        self.config.logging.structured = structured;
        self
    }

    /// Build and validate the configuration
    pub fn build(self) -> Result<Config> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
