use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::shared::ValidationError;

/// Configuration of marker (pseudo-GTID) recognition and log scanning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MarkerConfig {
    /// Regular expression matched against a log record's statement text to recognize markers.
    pub pattern: String,
    /// Event kinds the log cursor skips as non-informational.
    ///
    /// Default: empty, every record returned by the server takes part in matching.
    #[serde(default)]
    pub skip_event_kinds: Vec<String>,
    /// Maximum number of records requested per log read.
    ///
    /// Default: 1000000
    #[serde(default = "default_page_size")]
    pub page_size: u64,
    /// Marker position lookup cache settings.
    #[serde(default)]
    pub cache: MarkerCacheConfig,
}

impl MarkerConfig {
    /// Default number of records per log read.
    pub const DEFAULT_PAGE_SIZE: u64 = 1_000_000;

    /// Validates the marker configuration.
    ///
    /// The pattern must compile and the page size must be non-zero.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.pattern.is_empty() {
            return Err(ValidationError::EmptyField("pattern"));
        }
        if let Err(err) = Regex::new(&self.pattern) {
            return Err(ValidationError::InvalidMarkerPattern {
                pattern: self.pattern.clone(),
                reason: err.to_string(),
            });
        }
        if self.page_size == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "page_size",
                constraint: "must be greater than zero",
            });
        }

        self.cache.validate()
    }
}

fn default_page_size() -> u64 {
    MarkerConfig::DEFAULT_PAGE_SIZE
}

/// Settings of the marker position lookup cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MarkerCacheConfig {
    /// Lifetime of an entry from insertion, in seconds.
    ///
    /// Default: 600 (10 minutes)
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Interval between sweeps that reap expired entries, in seconds.
    ///
    /// Default: 60
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,
}

impl MarkerCacheConfig {
    /// Default entry lifetime: 10 minutes.
    pub const DEFAULT_TTL_SECS: u64 = 600;

    /// Default sweep interval: 1 minute.
    pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

    /// Validates the cache configuration.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.sweep_interval_secs == 0 {
            return Err(ValidationError::InvalidFieldValue {
                field: "sweep_interval_secs",
                constraint: "must be greater than zero",
            });
        }
        if self.sweep_interval_secs > self.ttl_secs {
            return Err(ValidationError::InvalidFieldValue {
                field: "sweep_interval_secs",
                constraint: "must not exceed `ttl_secs`",
            });
        }

        Ok(())
    }
}

impl Default for MarkerCacheConfig {
    fn default() -> Self {
        Self {
            ttl_secs: Self::DEFAULT_TTL_SECS,
            sweep_interval_secs: Self::DEFAULT_SWEEP_INTERVAL_SECS,
        }
    }
}

fn default_ttl_secs() -> u64 {
    MarkerCacheConfig::DEFAULT_TTL_SECS
}

fn default_sweep_interval_secs() -> u64 {
    MarkerCacheConfig::DEFAULT_SWEEP_INTERVAL_SECS
}
