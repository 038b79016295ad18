use featx_core::{Error, ExtraFieldPolicy, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Engine-wide settings, fixed when a [`Registry`](crate::Registry) is created
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Default bound on each precomputed lookup
    pub lookup_timeout_ms: u64,
    /// Treatment of undeclared fields in caller-supplied inputs
    pub extra_fields: ExtraFieldPolicy,
    /// Event rows resolved concurrently in batch mode
    pub batch_concurrency: usize,
    /// Column holding the event time in historical event tables
    pub timestamp_field: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            lookup_timeout_ms: 250,
            extra_fields: ExtraFieldPolicy::Reject,
            batch_concurrency: 64,
            timestamp_field: "timestamp".to_string(),
        }
    }
}

impl EngineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: EngineConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.lookup_timeout_ms == 0 {
            return Err(Error::InvalidConfig("lookup_timeout_ms must be positive".to_string()));
        }
        if self.batch_concurrency == 0 {
            return Err(Error::InvalidConfig("batch_concurrency must be positive".to_string()));
        }
        if self.timestamp_field.is_empty() {
            return Err(Error::InvalidConfig("timestamp_field cannot be empty".to_string()));
        }
        Ok(())
    }

    #[inline]
    pub fn lookup_timeout(&self) -> Duration {
        Duration::from_millis(self.lookup_timeout_ms)
    }

    pub fn serving_options(&self) -> ServingOptions {
        ServingOptions {
            timeout: self.lookup_timeout(),
            batch_concurrency: self.batch_concurrency,
        }
    }
}

/// Per-call bounds for serving and batch retrieval
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ServingOptions {
    pub timeout: Duration,
    pub batch_concurrency: usize,
}

impl Default for ServingOptions {
    fn default() -> Self {
        EngineConfig::default().serving_options()
    }
}

impl ServingOptions {
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}
