//! Dispatcher configuration.
//!
//! Loads and validates YAML files such as:
//!
//! ```yaml
//! batching:
//!   mode: batch
//!   max_size: 32
//! request_timeout_ms: 30000
//! id_strategy: sequential
//! linger_ms: 5
//! max_in_flight_batches: 8
//! shutdown_grace_ms: 5000
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Batch size used when no policy is configured.
pub const DEFAULT_BATCH_SIZE: usize = 32;

/// How long `close()` waits for in-flight batches by default.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

/// Errors from loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse config YAML: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// When queued requests are sealed into a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum BatchPolicy {
    /// Every request is sent alone, immediately.
    NoBatching,
    /// Accumulate up to `max_size` requests or until flushed.
    Batch { max_size: usize },
}

impl BatchPolicy {
    /// Number of requests that seals a batch.
    pub fn max_size(&self) -> usize {
        match self {
            Self::NoBatching => 1,
            Self::Batch { max_size } => *max_size,
        }
    }

    pub fn is_batching(&self) -> bool {
        matches!(self, Self::Batch { .. })
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::Batch {
            max_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Where request identifiers come from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdStrategy {
    /// The dispatcher numbers requests that arrive without an id (1, 2, 3, ...).
    #[default]
    Sequential,
    /// Every request must carry its own id.
    CallerSupplied,
}

/// Settings for one request dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Batching policy.
    pub batching: BatchPolicy,
    /// Per-request deadline; `None` waits for the transport indefinitely.
    #[serde(rename = "request_timeout_ms", with = "millis_opt")]
    pub request_timeout: Option<Duration>,
    /// Identifier generation strategy.
    pub id_strategy: IdStrategy,
    /// Seal a partially filled batch once its first request is this old.
    #[serde(rename = "linger_ms", with = "millis_opt")]
    pub linger: Option<Duration>,
    /// Maximum number of batches awaiting a transport reply at once.
    pub max_in_flight_batches: Option<usize>,
    /// Upper bound on draining in-flight batches during shutdown.
    #[serde(rename = "shutdown_grace_ms", with = "millis")]
    pub shutdown_grace: Duration,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            batching: BatchPolicy::default(),
            request_timeout: None,
            id_strategy: IdStrategy::default(),
            linger: None,
            max_in_flight_batches: None,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }
}

impl DispatcherConfig {
    /// Parse and validate a config from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config from a YAML file.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml(&contents)
    }

    /// Reject settings the dispatcher cannot honour.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batching.max_size() == 0 {
            return Err(ConfigError::Invalid(
                "batching.max_size must be at least 1".into(),
            ));
        }
        if self.max_in_flight_batches == Some(0) {
            return Err(ConfigError::Invalid(
                "max_in_flight_batches must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn with_batching(mut self, batching: BatchPolicy) -> Self {
        self.batching = batching;
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_id_strategy(mut self, id_strategy: IdStrategy) -> Self {
        self.id_strategy = id_strategy;
        self
    }

    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = Some(linger);
        self
    }

    pub fn with_max_in_flight_batches(mut self, limit: usize) -> Self {
        self.max_in_flight_batches = Some(limit);
        self
    }

    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

mod millis_opt {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &Option<Duration>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<Duration>, D::Error> {
        Ok(Option::<u64>::deserialize(deserializer)?.map(Duration::from_millis))
    }
}
