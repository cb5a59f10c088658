use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Durations travel as whole milliseconds.
mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis().min(u128::from(u64::MAX)) as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(deserializer)?))
    }
}

/// Calibration constants used by the primitive and composite operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineTiming {
    /// Tail of every hold/wait that is spun instead of slept.
    #[serde(with = "millis", rename = "spin_threshold_ms")]
    pub spin_threshold: Duration,
    /// Poll period of the terminal-condition monitor.
    #[serde(with = "millis", rename = "monitor_interval_ms")]
    pub monitor_interval: Duration,
    /// Delay before a hold-and-run-once task fires.
    #[serde(with = "millis", rename = "once_delay_ms")]
    pub once_delay: Duration,
    /// Pause after a tap sequence so the game registers it.
    #[serde(with = "millis", rename = "tap_settle_ms")]
    pub tap_settle: Duration,
    /// Pause between grabbing the camera and moving the pointer.
    #[serde(with = "millis", rename = "camera_settle_ms")]
    pub camera_settle: Duration,
    /// Modifier held while dragging the camera.
    pub camera_modifier: String,
    /// Horizontal pointer travel per degree of camera rotation.
    pub pixels_per_degree_x: f32,
    /// Vertical pointer travel per degree of camera pitch.
    pub pixels_per_degree_y: f32,
}

impl Default for EngineTiming {
    fn default() -> Self {
        Self {
            spin_threshold: Duration::from_millis(500),
            monitor_interval: Duration::from_millis(200),
            once_delay: Duration::from_secs(1),
            tap_settle: Duration::from_millis(200),
            camera_settle: Duration::from_millis(50),
            camera_modifier: "alt".to_string(),
            pixels_per_degree_x: 3.24,
            pixels_per_degree_y: 7.8,
        }
    }
}

impl EngineTiming {
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn with_spin_threshold(mut self, threshold: Duration) -> Self {
        self.spin_threshold = threshold;
        self
    }

    pub fn with_monitor_interval(mut self, interval: Duration) -> Self {
        self.monitor_interval = interval;
        self
    }

    pub fn with_once_delay(mut self, delay: Duration) -> Self {
        self.once_delay = delay;
        self
    }

    pub fn with_tap_settle(mut self, settle: Duration) -> Self {
        self.tap_settle = settle;
        self
    }
}

/// How many rounds to run and how each round is bounded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    pub times: u32,
    #[serde(with = "millis", rename = "round_timeout_ms")]
    pub round_timeout: Duration,
    #[serde(with = "millis", rename = "interval_ms", default)]
    pub interval: Duration,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            times: 1,
            round_timeout: Duration::from_secs(15 * 60),
            interval: Duration::from_secs(5),
        }
    }
}

impl ExecutionConfig {
    pub fn builder() -> ExecutionConfigBuilder {
        ExecutionConfigBuilder::new()
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.round_timeout.is_zero() {
            return Err(ConfigError::Invalid("round timeout must be non-zero".into()));
        }
        Ok(())
    }
}

/// Fluent builder for [`ExecutionConfig`].
pub struct ExecutionConfigBuilder {
    config: ExecutionConfig,
}

impl ExecutionConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: ExecutionConfig::default(),
        }
    }

    pub fn times(mut self, times: u32) -> Self {
        self.config.times = times;
        self
    }

    pub fn round_timeout(mut self, timeout: Duration) -> Self {
        self.config.round_timeout = timeout;
        self
    }

    pub fn interval(mut self, interval: Duration) -> Self {
        self.config.interval = interval;
        self
    }

    pub fn build(self) -> Result<ExecutionConfig, ConfigError> {
        self.config.validate()?;
        Ok(self.config)
    }
}

impl Default for ExecutionConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
