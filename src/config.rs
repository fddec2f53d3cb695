//! Runtime configuration: defaults plus `SENSOR_*` environment overrides.

use std::time::Duration;

pub const ENV_PERIOD_MS: &str = "SENSOR_PERIOD_MS";
pub const ENV_CAPACITY: &str = "SENSOR_BUFFER_CAPACITY";
pub const ENV_SEED: &str = "SENSOR_SEED";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SamplerConfig {
    /// Time between sampler fires.
    pub period: Duration,
    /// Sample history size.
    pub capacity: usize,
    /// Fixed RNG seed; `None` draws from the system.
    pub seed: Option<u64>,
    /// Clock value treated as time zero by the waveform phase.
    pub boot_epoch: u64,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            period: Duration::from_millis(1000),
            capacity: 1024,
            seed: None,
            boot_epoch: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    InvalidNumber { var: &'static str, value: String },
    ZeroCapacity,
    ZeroPeriod,
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::InvalidNumber { var, value } => {
                write!(f, "{var}: expected a non-negative integer, got {value:?}")
            }
            ConfigError::ZeroCapacity => write!(f, "buffer capacity must be > 0"),
            ConfigError::ZeroPeriod => write!(f, "sampling period must be > 0"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl SamplerConfig {
    /// Defaults overridden by whichever `SENSOR_*` variables are set.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|var| std::env::var(var).ok())
    }

    /// Same as `from_env` with an explicit variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        if let Some(ms) = parse_var(&lookup, ENV_PERIOD_MS)? {
            config.period = Duration::from_millis(ms);
        }
        if let Some(capacity) = parse_var(&lookup, ENV_CAPACITY)? {
            config.capacity = capacity as usize;
        }
        config.seed = parse_var(&lookup, ENV_SEED)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.capacity == 0 {
            return Err(ConfigError::ZeroCapacity);
        }
        if self.period.is_zero() {
            return Err(ConfigError::ZeroPeriod);
        }
        Ok(())
    }
}

fn parse_var(
    lookup: &impl Fn(&str) -> Option<String>,
    var: &'static str,
) -> Result<Option<u64>, ConfigError> {
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|_| ConfigError::InvalidNumber { var, value: raw }),
    }
}
