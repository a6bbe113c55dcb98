use std::time::Duration;

use thiserror::Error;

use crate::aven_drift::DriftTuning;

pub const DEFAULT_ADDR: &str = "0.0.0.0:9001";
pub const DEFAULT_TICK_HZ: f32 = 60.0;
pub const TICK_HZ_RANGE: std::ops::RangeInclusive<f32> = 20.0..=240.0;

#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("DRIFT_TICK_HZ must be a number in 20..=240, got {0:?}")]
    TickRate(String),
    #[error("unknown DRIFT_PRESET {0:?} (expected gt86 or awd_rally)")]
    Preset(String),
}

/// Server settings, read once at startup.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub tick_hz: f32,
    pub preset: DriftTuning,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: DEFAULT_ADDR.to_string(),
            tick_hz: DEFAULT_TICK_HZ,
            preset: DriftTuning::gt86(),
        }
    }
}

impl ServerConfig {
    /// `DRIFT_SERVER_ADDR`, `DRIFT_TICK_HZ`, `DRIFT_PRESET`; unset means default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(addr) = lookup("DRIFT_SERVER_ADDR").filter(|a| !a.trim().is_empty()) {
            config.bind_addr = addr.trim().to_string();
        }

        if let Some(raw) = lookup("DRIFT_TICK_HZ") {
            config.tick_hz = raw
                .trim()
                .parse::<f32>()
                .ok()
                .filter(|hz| TICK_HZ_RANGE.contains(hz))
                .ok_or_else(|| ConfigError::TickRate(raw.clone()))?;
        }

        if let Some(name) = lookup("DRIFT_PRESET") {
            config.preset = match name.trim().to_ascii_lowercase().as_str() {
                "gt86" => DriftTuning::gt86(),
                "awd_rally" | "awd" => DriftTuning::awd_rally(),
                _ => return Err(ConfigError::Preset(name)),
            };
        }

        Ok(config)
    }

    pub fn dt(&self) -> f32 {
        1.0 / self.tick_hz
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_secs_f32(self.dt())
    }
}
