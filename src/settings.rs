//! Feed settings and configuration.
//!
//! The feed itself does no configuration loading at runtime; a
//! [`FeedSettings`] record is threaded through `initialize()` once. The
//! loader here layers an optional file over environment variables prefixed
//! with `FEED_` (e.g. `FEED_TIINGO_AUTH_TOKEN`).

use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

/// Feed settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedSettings {
    /// Maximum look-back for history-provider warmup, in days.
    /// File-based warmup is not clamped by this.
    #[serde(default = "default_warmup_look_back_days")]
    pub max_warmup_history_days_look_back: i64,

    /// Custom-data exchange settings
    #[serde(default)]
    pub custom_exchange: CustomExchangeSettings,

    /// Auth token handed once to the custom-data layer (optional)
    #[serde(default)]
    pub tiingo_auth_token: Option<String>,
}

fn default_warmup_look_back_days() -> i64 {
    7
}

/// Custom-data exchange settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomExchangeSettings {
    /// Worker sleep between poll cycles, in milliseconds
    #[serde(default = "default_sleep_interval_ms")]
    pub sleep_interval_ms: u64,
}

fn default_sleep_interval_ms() -> u64 {
    100
}

impl Default for CustomExchangeSettings {
    fn default() -> Self {
        Self {
            sleep_interval_ms: default_sleep_interval_ms(),
        }
    }
}

impl CustomExchangeSettings {
    /// Sleep interval as a `Duration`
    pub fn sleep_interval(&self) -> Duration {
        Duration::from_millis(self.sleep_interval_ms)
    }
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            max_warmup_history_days_look_back: default_warmup_look_back_days(),
            custom_exchange: CustomExchangeSettings::default(),
            tiingo_auth_token: None,
        }
    }
}

impl FeedSettings {
    /// Load settings from an optional file plus `FEED_`-prefixed environment
    /// variables. Environment variables win.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::with_name(path).required(false));
        }
        builder
            .add_source(Environment::with_prefix("FEED").separator("__"))
            .build()?
            .try_deserialize()
    }

    /// Set the history-warmup look-back, in days
    pub fn with_warmup_look_back_days(mut self, days: i64) -> Self {
        self.max_warmup_history_days_look_back = days;
        self
    }

    /// Set the custom-data exchange sleep interval
    pub fn with_sleep_interval(mut self, interval: Duration) -> Self {
        self.custom_exchange.sleep_interval_ms = interval.as_millis() as u64;
        self
    }
}
