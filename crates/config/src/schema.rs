//! Config schema. Every field has a default so partial files are valid.

use std::path::PathBuf;

use {
    chrono_tz::Tz,
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeraldConfig {
    /// Journal and database root. `None` means [`crate::data_dir`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub home: Option<PathBuf>,
    pub master: MasterConfig,
    pub sessions: SessionsConfig,
}

impl HeraldConfig {
    pub fn home_dir(&self) -> PathBuf {
        self.home.clone().unwrap_or_else(crate::data_dir)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MasterConfig {
    /// Scheduler tick between idle polls.
    pub tick_interval_ms: u64,
    /// Busy-poll instead of sleeping between ticks.
    pub low_latency: bool,
    pub trading_day: TradingDayConfig,
}

impl Default for MasterConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 10,
            low_latency: false,
            trading_day: TradingDayConfig::default(),
        }
    }
}

/// When one trading day ends and the next begins.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TradingDayConfig {
    pub timezone: Tz,
    pub rollover_hour: u32,
    pub rollover_minute: u32,
}

impl Default for TradingDayConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Asia::Shanghai,
            rollover_hour: 15,
            rollover_minute: 30,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionsConfig {
    /// Overrides the index database path derived from the journal layout.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_path: Option<PathBuf>,
}
