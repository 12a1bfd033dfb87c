//! Configuration discovery and loading for herald.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, data_dir, discover_and_load, find_or_default_config_path,
        load_config, save_config, set_config_dir,
    },
    schema::{HeraldConfig, MasterConfig, SessionsConfig, TradingDayConfig},
};
