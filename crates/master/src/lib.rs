//! The master: session and channel broker for herald locations.
//!
//! A [`Master`] owns the location, channel and timer registries plus the live
//! session builder. [`run`] drives it from one task until shutdown.

pub mod cache;
pub mod channels;
pub mod hooks;
pub mod master;
pub mod pending;
pub mod registry;
pub mod run;
pub mod timer;
pub mod trading_day;

pub use {
    cache::CacheShift,
    channels::ChannelRegistry,
    hooks::{MasterHooks, NoHooks},
    master::{Master, MasterEvent, MasterHandle},
    pending::PendingTable,
    registry::LocationRegistry,
    run::run,
    timer::{TimerTable, TimerTask},
    trading_day::TradingCalendar,
};
