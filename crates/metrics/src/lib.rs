//! Metric names shared by herald crates.
//!
//! Consumers depend on this crate behind their own `metrics` feature and
//! record through the re-exported `metrics` macros. With no recorder
//! installed every call is a no-op.

pub use metrics::{counter, gauge, histogram};

/// Master orchestrator metrics.
pub mod master {
    pub const REGISTRATIONS_TOTAL: &str = "herald_master_registrations_total";
    pub const REGISTRATIONS_REJECTED_TOTAL: &str = "herald_master_registrations_rejected_total";
    pub const DEREGISTRATIONS_TOTAL: &str = "herald_master_deregistrations_total";
    pub const CHANNELS_GRANTED_TOTAL: &str = "herald_master_channels_granted_total";
    pub const FRAMES_FED_TOTAL: &str = "herald_master_frames_fed_total";
    pub const TIMER_FIRES_TOTAL: &str = "herald_master_timer_fires_total";
    pub const LIVE_LOCATIONS: &str = "herald_master_live_locations";
}

/// Session index metrics.
pub mod sessions {
    pub const REBUILDS_TOTAL: &str = "herald_sessions_rebuilds_total";
    pub const REBUILT_SESSIONS: &str = "herald_sessions_rebuilt_sessions";
    pub const SKIPPED_FRAMES_TOTAL: &str = "herald_sessions_skipped_frames_total";
    pub const FAILED_FRAMES_TOTAL: &str = "herald_sessions_failed_frames_total";
}
