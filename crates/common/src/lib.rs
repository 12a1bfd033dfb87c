//! Shared primitives for herald crates.

pub mod time;

pub use time::{Clock, ManualClock, SystemClock, TimeBase};
