//! Wire vocabulary shared by the master and its peers.
//!
//! Every record exchanged over the journal is one variant of [`Message`]. The
//! catalogs of state and profile payloads are closed enums as well, so every
//! fan-out over "all payload kinds" is a single exhaustive `match`.

pub mod error;
pub mod frame;
pub mod location;
pub mod message;
pub mod profile;
pub mod state;

pub use {
    error::ProtocolError,
    frame::{FRAME_HEADER_LENGTH, Frame},
    location::{Category, Location, Mode, PUBLIC_UID},
    message::{
        CacheReset, Channel, Config, Deregister, Message, MsgType, Register, RequestReadFrom,
        RequestReadFromPublic, RequestWriteTo, TimeRequest, TimeReset, TradingDay,
    },
    profile::{Commission, ProfileKind, ProfileRecord},
    state::{Asset, Direction, Order, Position, StateData, StateKind, Trade},
};

/// Sentinel returned for locations that have never been active.
pub const NEVER_ACTIVE: i64 = i64::MAX;
