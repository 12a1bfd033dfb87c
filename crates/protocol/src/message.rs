use serde::{Deserialize, Serialize};

use crate::{
    error::ProtocolError,
    location::{Category, Location, Mode},
    profile::Commission,
    state::{StateData, StateKind},
};

/// Type tag carried by every journal frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(i32)]
pub enum MsgType {
    SessionStart = 10001,
    SessionEnd = 10002,
    Time = 10004,
    TimeRequest = 10005,
    RequestStart = 10006,
    TimeReset = 10007,
    TradingDay = 10008,
    Ping = 10009,
    Register = 10011,
    Deregister = 10012,
    Location = 10013,
    Config = 10014,
    Channel = 10015,
    RequestWriteTo = 10021,
    RequestReadFrom = 10022,
    RequestReadFromPublic = 10023,
    CacheReset = 10024,
    Asset = 203,
    Position = 204,
    Order = 205,
    Trade = 206,
    Commission = 207,
}

impl MsgType {
    pub fn tag(self) -> i32 {
        self as i32
    }

    pub fn from_tag(tag: i32) -> Result<Self, ProtocolError> {
        Ok(match tag {
            10001 => Self::SessionStart,
            10002 => Self::SessionEnd,
            10004 => Self::Time,
            10005 => Self::TimeRequest,
            10006 => Self::RequestStart,
            10007 => Self::TimeReset,
            10008 => Self::TradingDay,
            10009 => Self::Ping,
            10011 => Self::Register,
            10012 => Self::Deregister,
            10013 => Self::Location,
            10014 => Self::Config,
            10015 => Self::Channel,
            10021 => Self::RequestWriteTo,
            10022 => Self::RequestReadFrom,
            10023 => Self::RequestReadFromPublic,
            10024 => Self::CacheReset,
            203 => Self::Asset,
            204 => Self::Position,
            205 => Self::Order,
            206 => Self::Trade,
            207 => Self::Commission,
            other => return Err(ProtocolError::UnknownMsgType(other)),
        })
    }
}

/// A location announcing itself to the master.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Register {
    pub category: Category,
    pub group: String,
    pub name: String,
    pub mode: Mode,
    pub pid: u32,
    pub checkin_time: i64,
    /// Stamped by the master from the session index before broadcast.
    pub last_active_time: i64,
}

impl Register {
    pub fn new(location: &Location, pid: u32, checkin_time: i64) -> Self {
        Self {
            category: location.category,
            group: location.group.clone(),
            name: location.name.clone(),
            mode: location.mode,
            pid,
            checkin_time,
            last_active_time: 0,
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.mode, self.category, &self.group, &self.name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deregister {
    pub location_uid: u32,
    pub category: Category,
    pub group: String,
    pub name: String,
    pub mode: Mode,
}

impl From<&Location> for Deregister {
    fn from(location: &Location) -> Self {
        Self {
            location_uid: location.uid,
            category: location.category,
            group: location.group.clone(),
            name: location.name.clone(),
            mode: location.mode,
        }
    }
}

/// Persisted per-location settings; their existence makes the location known.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub location_uid: u32,
    pub category: Category,
    pub group: String,
    pub name: String,
    pub mode: Mode,
    pub value: String,
}

impl Config {
    pub fn new(location: &Location, value: impl Into<String>) -> Self {
        Self {
            location_uid: location.uid,
            category: location.category,
            group: location.group.clone(),
            name: location.name.clone(),
            mode: location.mode,
            value: value.into(),
        }
    }

    pub fn location(&self) -> Location {
        Location::new(self.mode, self.category, &self.group, &self.name)
    }
}

/// A directed routing grant: `source_id` may write frames `dest_id` reads.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
pub struct Channel {
    pub source_id: u32,
    pub dest_id: u32,
}

impl Channel {
    pub fn new(source_id: u32, dest_id: u32) -> Self {
        Self { source_id, dest_id }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestWriteTo {
    pub dest_id: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReadFrom {
    pub source_id: u32,
    pub from_time: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestReadFromPublic {
    pub source_id: u32,
    pub from_time: i64,
}

/// Ask the master for `repeat` time markers, one every `duration` nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRequest {
    pub id: i32,
    pub duration: i64,
    pub repeat: i32,
}

/// Ask the master to move the cached entries of one state type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheReset {
    pub msg_type: i32,
}

impl CacheReset {
    pub fn for_kind(kind: StateKind) -> Self {
        Self {
            msg_type: kind.msg_type().tag(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeReset {
    pub system_clock_count: i64,
    pub steady_clock_count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TradingDay {
    pub timestamp: i64,
}

/// Every record that can travel in a journal frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Message {
    SessionStart,
    SessionEnd,
    RequestStart,
    Time,
    Ping,
    TimeReset(TimeReset),
    TradingDay(TradingDay),
    TimeRequest(TimeRequest),
    Register(Register),
    Deregister(Deregister),
    Location(Location),
    Config(Config),
    Channel(Channel),
    RequestWriteTo(RequestWriteTo),
    RequestReadFrom(RequestReadFrom),
    RequestReadFromPublic(RequestReadFromPublic),
    CacheReset(CacheReset),
    Commission(Commission),
    State(StateData),
}

impl Message {
    pub fn msg_type(&self) -> MsgType {
        match self {
            Self::SessionStart => MsgType::SessionStart,
            Self::SessionEnd => MsgType::SessionEnd,
            Self::RequestStart => MsgType::RequestStart,
            Self::Time => MsgType::Time,
            Self::Ping => MsgType::Ping,
            Self::TimeReset(_) => MsgType::TimeReset,
            Self::TradingDay(_) => MsgType::TradingDay,
            Self::TimeRequest(_) => MsgType::TimeRequest,
            Self::Register(_) => MsgType::Register,
            Self::Deregister(_) => MsgType::Deregister,
            Self::Location(_) => MsgType::Location,
            Self::Config(_) => MsgType::Config,
            Self::Channel(_) => MsgType::Channel,
            Self::RequestWriteTo(_) => MsgType::RequestWriteTo,
            Self::RequestReadFrom(_) => MsgType::RequestReadFrom,
            Self::RequestReadFromPublic(_) => MsgType::RequestReadFromPublic,
            Self::CacheReset(_) => MsgType::CacheReset,
            Self::Commission(_) => MsgType::Commission,
            Self::State(data) => data.kind().msg_type(),
        }
    }

    /// The payload-less record for a marker type, if `msg_type` is one.
    pub fn marker(msg_type: MsgType) -> Option<Self> {
        match msg_type {
            MsgType::SessionStart => Some(Self::SessionStart),
            MsgType::SessionEnd => Some(Self::SessionEnd),
            MsgType::RequestStart => Some(Self::RequestStart),
            MsgType::Time => Some(Self::Time),
            MsgType::Ping => Some(Self::Ping),
            _ => None,
        }
    }

    /// Serialized payload size in bytes.
    pub fn encoded_len(&self) -> usize {
        postcard::to_allocvec(self).map(|b| b.len()).unwrap_or(0)
    }
}
