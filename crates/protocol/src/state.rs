//! Mutable shared state that the master caches per consuming app and replays
//! to it on registration.

use serde::{Deserialize, Serialize};

use crate::{error::ProtocolError, message::MsgType};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum StateKind {
    Asset,
    Position,
    Order,
    Trade,
}

impl StateKind {
    pub const ALL: [StateKind; 4] = [Self::Asset, Self::Position, Self::Order, Self::Trade];

    pub fn msg_type(self) -> MsgType {
        match self {
            Self::Asset => MsgType::Asset,
            Self::Position => MsgType::Position,
            Self::Order => MsgType::Order,
            Self::Trade => MsgType::Trade,
        }
    }

    pub fn from_tag(tag: i32) -> Result<Self, ProtocolError> {
        match MsgType::from_tag(tag)? {
            MsgType::Asset => Ok(Self::Asset),
            MsgType::Position => Ok(Self::Position),
            MsgType::Order => Ok(Self::Order),
            MsgType::Trade => Ok(Self::Trade),
            _ => Err(ProtocolError::NotStateType(tag)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Asset {
    pub holder_uid: u32,
    pub avail: f64,
    pub margin: f64,
    pub update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub holder_uid: u32,
    pub instrument_id: String,
    pub exchange_id: String,
    pub direction: Direction,
    pub volume: i64,
    pub avg_open_price: f64,
    pub update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Order {
    pub order_id: u64,
    pub instrument_id: String,
    pub exchange_id: String,
    pub limit_price: f64,
    pub volume: i64,
    pub volume_left: i64,
    pub status: i32,
    pub update_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub trade_id: u64,
    pub order_id: u64,
    pub instrument_id: String,
    pub exchange_id: String,
    pub price: f64,
    pub volume: i64,
    pub trade_time: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StateData {
    Asset(Asset),
    Position(Position),
    Order(Order),
    Trade(Trade),
}

impl StateData {
    pub fn kind(&self) -> StateKind {
        match self {
            Self::Asset(_) => StateKind::Asset,
            Self::Position(_) => StateKind::Position,
            Self::Order(_) => StateKind::Order,
            Self::Trade(_) => StateKind::Trade,
        }
    }

    /// Identity of the record within its kind; a newer record with the same
    /// key replaces the older one.
    pub fn key(&self) -> String {
        match self {
            Self::Asset(a) => format!("{:08x}", a.holder_uid),
            Self::Position(p) => format!(
                "{:08x}.{}.{}.{:?}",
                p.holder_uid, p.exchange_id, p.instrument_id, p.direction
            ),
            Self::Order(o) => o.order_id.to_string(),
            Self::Trade(t) => t.trade_id.to_string(),
        }
    }
}
