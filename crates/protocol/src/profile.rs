//! Records the profile store persists across restarts.

use serde::{Deserialize, Serialize};

use crate::{
    location::Location,
    message::{Config, Message},
};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commission {
    pub product_id: String,
    pub exchange_id: String,
    pub open_ratio: f64,
    pub close_ratio: f64,
    pub close_today_ratio: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ProfileKind {
    Location,
    Config,
    Commission,
}

impl ProfileKind {
    /// Snapshot order used when replaying the profile to a new app.
    pub const ALL: [ProfileKind; 3] = [Self::Location, Self::Config, Self::Commission];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::Config => "config",
            Self::Commission => "commission",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ProfileRecord {
    Location(Location),
    Config(Config),
    Commission(Commission),
}

impl ProfileRecord {
    pub fn kind(&self) -> ProfileKind {
        match self {
            Self::Location(_) => ProfileKind::Location,
            Self::Config(_) => ProfileKind::Config,
            Self::Commission(_) => ProfileKind::Commission,
        }
    }

    /// Primary key within the record's kind.
    pub fn key(&self) -> String {
        match self {
            Self::Location(l) => l.uid_hex(),
            Self::Config(c) => format!("{:08x}", c.location_uid),
            Self::Commission(c) => format!("{}.{}", c.exchange_id, c.product_id),
        }
    }

    /// Extract the profile-relevant part of a journal message, if any.
    pub fn from_message(message: &Message) -> Option<Self> {
        match message {
            Message::Location(l) => Some(Self::Location(l.clone())),
            Message::Config(c) => Some(Self::Config(c.clone())),
            Message::Commission(c) => Some(Self::Commission(c.clone())),
            _ => None,
        }
    }

    pub fn into_message(self) -> Message {
        match self {
            Self::Location(l) => Message::Location(l),
            Self::Config(c) => Message::Config(c),
            Self::Commission(c) => Message::Commission(c),
        }
    }
}
