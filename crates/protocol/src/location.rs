use std::{fmt, str::FromStr};

use {
    serde::{Deserialize, Serialize},
    sha2::{Digest, Sha256},
};

use crate::error::ProtocolError;

/// Destination uid of the shared public stream every location observes.
pub const PUBLIC_UID: u32 = 0;

/// Operating mode of a location.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Live,
    Data,
    Replay,
    Backtest,
}

impl Mode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Live => "live",
            Self::Data => "data",
            Self::Replay => "replay",
            Self::Backtest => "backtest",
        }
    }
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mode {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "live" => Ok(Self::Live),
            "data" => Ok(Self::Data),
            "replay" => Ok(Self::Replay),
            "backtest" => Ok(Self::Backtest),
            other => Err(ProtocolError::UnknownMode(other.to_string())),
        }
    }
}

/// Role of a location in the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    /// Market data gateways.
    Md,
    /// Trading gateways.
    Td,
    Strategy,
    System,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Md => "md",
            Self::Td => "td",
            Self::Strategy => "strategy",
            Self::System => "system",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "md" => Ok(Self::Md),
            "td" => Ok(Self::Td),
            "strategy" => Ok(Self::Strategy),
            "system" => Ok(Self::System),
            other => Err(ProtocolError::UnknownCategory(other.to_string())),
        }
    }
}

/// Identity of a participating process.
///
/// The uid is a pure function of category/group/name/mode, so a process that
/// restarts under the same name gets the same uid back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub uid: u32,
    pub category: Category,
    pub group: String,
    pub name: String,
    pub mode: Mode,
}

impl Location {
    pub fn new(
        mode: Mode,
        category: Category,
        group: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        let group = group.into();
        let name = name.into();
        Self {
            uid: location_uid(category, &group, &name, mode),
            category,
            group,
            name,
            mode,
        }
    }

    /// Parse `category/group/name/mode`.
    pub fn parse(uname: &str) -> Result<Self, ProtocolError> {
        let parts: Vec<&str> = uname.split('/').collect();
        let [category, group, name, mode] = parts.as_slice() else {
            return Err(ProtocolError::InvalidLocation(uname.to_string()));
        };
        if group.is_empty() || name.is_empty() {
            return Err(ProtocolError::InvalidLocation(uname.to_string()));
        }
        Ok(Self::new(mode.parse()?, category.parse()?, *group, *name))
    }

    /// `category/group/name/mode`
    pub fn uname(&self) -> String {
        format!("{}/{}/{}/{}", self.category, self.group, self.name, self.mode)
    }

    /// The uid rendered the way it appears in paths and command location names.
    pub fn uid_hex(&self) -> String {
        format!("{:08x}", self.uid)
    }

    pub fn is_market_data(&self) -> bool {
        self.category == Category::Md
    }

    /// Locations on the master's own control group (`system/master/*`).
    pub fn is_master_control(&self) -> bool {
        self.category == Category::System && self.group == "master"
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}/{}", self.category, self.group, self.name, self.mode)
    }
}

/// Derive the uid for a location name. Never returns [`PUBLIC_UID`].
pub fn location_uid(category: Category, group: &str, name: &str, mode: Mode) -> u32 {
    let uname = format!("{category}/{group}/{name}/{mode}");
    let digest = Sha256::digest(uname.as_bytes());
    let uid = u32::from_be_bytes([digest[0], digest[1], digest[2], digest[3]]);
    if uid == PUBLIC_UID { 1 } else { uid }
}
