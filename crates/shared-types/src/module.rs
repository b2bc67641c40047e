//! # Module Kinds and Operations
//!
//! Every participant on the bus is addressed by a module kind plus an
//! instance id. Both appear verbatim as topic levels, so their wire form must
//! never contain `/`, `+` or `#`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Kind of module attached to the bus.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ModuleKind {
    /// The database module answering CRUD requests.
    Db,
    /// Backend services issuing requests.
    Backend,
    /// Configuration service.
    Config,
    /// Monitoring agent.
    Monitor,
    /// Statistics collector.
    Stat,
    /// Generic client.
    Client,
    /// Any module kind not known to this crate.
    Other(String),
}

impl ModuleKind {
    /// Wire name used as a topic level.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::Db => "DB",
            Self::Backend => "BACKEND",
            Self::Config => "CONFIG",
            Self::Monitor => "MONITOR",
            Self::Stat => "STAT",
            Self::Client => "CLIENT",
            Self::Other(name) => name,
        }
    }
}

impl fmt::Display for ModuleKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for ModuleKind {
    fn from(name: &str) -> Self {
        match name {
            "DB" => Self::Db,
            "BACKEND" => Self::Backend,
            "CONFIG" => Self::Config,
            "MONITOR" => Self::Monitor,
            "STAT" => Self::Stat,
            "CLIENT" => Self::Client,
            other => Self::Other(other.to_string()),
        }
    }
}

impl From<String> for ModuleKind {
    fn from(name: String) -> Self {
        Self::from(name.as_str())
    }
}

impl From<ModuleKind> for String {
    fn from(kind: ModuleKind) -> Self {
        kind.as_str().to_string()
    }
}

/// CRUD operation carried by a request topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    /// All operations, in CRUD order.
    pub const ALL: [Operation; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    /// Wire name used as the last level of a request topic.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Read => "READ",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a topic level does not name an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown operation: {0}")]
pub struct UnknownOperation(pub String);

impl FromStr for Operation {
    type Err = UnknownOperation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CREATE" => Ok(Self::Create),
            "READ" => Ok(Self::Read),
            "UPDATE" => Ok(Self::Update),
            "DELETE" => Ok(Self::Delete),
            other => Err(UnknownOperation(other.to_string())),
        }
    }
}
