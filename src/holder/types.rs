//! Holder identity types

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Name of the group every user falls back to
pub const DEFAULT_GROUP: &str = "default";

/// Stable identity of a permission holder
///
/// Users are identified by their unique id; groups by their lower-cased name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(tag = "type", content = "id", rename_all = "lowercase")]
pub enum HolderId {
    User(Uuid),
    Group(String),
}

impl HolderId {
    pub fn user(id: Uuid) -> Self {
        HolderId::User(id)
    }

    pub fn group(name: &str) -> Self {
        HolderId::Group(name.to_lowercase())
    }

    pub fn holder_type(&self) -> HolderType {
        match self {
            HolderId::User(_) => HolderType::User,
            HolderId::Group(_) => HolderType::Group,
        }
    }

    pub fn is_group(&self) -> bool {
        matches!(self, HolderId::Group(_))
    }

    /// Group name, if this identifies a group
    pub fn group_name(&self) -> Option<&str> {
        match self {
            HolderId::Group(name) => Some(name),
            HolderId::User(_) => None,
        }
    }
}

impl fmt::Display for HolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderId::User(id) => write!(f, "user:{}", id),
            HolderId::Group(name) => write!(f, "group:{}", name),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HolderType {
    User,
    Group,
}

impl fmt::Display for HolderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HolderType::User => write!(f, "user"),
            HolderType::Group => write!(f, "group"),
        }
    }
}

/// Which node collection of a holder is addressed
///
/// Transient nodes live only in memory and take precedence over normal
/// nodes when both define the same key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    Normal,
    Transient,
}
