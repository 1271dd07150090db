// SPDX-License-Identifier: MIT OR Apache-2.0
//! Entity identifiers shared by nodes and edges.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a node or an edge.
///
/// Loaders disagree on whether ids are numbers or strings, so both are
/// accepted. Use [`EntityId::alternate`] to look an id up under its twin
/// representation.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EntityId {
    /// Integer id
    Int(i64),
    /// String id
    Str(String),
}

impl EntityId {
    /// The same id in its other representation, if it has one.
    ///
    /// `Int(7)` maps to `Str("7")` and `Str("7")` maps to `Int(7)`. Strings
    /// that are not canonical integers (`"07"`, `"a"`) have no twin.
    pub fn alternate(&self) -> Option<EntityId> {
        match self {
            Self::Int(value) => Some(Self::Str(value.to_string())),
            Self::Str(text) => {
                let value = text.parse::<i64>().ok()?;
                (value.to_string() == *text).then_some(Self::Int(value))
            }
        }
    }

    /// Integer value, if this id is numeric.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Str(_) => None,
        }
    }

    /// String value, if this id is textual.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Int(_) => None,
            Self::Str(text) => Some(text),
        }
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(value) => write!(f, "{value}"),
            Self::Str(text) => f.write_str(text),
        }
    }
}

impl From<i64> for EntityId {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<i32> for EntityId {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<u32> for EntityId {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<&str> for EntityId {
    fn from(value: &str) -> Self {
        Self::Str(value.to_string())
    }
}

impl From<String> for EntityId {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

impl From<&EntityId> for EntityId {
    fn from(value: &EntityId) -> Self {
        value.clone()
    }
}
