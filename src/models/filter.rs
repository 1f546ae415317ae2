//! Filter state sent by the task list view.

use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize};

use super::{TaskStatus, Validation};

/// Ephemeral list filters. Every field empty means "show everything visible".
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct FilterState {
    #[serde(default, deserialize_with = "empty_as_none")]
    pub store: Option<String>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub status: Option<TaskStatus>,
    #[serde(default, deserialize_with = "empty_as_none")]
    pub validation: Option<Validation>,
    #[serde(default)]
    pub overdue: bool,
    /// Free-text query
    #[serde(default, deserialize_with = "empty_as_none")]
    pub q: Option<String>,
}

impl FilterState {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// Query strings carry unset selects as empty values.
fn empty_as_none<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw {
        None => Ok(None),
        Some(s) if s.is_empty() => Ok(None),
        Some(s) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}
