//! Unit status reported back to the host after every dispatch.

use std::fmt;

use serde::{Deserialize, Serialize};

pub const AWAITING_RELATIONS: &str = "awaiting relations";
pub const CONTAINER_NOT_READY: &str = "container not ready";

/// Outcome of the most recent reconciliation attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "message", rename_all = "snake_case")]
pub enum UnitStatus {
    Active,
    Waiting(String),
    Blocked(String),
}

impl UnitStatus {
    pub fn waiting(reason: impl Into<String>) -> Self {
        UnitStatus::Waiting(reason.into())
    }

    pub fn blocked(reason: impl Into<String>) -> Self {
        UnitStatus::Blocked(reason.into())
    }

    pub fn is_active(&self) -> bool {
        matches!(self, UnitStatus::Active)
    }

    pub fn reason(&self) -> Option<&str> {
        match self {
            UnitStatus::Active => None,
            UnitStatus::Waiting(reason) | UnitStatus::Blocked(reason) => Some(reason),
        }
    }
}

impl Default for UnitStatus {
    fn default() -> Self {
        UnitStatus::blocked(AWAITING_RELATIONS)
    }
}

impl fmt::Display for UnitStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UnitStatus::Active => write!(f, "active"),
            UnitStatus::Waiting(reason) => write!(f, "waiting: {}", reason),
            UnitStatus::Blocked(reason) => write!(f, "blocked: {}", reason),
        }
    }
}
