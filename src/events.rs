//! Host events the operator reacts to.

use std::fmt;

use serde::Serialize;
use thiserror::Error;

use crate::relations::{RelationData, RelationName};
use crate::workload::ENGINE_CONTAINER_NAME;

/// What kind of event happened, independent of its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    ConfigChanged,
    WorkloadReady,
    RelationJoined,
    RelationChanged,
    RelationDeparted,
}

/// Dispatch table key: the event kind plus the relation it concerns, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventKey {
    pub kind: EventKind,
    pub relation: Option<RelationName>,
}

impl EventKey {
    pub const fn lifecycle(kind: EventKind) -> Self {
        Self {
            kind,
            relation: None,
        }
    }

    pub const fn relation(kind: EventKind, relation: RelationName) -> Self {
        Self {
            kind,
            relation: Some(relation),
        }
    }
}

/// A single event delivered by the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookEvent {
    ConfigChanged,
    /// The workload container's supervisor became reachable.
    WorkloadReady,
    RelationJoined {
        relation: RelationName,
        relation_id: u32,
    },
    RelationChanged {
        relation: RelationName,
        relation_id: u32,
        /// The remote application's data bag.
        data: RelationData,
    },
    RelationDeparted {
        relation: RelationName,
        relation_id: u32,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown event '{0}'")]
pub struct UnknownEvent(pub String);

impl HookEvent {
    pub fn key(&self) -> EventKey {
        match self {
            HookEvent::ConfigChanged => EventKey::lifecycle(EventKind::ConfigChanged),
            HookEvent::WorkloadReady => EventKey::lifecycle(EventKind::WorkloadReady),
            HookEvent::RelationJoined { relation, .. } => {
                EventKey::relation(EventKind::RelationJoined, *relation)
            }
            HookEvent::RelationChanged { relation, .. } => {
                EventKey::relation(EventKind::RelationChanged, *relation)
            }
            HookEvent::RelationDeparted { relation, .. } => {
                EventKey::relation(EventKind::RelationDeparted, *relation)
            }
        }
    }

    pub fn relation_id(&self) -> Option<u32> {
        match self {
            HookEvent::ConfigChanged | HookEvent::WorkloadReady => None,
            HookEvent::RelationJoined { relation_id, .. }
            | HookEvent::RelationChanged { relation_id, .. }
            | HookEvent::RelationDeparted { relation_id, .. } => Some(*relation_id),
        }
    }

    /// Host-style event name, e.g. `legend-db-relation-changed`.
    pub fn name(&self) -> String {
        match self {
            HookEvent::ConfigChanged => "config-changed".to_string(),
            HookEvent::WorkloadReady => format!("{ENGINE_CONTAINER_NAME}-workload-ready"),
            HookEvent::RelationJoined { relation, .. } => format!("{relation}-relation-joined"),
            HookEvent::RelationChanged { relation, .. } => format!("{relation}-relation-changed"),
            HookEvent::RelationDeparted { relation, .. } => {
                format!("{relation}-relation-departed")
            }
        }
    }

    /// Parses a host-style event name. Relation payload is only kept for `changed` events.
    pub fn from_name(name: &str, relation_id: u32, data: RelationData) -> Result<Self, UnknownEvent> {
        if name == "config-changed" {
            return Ok(HookEvent::ConfigChanged);
        }
        if name == format!("{ENGINE_CONTAINER_NAME}-workload-ready") {
            return Ok(HookEvent::WorkloadReady);
        }

        let unknown = || UnknownEvent(name.to_string());
        let (relation, suffix) = name.rsplit_once("-relation-").ok_or_else(unknown)?;
        let relation = relation.parse::<RelationName>().map_err(|_| unknown())?;
        match suffix {
            "joined" => Ok(HookEvent::RelationJoined {
                relation,
                relation_id,
            }),
            "changed" => Ok(HookEvent::RelationChanged {
                relation,
                relation_id,
                data,
            }),
            "departed" => Ok(HookEvent::RelationDeparted {
                relation,
                relation_id,
            }),
            _ => Err(unknown()),
        }
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

/// What the host should do with the event once the handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Flow {
    /// The event is fully handled.
    Continue,
    /// Redeliver the same event later.
    Defer,
}

impl Flow {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flow::Continue => "continue",
            Flow::Defer => "defer",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip() {
        let events = [
            HookEvent::ConfigChanged,
            HookEvent::WorkloadReady,
            HookEvent::RelationJoined {
                relation: RelationName::Studio,
                relation_id: 3,
            },
            HookEvent::RelationChanged {
                relation: RelationName::Identity,
                relation_id: 3,
                data: RelationData::new(),
            },
            HookEvent::RelationDeparted {
                relation: RelationName::Database,
                relation_id: 3,
            },
        ];
        for event in events {
            let parsed = HookEvent::from_name(&event.name(), 3, RelationData::new()).unwrap();
            assert_eq!(parsed, event);
        }
    }

    #[test]
    fn relation_names_with_dashes_parse() {
        let event =
            HookEvent::from_name("legend-engine-gitlab-relation-joined", 7, RelationData::new())
                .unwrap();
        assert_eq!(
            event.key(),
            EventKey::relation(EventKind::RelationJoined, RelationName::Identity)
        );
        assert_eq!(event.relation_id(), Some(7));
    }

    #[test]
    fn rejects_unknown_events() {
        for name in ["install", "legend-sdlc-relation-joined", "legend-db-relation-broken"] {
            assert!(HookEvent::from_name(name, 0, RelationData::new()).is_err());
        }
    }
}
