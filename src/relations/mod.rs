//! Relation bridges
//!
//! Translate the string-keyed data bags exchanged over relations into the
//! operator's typed records, and render the data this unit publishes.

pub mod database;
pub mod identity;
pub mod ingress;
pub mod studio;

use std::collections::BTreeMap;
use std::fmt;
use std::net::Ipv6Addr;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine_config::APPLICATION_CONNECTOR_PORT_HTTP;

/// A relation data bag: flat string keys to string values.
pub type RelationData = BTreeMap<String, String>;

/// Relations this operator takes part in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RelationName {
    /// MongoDB credentials provider.
    #[serde(rename = "legend-db")]
    Database,
    /// GitLab OAuth integrator.
    #[serde(rename = "legend-engine-gitlab")]
    Identity,
    /// Legend Studio, which consumes the Engine URL.
    #[serde(rename = "legend-engine")]
    Studio,
    #[serde(rename = "ingress")]
    Ingress,
}

impl RelationName {
    pub const ALL: [RelationName; 4] = [
        RelationName::Database,
        RelationName::Identity,
        RelationName::Studio,
        RelationName::Ingress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationName::Database => "legend-db",
            RelationName::Identity => "legend-engine-gitlab",
            RelationName::Studio => "legend-engine",
            RelationName::Ingress => "ingress",
        }
    }
}

impl fmt::Display for RelationName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown relation '{0}'")]
pub struct UnknownRelation(pub String);

impl FromStr for RelationName {
    type Err = UnknownRelation;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RelationName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| UnknownRelation(s.to_string()))
    }
}

/// Relation data that is present but cannot be used.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("malformed '{key}' in relation data: {details}")]
pub struct RelationDataError {
    pub key: String,
    pub details: String,
}

impl RelationDataError {
    pub fn new(key: impl Into<String>, details: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            details: details.into(),
        }
    }
}

/// Returns the trimmed value for `key`, treating blank values as missing.
pub(crate) fn non_empty<'a>(data: &'a RelationData, key: &str) -> Option<&'a str> {
    data.get(key).map(|v| v.trim()).filter(|v| !v.is_empty())
}

/// The plain-HTTP base URL this unit serves the Engine API on.
pub fn engine_service_url(unit_address: &str, root_path: &str) -> String {
    let host = if unit_address.parse::<Ipv6Addr>().is_ok() {
        format!("[{unit_address}]")
    } else {
        unit_address.to_string()
    };
    format!("http://{host}:{APPLICATION_CONNECTOR_PORT_HTTP}{root_path}")
}
