//! Credential records received over relations and the store that retains them.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Rejected attempt to build a partially populated credential record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("credential field '{field}' must not be empty")]
pub struct IncompleteCredentials {
    pub field: &'static str,
}

fn require(field: &'static str, value: String) -> Result<String, IncompleteCredentials> {
    if value.trim().is_empty() {
        Err(IncompleteCredentials { field })
    } else {
        Ok(value)
    }
}

/// Connection details for the Engine's MongoDB backend.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawDatabaseCredentials")]
pub struct DatabaseCredentials {
    uri: String,
    database: String,
}

#[derive(Deserialize)]
struct RawDatabaseCredentials {
    uri: String,
    database: String,
}

impl TryFrom<RawDatabaseCredentials> for DatabaseCredentials {
    type Error = IncompleteCredentials;

    fn try_from(raw: RawDatabaseCredentials) -> Result<Self, Self::Error> {
        Self::new(raw.uri, raw.database)
    }
}

impl DatabaseCredentials {
    pub fn new(
        uri: impl Into<String>,
        database: impl Into<String>,
    ) -> Result<Self, IncompleteCredentials> {
        Ok(Self {
            uri: require("uri", uri.into())?,
            database: require("database", database.into())?,
        })
    }

    pub fn uri(&self) -> &str {
        &self.uri
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}

impl fmt::Debug for DatabaseCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // The URI usually embeds a password.
        f.debug_struct("DatabaseCredentials")
            .field("uri", &"[REDACTED]")
            .field("database", &self.database)
            .finish()
    }
}

/// OAuth client registration handed over by the GitLab integrator.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawIdentityCredentials")]
pub struct IdentityCredentials {
    client_id: String,
    client_secret: String,
    openid_discovery_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    host_certificate_b64: Option<String>,
}

#[derive(Deserialize)]
struct RawIdentityCredentials {
    client_id: String,
    client_secret: String,
    openid_discovery_url: String,
    #[serde(default)]
    host_certificate_b64: Option<String>,
}

impl TryFrom<RawIdentityCredentials> for IdentityCredentials {
    type Error = IncompleteCredentials;

    fn try_from(raw: RawIdentityCredentials) -> Result<Self, Self::Error> {
        Self::new(
            raw.client_id,
            raw.client_secret,
            raw.openid_discovery_url,
            raw.host_certificate_b64,
        )
    }
}

impl IdentityCredentials {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        openid_discovery_url: impl Into<String>,
        host_certificate_b64: Option<String>,
    ) -> Result<Self, IncompleteCredentials> {
        Ok(Self {
            client_id: require("client_id", client_id.into())?,
            client_secret: require("client_secret", client_secret.into())?,
            openid_discovery_url: require("openid_discovery_url", openid_discovery_url.into())?,
            host_certificate_b64: host_certificate_b64.filter(|cert| !cert.trim().is_empty()),
        })
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn client_secret(&self) -> &str {
        &self.client_secret
    }

    pub fn openid_discovery_url(&self) -> &str {
        &self.openid_discovery_url
    }

    pub fn host_certificate_b64(&self) -> Option<&str> {
        self.host_certificate_b64.as_deref()
    }
}

impl fmt::Debug for IdentityCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IdentityCredentials")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("openid_discovery_url", &self.openid_discovery_url)
            .field("has_host_certificate", &self.host_certificate_b64.is_some())
            .finish()
    }
}

/// Last-known-good credentials for each upstream relation.
///
/// Each setter is the single writer for its field and fully overwrites the
/// previous value. Nothing ever clears a field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    database_credentials: Option<DatabaseCredentials>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    identity_credentials: Option<IdentityCredentials>,
}

impl CredentialStore {
    pub fn set_database_credentials(&mut self, credentials: DatabaseCredentials) {
        self.database_credentials = Some(credentials);
    }

    pub fn set_identity_credentials(&mut self, credentials: IdentityCredentials) {
        self.identity_credentials = Some(credentials);
    }

    pub fn database_credentials(&self) -> Option<&DatabaseCredentials> {
        self.database_credentials.as_ref()
    }

    pub fn identity_credentials(&self) -> Option<&IdentityCredentials> {
        self.identity_credentials.as_ref()
    }
}
