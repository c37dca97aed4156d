//! `legend-db` relation: MongoDB credentials.
//!
//! Providers publish either the normalized `{uri, database}` pair or the
//! MongoDB charm shape `{username, password, replica_set_uri, databases}`.

use tracing::debug;

use super::{RelationData, RelationDataError, non_empty};
use crate::models::DatabaseCredentials;

pub const URI_KEY: &str = "uri";
pub const DATABASE_KEY: &str = "database";
pub const USERNAME_KEY: &str = "username";
pub const PASSWORD_KEY: &str = "password";
pub const REPLICA_SET_URI_KEY: &str = "replica_set_uri";
pub const DATABASES_KEY: &str = "databases";

const MONGODB_SCHEMES: [&str; 2] = ["mongodb://", "mongodb+srv://"];

/// Extracts database credentials from provider data.
///
/// `Ok(None)` means the provider has not published everything yet.
pub fn credentials_from_relation(
    data: &RelationData,
) -> Result<Option<DatabaseCredentials>, RelationDataError> {
    if let (Some(uri), Some(database)) = (non_empty(data, URI_KEY), non_empty(data, DATABASE_KEY))
    {
        return DatabaseCredentials::new(uri, database)
            .map(Some)
            .map_err(|e| RelationDataError::new(e.field, e.to_string()));
    }

    let (Some(username), Some(password), Some(replica_set_uri)) = (
        non_empty(data, USERNAME_KEY),
        non_empty(data, PASSWORD_KEY),
        non_empty(data, REPLICA_SET_URI_KEY),
    ) else {
        debug!("Database relation data is incomplete");
        return Ok(None);
    };

    let databases: Vec<String> = match non_empty(data, DATABASES_KEY) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| RelationDataError::new(DATABASES_KEY, e.to_string()))?,
        None => Vec::new(),
    };
    let Some(database) = databases.into_iter().find(|db| !db.trim().is_empty()) else {
        debug!("Database relation has credentials but no database yet");
        return Ok(None);
    };

    let uri = with_userinfo(replica_set_uri, username, password)?;
    DatabaseCredentials::new(uri, database)
        .map(Some)
        .map_err(|e| RelationDataError::new(e.field, e.to_string()))
}

/// Inserts percent-encoded credentials into a MongoDB connection string,
/// leaving URIs that already carry credentials untouched.
fn with_userinfo(uri: &str, username: &str, password: &str) -> Result<String, RelationDataError> {
    let (scheme, rest) = MONGODB_SCHEMES
        .iter()
        .find_map(|scheme| uri.strip_prefix(scheme).map(|rest| (*scheme, rest)))
        .ok_or_else(|| {
            RelationDataError::new(REPLICA_SET_URI_KEY, "expected a mongodb:// connection string")
        })?;

    let authority = rest.split(['/', '?']).next().unwrap_or_default();
    if authority.is_empty() {
        return Err(RelationDataError::new(
            REPLICA_SET_URI_KEY,
            "connection string has no hosts",
        ));
    }
    if authority.contains('@') {
        return Ok(uri.to_string());
    }

    Ok(format!(
        "{scheme}{}:{}@{rest}",
        urlencoding::encode(username),
        urlencoding::encode(password)
    ))
}
