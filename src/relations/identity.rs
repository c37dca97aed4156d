//! `legend-engine-gitlab` relation: GitLab OAuth client registration.

use url::Url;

use super::{RelationData, RelationDataError, non_empty};
use crate::models::IdentityCredentials;

pub const CLIENT_ID_KEY: &str = "client_id";
pub const CLIENT_SECRET_KEY: &str = "client_secret";
pub const OPENID_DISCOVERY_URL_KEY: &str = "openid_discovery_url";
pub const HOST_CERT_KEY: &str = "gitlab_host_cert_b64";
pub const REDIRECT_URIS_KEY: &str = "redirect_uris";

/// OAuth callback URLs the integrator must register for this unit.
pub fn redirect_uris(base_url: &str) -> Vec<String> {
    vec![format!("{base_url}/callback")]
}

/// Writes the redirect URIs into this unit's side of the relation as a JSON list.
pub fn publish_redirect_uris(
    bag: &mut RelationData,
    uris: &[String],
) -> Result<(), serde_json::Error> {
    bag.insert(REDIRECT_URIS_KEY.to_string(), serde_json::to_string(uris)?);
    Ok(())
}

/// Extracts the OAuth client registration published by the integrator.
///
/// `Ok(None)` means the integrator has not published everything yet; an error
/// means what it published cannot be used.
pub fn credentials_from_relation(
    data: &RelationData,
) -> Result<Option<IdentityCredentials>, RelationDataError> {
    let (Some(client_id), Some(client_secret), Some(discovery_url)) = (
        non_empty(data, CLIENT_ID_KEY),
        non_empty(data, CLIENT_SECRET_KEY),
        non_empty(data, OPENID_DISCOVERY_URL_KEY),
    ) else {
        return Ok(None);
    };

    let parsed = Url::parse(discovery_url)
        .map_err(|e| RelationDataError::new(OPENID_DISCOVERY_URL_KEY, e.to_string()))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(RelationDataError::new(
            OPENID_DISCOVERY_URL_KEY,
            format!("unsupported scheme '{}'", parsed.scheme()),
        ));
    }

    let host_cert = non_empty(data, HOST_CERT_KEY).map(str::to_string);
    IdentityCredentials::new(client_id, client_secret, discovery_url, host_cert)
        .map(Some)
        .map_err(|e| RelationDataError::new(e.field, e.to_string()))
}
