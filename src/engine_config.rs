//! Engine configuration synthesis.
//!
//! Combines validated settings with the stored relation credentials into the
//! single JSON document the Engine server reads at startup. The document shape
//! is owned by the Engine; only the fields below are produced here.

use std::collections::BTreeMap;

use serde::Serialize;
use thiserror::Error;

use crate::config::{EngineSettings, ValidatedSettings, ValidationFailure};
use crate::models::{DatabaseCredentials, IdentityCredentials};

pub const APPLICATION_CONNECTOR_TYPE_HTTP: &str = "http";
pub const APPLICATION_CONNECTOR_PORT_HTTP: u16 = 6060;
pub const APPLICATION_LOGGING_FORMAT: &str = "%d{yyyy-MM-dd HH:mm:ss.SSS} %-5p [%thread] %c - %m%n";
pub const GITLAB_REQUIRED_SCOPES: [&str; 3] = ["openid", "profile", "api"];
pub const GITLAB_CLIENT_CLASS: &str = "org.finos.legend.server.pac4j.gitlab.GitlabClient";
const PAC4J_LOGGER: &str = "org.pac4j";
const ROOT_LOGGER: &str = "root";
const MAX_REQUEST_HEADER_SIZE: &str = "32KiB";
const METADATA_SERVER_HOST: &str = "127.0.0.1";
const METADATA_SERVER_PORT: u16 = 8090;
/// Served under `/api` regardless of the configured root path.
const INFO_BYPASS_PATH: &str = "/api/server/v1/info";

/// Why a configuration document cannot be produced yet.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadinessFailure {
    /// Neither upstream relation has supplied credentials.
    #[error("awaiting relations")]
    AwaitingRelations,
    #[error("awaiting database relation")]
    AwaitingDatabase,
    #[error("awaiting identity relation")]
    AwaitingIdentity,
    #[error("invalid logging configuration")]
    InvalidLogging(#[source] ValidationFailure),
}

impl ReadinessFailure {
    pub fn reason(&self) -> String {
        self.to_string()
    }
}

/// The Engine server configuration document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    pub deployment: Deployment,
    pub logging: Logging,
    pub pac4j: Pac4j,
    pub opentracing: OpenTracing,
    pub swagger: Swagger,
    pub server: Server,
    pub metadataserver: MetadataServer,
    pub vaults: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Deployment {
    pub mode: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Logging {
    pub level: String,
    pub loggers: BTreeMap<String, LoggerLevel>,
    pub appenders: Vec<Appender>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LoggerLevel {
    pub level: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Appender {
    #[serde(rename = "type")]
    pub kind: String,
    pub log_format: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pac4j {
    pub callback_prefix: String,
    pub mongo_uri: String,
    pub mongo_db: String,
    pub bypass_paths: Vec<String>,
    pub clients: Vec<Pac4jClient>,
    pub mongo_session: MongoSession,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Pac4jClient {
    #[serde(rename = "org.finos.legend.server.pac4j.gitlab.GitlabClient")]
    pub gitlab: GitlabClient,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GitlabClient {
    pub name: String,
    pub client_id: String,
    pub secret: String,
    pub discovery_uri: String,
    /// Space separated, as the pac4j client expects.
    pub scope: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MongoSession {
    pub enabled: bool,
    pub collection: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct OpenTracing {
    pub elastic: String,
    pub zipkin: String,
    pub uri: String,
    pub authenticator: TracingAuthenticator,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TracingAuthenticator {
    pub principal: String,
    pub keytab: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Swagger {
    pub title: String,
    pub resource_package: String,
    pub uri_prefix: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    #[serde(rename = "type")]
    pub kind: String,
    pub application_context_path: String,
    pub admin_context_path: String,
    pub request_log: RequestLog,
    pub connector: Connector,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RequestLog {
    pub appenders: Vec<Appender>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Connector {
    pub max_request_header_size: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub port: u16,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataServer {
    pub pure: MetadataEndpoint,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetadataEndpoint {
    pub host: String,
    pub port: u16,
}

impl EngineConfig {
    /// Renders the document as compact JSON. Field order follows the struct
    /// definitions and maps are sorted, so equal configs render equal bytes.
    pub fn to_json_bytes(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }

    fn build(
        settings: &ValidatedSettings,
        db: &DatabaseCredentials,
        identity: &IdentityCredentials,
    ) -> Self {
        let server_level = settings.server_log_level.as_str().to_string();
        let loggers = BTreeMap::from([
            (
                ROOT_LOGGER.to_string(),
                LoggerLevel {
                    level: server_level.clone(),
                },
            ),
            (
                PAC4J_LOGGER.to_string(),
                LoggerLevel {
                    level: settings.pac4j_log_level.as_str().to_string(),
                },
            ),
        ]);

        EngineConfig {
            deployment: Deployment {
                mode: settings.deployment_mode.clone(),
            },
            logging: Logging {
                level: server_level,
                loggers,
                appenders: vec![Appender {
                    kind: "console".to_string(),
                    log_format: APPLICATION_LOGGING_FORMAT.to_string(),
                }],
            },
            pac4j: Pac4j {
                callback_prefix: String::new(),
                mongo_uri: db.uri().to_string(),
                mongo_db: db.database().to_string(),
                bypass_paths: vec![INFO_BYPASS_PATH.to_string()],
                clients: vec![Pac4jClient {
                    gitlab: GitlabClient {
                        name: "gitlab".to_string(),
                        client_id: identity.client_id().to_string(),
                        secret: identity.client_secret().to_string(),
                        discovery_uri: identity.openid_discovery_url().to_string(),
                        scope: GITLAB_REQUIRED_SCOPES.join(" "),
                    },
                }],
                mongo_session: MongoSession {
                    enabled: true,
                    collection: "userSessions".to_string(),
                },
            },
            opentracing: OpenTracing::default(),
            swagger: Swagger {
                title: "Legend Engine".to_string(),
                resource_package: "org.finos.legend".to_string(),
                uri_prefix: settings.root_path.clone(),
            },
            server: Server {
                kind: "simple".to_string(),
                application_context_path: "/".to_string(),
                admin_context_path: "/admin".to_string(),
                request_log: RequestLog::default(),
                connector: Connector {
                    max_request_header_size: MAX_REQUEST_HEADER_SIZE.to_string(),
                    kind: APPLICATION_CONNECTOR_TYPE_HTTP.to_string(),
                    port: APPLICATION_CONNECTOR_PORT_HTTP,
                },
            },
            metadataserver: MetadataServer {
                pure: MetadataEndpoint {
                    host: METADATA_SERVER_HOST.to_string(),
                    port: METADATA_SERVER_PORT,
                },
            },
            vaults: Vec::new(),
        }
    }
}

/// Builds the Engine configuration, or reports the first unmet precondition.
///
/// Checked in order: database credentials, identity credentials, log levels.
pub fn synthesize(
    settings: &EngineSettings,
    db: Option<&DatabaseCredentials>,
    identity: Option<&IdentityCredentials>,
) -> Result<EngineConfig, ReadinessFailure> {
    let db = match (db, identity) {
        (None, None) => return Err(ReadinessFailure::AwaitingRelations),
        (None, Some(_)) => return Err(ReadinessFailure::AwaitingDatabase),
        (Some(db), _) => db,
    };
    let identity = identity.ok_or(ReadinessFailure::AwaitingIdentity)?;
    let validated = settings
        .validate()
        .map_err(ReadinessFailure::InvalidLogging)?;

    Ok(EngineConfig::build(&validated, db, identity))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(server: &str, pac4j: &str) -> EngineSettings {
        EngineSettings {
            server_log_level: server.to_string(),
            pac4j_log_level: pac4j.to_string(),
            ..EngineSettings::default()
        }
    }

    fn db() -> DatabaseCredentials {
        DatabaseCredentials::new("mongodb://db:27017", "legend").unwrap()
    }

    fn identity() -> IdentityCredentials {
        IdentityCredentials::new(
            "engine-client",
            "engine-secret",
            "https://gitlab.example.com/.well-known/openid-configuration",
            None,
        )
        .unwrap()
    }

    #[test]
    fn missing_credentials_short_circuit() {
        let s = settings("INFO", "INFO");
        assert_eq!(
            synthesize(&s, None, None).unwrap_err(),
            ReadinessFailure::AwaitingRelations
        );
        assert_eq!(
            synthesize(&s, None, Some(&identity())).unwrap_err(),
            ReadinessFailure::AwaitingDatabase
        );
        assert_eq!(
            synthesize(&s, Some(&db()), None).unwrap_err(),
            ReadinessFailure::AwaitingIdentity
        );
    }

    #[test]
    fn missing_credentials_win_over_bad_log_levels() {
        let s = settings("LOUD", "INFO");
        assert_eq!(
            synthesize(&s, Some(&db()), None).unwrap_err().reason(),
            "awaiting identity relation"
        );
    }

    #[test]
    fn invalid_log_level_blocks_synthesis() {
        let err = synthesize(&settings("INFO", "chatty"), Some(&db()), Some(&identity()))
            .unwrap_err();
        assert_eq!(err.reason(), "invalid logging configuration");
        match err {
            ReadinessFailure::InvalidLogging(failure) => {
                assert_eq!(failure.provided_value, "chatty")
            }
            other => panic!("unexpected failure: {other:?}"),
        }
    }

    #[test]
    fn renders_expected_document() {
        let config =
            synthesize(&settings("DEBUG", "WARN"), Some(&db()), Some(&identity())).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&config.to_json_bytes().unwrap()).unwrap();

        assert_eq!(json["deployment"]["mode"], "TEST_IGNORE_FUNCTION_MATCH");
        assert_eq!(json["logging"]["level"], "DEBUG");
        assert_eq!(json["logging"]["loggers"]["root"]["level"], "DEBUG");
        assert_eq!(json["logging"]["loggers"]["org.pac4j"]["level"], "WARN");
        assert_eq!(json["logging"]["appenders"][0]["type"], "console");
        assert_eq!(json["pac4j"]["mongoUri"], "mongodb://db:27017");
        assert_eq!(json["pac4j"]["mongoDb"], "legend");
        assert_eq!(json["pac4j"]["bypassPaths"][0], "/api/server/v1/info");
        assert_eq!(json["pac4j"]["mongoSession"]["enabled"], true);
        let client = &json["pac4j"]["clients"][0][GITLAB_CLIENT_CLASS];
        assert_eq!(client["clientId"], "engine-client");
        assert_eq!(client["secret"], "engine-secret");
        assert_eq!(client["scope"], "openid profile api");
        assert_eq!(json["opentracing"]["authenticator"]["keytab"], "");
        assert_eq!(json["swagger"]["uriPrefix"], "/api");
        assert_eq!(json["server"]["connector"]["port"], 6060);
        assert_eq!(json["server"]["connector"]["maxRequestHeaderSize"], "32KiB");
        assert_eq!(json["server"]["requestLog"]["appenders"], serde_json::json!([]));
        assert_eq!(json["metadataserver"]["pure"]["port"], 8090);
        assert_eq!(json["vaults"], serde_json::json!([]));
    }

    #[test]
    fn info_bypass_path_ignores_root_path() {
        let custom = EngineSettings {
            root_path: "/engine".to_string(),
            ..settings("INFO", "INFO")
        };
        let config = synthesize(&custom, Some(&db()), Some(&identity())).unwrap();
        let json: serde_json::Value =
            serde_json::from_slice(&config.to_json_bytes().unwrap()).unwrap();

        assert_eq!(
            json["pac4j"]["bypassPaths"],
            serde_json::json!(["/api/server/v1/info"])
        );
        assert_eq!(json["swagger"]["uriPrefix"], "/engine");
    }

    #[test]
    fn identical_inputs_render_identical_bytes() {
        let s = settings("TRACE", "OFF");
        let first = synthesize(&s, Some(&db()), Some(&identity())).unwrap();
        let second = synthesize(&s, Some(&db()), Some(&identity())).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            first.to_json_bytes().unwrap(),
            second.to_json_bytes().unwrap()
        );
    }
}
