//! Engine settings surface and its validation.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Java logging levels the Engine accepts.
pub const VALID_LOG_LEVELS: [&str; 5] = ["INFO", "WARN", "DEBUG", "TRACE", "OFF"];

pub const SERVER_LOGGING_LEVEL: &str = "server-logging-level";
pub const SERVER_PAC4J_LOGGING_LEVEL: &str = "server-pac4j-logging-level";

/// A validated Engine log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Warn,
    Debug,
    Trace,
    Off,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Debug => "DEBUG",
            LogLevel::Trace => "TRACE",
            LogLevel::Off => "OFF",
        }
    }

    fn from_allowed(value: &str) -> Option<Self> {
        match value {
            "INFO" => Some(LogLevel::Info),
            "WARN" => Some(LogLevel::Warn),
            "DEBUG" => Some(LogLevel::Debug),
            "TRACE" => Some(LogLevel::Trace),
            "OFF" => Some(LogLevel::Off),
            _ => None,
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A setting value outside its allow-list.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{provided_value}' for '{setting_name}', expected one of {allowed_values:?}")]
pub struct ValidationFailure {
    pub setting_name: String,
    pub provided_value: String,
    pub allowed_values: Vec<String>,
}

/// Checks `value` against the Java logging allow-list. Matching is exact.
pub fn validate_log_level(name: &str, value: &str) -> Result<LogLevel, ValidationFailure> {
    LogLevel::from_allowed(value).ok_or_else(|| {
        warn!(
            setting = name,
            value,
            "Invalid Java logging level; the unit shall block until a valid value is set"
        );
        ValidationFailure {
            setting_name: name.to_string(),
            provided_value: value.to_string(),
            allowed_values: VALID_LOG_LEVELS.iter().map(|s| s.to_string()).collect(),
        }
    })
}

/// Operator-facing settings that shape the Engine configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct EngineSettings {
    #[serde(default = "default_deployment_mode")]
    pub deployment_mode: String,
    #[serde(default = "default_engine_log_level")]
    pub server_log_level: String,
    #[serde(default = "default_engine_log_level")]
    pub pac4j_log_level: String,
    #[serde(default = "default_root_path")]
    pub root_path: String,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            deployment_mode: default_deployment_mode(),
            server_log_level: default_engine_log_level(),
            pac4j_log_level: default_engine_log_level(),
            root_path: default_root_path(),
        }
    }
}

/// Settings after allow-list checks, recomputed on every reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedSettings {
    pub deployment_mode: String,
    pub server_log_level: LogLevel,
    pub pac4j_log_level: LogLevel,
    pub root_path: String,
}

impl EngineSettings {
    /// Validate both log levels; the first invalid one is reported.
    pub fn validate(&self) -> Result<ValidatedSettings, ValidationFailure> {
        let pac4j_log_level = validate_log_level(SERVER_PAC4J_LOGGING_LEVEL, &self.pac4j_log_level)?;
        let server_log_level = validate_log_level(SERVER_LOGGING_LEVEL, &self.server_log_level)?;

        Ok(ValidatedSettings {
            deployment_mode: self.deployment_mode.clone(),
            server_log_level,
            pac4j_log_level,
            root_path: self.root_path.clone(),
        })
    }
}

fn default_deployment_mode() -> String {
    "TEST_IGNORE_FUNCTION_MATCH".to_string()
}

fn default_engine_log_level() -> String {
    "INFO".to_string()
}

fn default_root_path() -> String {
    "/api".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_every_allowed_level() {
        for level in VALID_LOG_LEVELS {
            let parsed = validate_log_level(SERVER_LOGGING_LEVEL, level).unwrap();
            assert_eq!(parsed.as_str(), level);
        }
    }

    #[test]
    fn rejects_lowercase_and_unknown_levels() {
        for value in ["debug", "VERBOSE", "", " INFO"] {
            let failure = validate_log_level(SERVER_LOGGING_LEVEL, value).unwrap_err();
            assert_eq!(failure.setting_name, SERVER_LOGGING_LEVEL);
            assert_eq!(failure.provided_value, value);
            assert_eq!(failure.allowed_values.len(), 5);
        }
    }

    #[test]
    fn validate_reports_pac4j_level_first() {
        let settings = EngineSettings {
            server_log_level: "NOPE".to_string(),
            pac4j_log_level: "ALSO_NOPE".to_string(),
            ..EngineSettings::default()
        };
        let failure = settings.validate().unwrap_err();
        assert_eq!(failure.setting_name, SERVER_PAC4J_LOGGING_LEVEL);
    }

    #[test]
    fn validate_passes_through_mode_and_root_path() {
        let settings = EngineSettings {
            deployment_mode: "PROD".to_string(),
            server_log_level: "DEBUG".to_string(),
            pac4j_log_level: "WARN".to_string(),
            root_path: "/engine".to_string(),
        };
        let validated = settings.validate().unwrap();
        assert_eq!(validated.deployment_mode, "PROD");
        assert_eq!(validated.server_log_level, LogLevel::Debug);
        assert_eq!(validated.pac4j_log_level, LogLevel::Warn);
        assert_eq!(validated.root_path, "/engine");
    }
}
