//! Configuration loading for the Legend Engine operator.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `LEGEND_ENGINE_`, producing a typed [`AppConfig`]. The Engine settings
//! surface (deployment mode, log levels, root path) travels inside the same
//! config so every dispatch sees the operator's current values.

pub mod settings;

use std::{collections::BTreeMap, env, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use settings::{
    EngineSettings, LogLevel, VALID_LOG_LEVELS, ValidatedSettings, ValidationFailure,
    validate_log_level,
};

const ENV_PREFIX: &str = "LEGEND_ENGINE_";

/// Operator configuration derived from `LEGEND_ENGINE_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    /// Where the unit state document lives between dispatches.
    #[serde(default = "default_state_path")]
    pub state_path: PathBuf,
    /// Host directory standing in for the workload container's filesystem root.
    #[serde(default = "default_workload_root")]
    pub workload_root: PathBuf,
    /// Shell command used to power-cycle the Engine service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub restart_command: Option<String>,
    /// Address this unit is reachable at from related applications.
    #[serde(default = "default_unit_address")]
    pub unit_address: String,
    #[serde(default = "default_app_name")]
    pub app_name: String,
    #[serde(default)]
    pub engine: EngineSettings,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            state_path: default_state_path(),
            workload_root: default_workload_root(),
            restart_command: None,
            unit_address: default_unit_address(),
            app_name: default_app_name(),
            engine: EngineSettings::default(),
        }
    }
}

impl AppConfig {
    /// Returns a redacted JSON representation (the restart command may embed secrets).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.restart_command.is_some() {
            config.restart_command = Some("[REDACTED]".to_string());
        }
        serde_json::to_string_pretty(&config)
    }

    /// Validates operator-level settings. Engine log levels are checked at
    /// reconcile time instead.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !matches!(self.log_format.as_str(), "json" | "pretty") {
            return Err(ConfigError::InvalidLogFormat {
                value: self.log_format.clone(),
            });
        }

        if self.unit_address.trim().is_empty() {
            return Err(ConfigError::MissingUnitAddress);
        }
        if self.unit_address.contains('/') || self.unit_address.contains(' ') {
            return Err(ConfigError::InvalidUnitAddress {
                value: self.unit_address.clone(),
            });
        }

        if !self.engine.root_path.starts_with('/') {
            return Err(ConfigError::InvalidRootPath {
                value: self.engine.root_path.clone(),
            });
        }

        if self.app_name.is_empty() {
            return Err(ConfigError::MissingAppName);
        }

        Ok(())
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_state_path() -> PathBuf {
    PathBuf::from(".legend-engine/state.json")
}

fn default_workload_root() -> PathBuf {
    PathBuf::from(".legend-engine/workload")
}

fn default_unit_address() -> String {
    "127.0.0.1".to_string()
}

fn default_app_name() -> String {
    "finos-legend-engine-k8s".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("log format must be 'json' or 'pretty', got '{value}'")]
    InvalidLogFormat { value: String },
    #[error("unit address is missing; set LEGEND_ENGINE_UNIT_ADDRESS")]
    MissingUnitAddress,
    #[error("invalid unit address '{value}'")]
    InvalidUnitAddress { value: String },
    #[error("root path must start with '/', got '{value}'")]
    InvalidRootPath { value: String },
    #[error("application name is missing; set LEGEND_ENGINE_APP_NAME")]
    MissingAppName,
}

/// Loads configuration using layered `.env` files and `LEGEND_ENGINE_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = take_non_empty(&mut layered, "PROFILE").unwrap_or(profile_hint);
        let log_level = take_non_empty(&mut layered, "LOG_LEVEL").unwrap_or_else(default_log_level);
        let log_format =
            take_non_empty(&mut layered, "LOG_FORMAT").unwrap_or_else(default_log_format);
        let state_path = take_non_empty(&mut layered, "STATE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(default_state_path);
        let workload_root = take_non_empty(&mut layered, "WORKLOAD_ROOT")
            .map(PathBuf::from)
            .unwrap_or_else(default_workload_root);
        let restart_command = take_non_empty(&mut layered, "RESTART_COMMAND");
        let unit_address =
            take_non_empty(&mut layered, "UNIT_ADDRESS").unwrap_or_else(default_unit_address);
        let app_name = take_non_empty(&mut layered, "APP_NAME").unwrap_or_else(default_app_name);

        let defaults = EngineSettings::default();
        // Log levels are passed through verbatim, trimming only. Validation happens
        // at reconcile time so a typo blocks the unit rather than the operator.
        let engine = EngineSettings {
            deployment_mode: take_non_empty(&mut layered, "DEPLOYMENT_MODE")
                .unwrap_or(defaults.deployment_mode),
            server_log_level: layered
                .remove("SERVER_LOGGING_LEVEL")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.server_log_level),
            pac4j_log_level: layered
                .remove("SERVER_PAC4J_LOGGING_LEVEL")
                .map(|v| v.trim().to_string())
                .unwrap_or(defaults.pac4j_log_level),
            root_path: take_non_empty(&mut layered, "ROOT_PATH").unwrap_or(defaults.root_path),
        };

        let config = AppConfig {
            profile,
            log_level,
            log_format,
            state_path,
            workload_root,
            restart_command,
            unit_address,
            app_name,
            engine,
        };

        config.validate()?;
        Ok(config)
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var(format!("{ENV_PREFIX}PROFILE"))
            .ok()
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn take_non_empty(values: &mut BTreeMap<String, String>, key: &str) -> Option<String> {
    values.remove(key).filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn rejects_unknown_log_format() {
        let config = AppConfig {
            log_format: "xml".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidLogFormat { .. })
        ));
    }

    #[test]
    fn rejects_relative_root_path() {
        let mut config = AppConfig::default();
        config.engine.root_path = "api".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidRootPath { .. })
        ));
    }

    #[test]
    fn invalid_engine_log_level_does_not_fail_validation() {
        let mut config = AppConfig::default();
        config.engine.server_log_level = "LOUD".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn redacts_restart_command() {
        let config = AppConfig {
            restart_command: Some("systemctl restart engine --token s3cr3t".to_string()),
            ..AppConfig::default()
        };
        let json = config.redacted_json().unwrap();
        assert!(json.contains("[REDACTED]"));
        assert!(!json.contains("s3cr3t"));
    }
}
