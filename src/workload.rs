//! Workload container access
//!
//! The operator never runs the Engine itself. It talks to whatever supervises
//! the Engine container through the [`Workload`] trait: push files into the
//! container filesystem, register the service layer, and power-cycle the service.

use std::collections::BTreeMap;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use crate::truststore::TRUSTSTORE_PASSPHRASE;

pub const ENGINE_CONTAINER_NAME: &str = "engine";
pub const ENGINE_SERVICE_NAME: &str = "engine";
pub const ENGINE_CONFIG_FILE_CONTAINER_LOCAL_PATH: &str = "/engine-config.json";
pub const TRUSTSTORE_CONTAINER_LOCAL_PATH: &str = "/truststore.jks";

const SUPERVISOR_DIR: &str = ".supervisor";

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("workload container is not reachable")]
    NotReachable,
    #[error("invalid container path '{0}'")]
    InvalidPath(String),
    #[error("failed to write '{path}': {source}")]
    Write {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to encode service layer: {0}")]
    Layer(#[from] serde_json::Error),
    #[error("restart of service '{service}' failed: {details}")]
    RestartFailed { service: String, details: String },
}

/// A supervisor layer describing how to run services in the container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceLayer {
    pub summary: String,
    pub description: String,
    pub services: BTreeMap<String, ServiceSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceSpec {
    #[serde(rename = "override")]
    pub override_mode: String,
    pub summary: String,
    pub command: String,
    pub startup: String,
    pub environment: BTreeMap<String, String>,
}

impl ServiceLayer {
    /// The Engine service layer. Startup is disabled: the Engine needs a complete
    /// config file, which only exists once both upstream relations are in place.
    pub fn engine() -> Self {
        let command = format!(
            "/bin/sh -c 'java -XX:+ExitOnOutOfMemoryError -Xss4M \
             -XX:MaxRAMPercentage=60 -Dfile.encoding=UTF8 \
             -Djavax.net.ssl.trustStore=\"{}\" \
             -Djavax.net.ssl.trustStorePassword=\"{}\" \
             -cp /app/bin/*-shaded.jar org.finos.legend.engine.server.Server server {}'",
            TRUSTSTORE_CONTAINER_LOCAL_PATH,
            TRUSTSTORE_PASSPHRASE,
            ENGINE_CONFIG_FILE_CONTAINER_LOCAL_PATH
        );

        let service = ServiceSpec {
            override_mode: "replace".to_string(),
            summary: ENGINE_SERVICE_NAME.to_string(),
            command,
            startup: "disabled".to_string(),
            environment: BTreeMap::new(),
        };

        Self {
            summary: "Engine layer.".to_string(),
            description: "Supervisor config layer for FINOS Legend Engine Server.".to_string(),
            services: BTreeMap::from([(ENGINE_SERVICE_NAME.to_string(), service)]),
        }
    }
}

/// Operations the operator needs from the workload container.
#[async_trait]
pub trait Workload: Send + Sync {
    /// Whether the container's supervisor currently accepts requests.
    async fn can_connect(&self) -> bool;

    /// Registers (or replaces) a named service layer.
    async fn add_layer(&self, label: &str, layer: &ServiceLayer) -> Result<(), WorkloadError>;

    /// Writes `content` at the absolute container `path`, creating parent
    /// directories and replacing any existing file.
    async fn push(&self, path: &str, content: &[u8]) -> Result<(), WorkloadError>;

    /// Stops then starts the named service.
    async fn restart(&self, service: &str) -> Result<(), WorkloadError>;
}

/// A workload whose container filesystem is a directory on this host.
///
/// Restarts run `restart_command` through `sh -c` with `SERVICE_NAME` set; without
/// a command the restart is recorded in a counter file under `.supervisor/`.
pub struct LocalWorkload {
    root: PathBuf,
    restart_command: Option<String>,
}

impl LocalWorkload {
    pub fn new(root: impl Into<PathBuf>, restart_command: Option<String>) -> Self {
        Self {
            root: root.into(),
            restart_command,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Maps an absolute container path onto the host root, refusing escapes.
    pub fn host_path(&self, container_path: &str) -> Result<PathBuf, WorkloadError> {
        let relative = Path::new(container_path.trim_start_matches('/'));
        let escapes = relative.components().any(|c| {
            matches!(
                c,
                Component::ParentDir | Component::RootDir | Component::Prefix(_)
            )
        });
        if relative.as_os_str().is_empty() || escapes {
            return Err(WorkloadError::InvalidPath(container_path.to_string()));
        }
        Ok(self.root.join(relative))
    }

    pub fn restart_counter_path(&self, service: &str) -> PathBuf {
        self.root
            .join(SUPERVISOR_DIR)
            .join(format!("{service}.restarts"))
    }

    async fn write_file(&self, path: &Path, content: &[u8]) -> Result<(), WorkloadError> {
        let write_err = |source| WorkloadError::Write {
            path: path.display().to_string(),
            source,
        };
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }
        tokio::fs::write(path, content).await.map_err(write_err)
    }
}

#[async_trait]
impl Workload for LocalWorkload {
    async fn can_connect(&self) -> bool {
        tokio::fs::metadata(&self.root)
            .await
            .map(|meta| meta.is_dir())
            .unwrap_or(false)
    }

    async fn add_layer(&self, label: &str, layer: &ServiceLayer) -> Result<(), WorkloadError> {
        let path = self
            .root
            .join(SUPERVISOR_DIR)
            .join("layers")
            .join(format!("{label}.json"));
        let encoded = serde_json::to_vec_pretty(layer)?;
        self.write_file(&path, &encoded).await?;
        debug!(label, path = %path.display(), "Registered service layer");
        Ok(())
    }

    async fn push(&self, path: &str, content: &[u8]) -> Result<(), WorkloadError> {
        if !self.can_connect().await {
            return Err(WorkloadError::NotReachable);
        }
        let host_path = self.host_path(path)?;
        self.write_file(&host_path, content).await
    }

    async fn restart(&self, service: &str) -> Result<(), WorkloadError> {
        if let Some(command) = &self.restart_command {
            let output = tokio::process::Command::new("sh")
                .arg("-c")
                .arg(command)
                .env("SERVICE_NAME", service)
                .output()
                .await
                .map_err(|e| WorkloadError::RestartFailed {
                    service: service.to_string(),
                    details: e.to_string(),
                })?;
            if !output.status.success() {
                return Err(WorkloadError::RestartFailed {
                    service: service.to_string(),
                    details: format!(
                        "{}: {}",
                        output.status,
                        String::from_utf8_lossy(&output.stderr).trim()
                    ),
                });
            }
            info!(service, "Restart command completed");
            return Ok(());
        }

        let counter = self.restart_counter_path(service);
        let previous = match tokio::fs::read_to_string(&counter).await {
            Ok(raw) => raw.trim().parse::<u64>().unwrap_or(0),
            Err(_) => 0,
        };
        self.write_file(&counter, (previous + 1).to_string().as_bytes())
            .await?;
        info!(service, restarts = previous + 1, "Recorded service restart");
        Ok(())
    }
}
