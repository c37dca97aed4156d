//! Test utilities for driving the dispatcher without a real workload container.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use legend_engine_operator::{
    config::AppConfig,
    events::HookEvent,
    reconciler::OperatorContext,
    relations::{RelationData, RelationName},
    workload::{ServiceLayer, Workload, WorkloadError},
};

/// Everything a [`RecordingWorkload`] was asked to do.
#[derive(Debug, Default)]
pub struct WorkloadLog {
    pub reachable: bool,
    pub fail_restart: bool,
    pub files: BTreeMap<String, Vec<u8>>,
    pub layers: Vec<String>,
    pub restarts: Vec<String>,
}

/// In-memory workload that records pushes, layers and restarts.
#[derive(Clone, Default)]
pub struct RecordingWorkload {
    log: Arc<Mutex<WorkloadLog>>,
}

impl RecordingWorkload {
    pub fn reachable() -> Self {
        let workload = Self::default();
        workload.log().reachable = true;
        workload
    }

    pub fn unreachable() -> Self {
        Self::default()
    }

    pub fn log(&self) -> MutexGuard<'_, WorkloadLog> {
        self.log
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
    }

    pub fn file(&self, path: &str) -> Option<Vec<u8>> {
        self.log().files.get(path).cloned()
    }

    pub fn config_json(&self) -> serde_json::Value {
        let bytes = self
            .file("/engine-config.json")
            .expect("engine config was pushed");
        serde_json::from_slice(&bytes).expect("engine config is valid JSON")
    }
}

#[async_trait]
impl Workload for RecordingWorkload {
    async fn can_connect(&self) -> bool {
        self.log().reachable
    }

    async fn add_layer(&self, label: &str, _layer: &ServiceLayer) -> Result<(), WorkloadError> {
        self.log().layers.push(label.to_string());
        Ok(())
    }

    async fn push(&self, path: &str, content: &[u8]) -> Result<(), WorkloadError> {
        let mut log = self.log();
        if !log.reachable {
            return Err(WorkloadError::NotReachable);
        }
        log.files.insert(path.to_string(), content.to_vec());
        Ok(())
    }

    async fn restart(&self, service: &str) -> Result<(), WorkloadError> {
        let mut log = self.log();
        if log.fail_restart {
            return Err(WorkloadError::RestartFailed {
                service: service.to_string(),
                details: "exit status: 1".to_string(),
            });
        }
        log.restarts.push(service.to_string());
        Ok(())
    }
}

pub fn context(config: &AppConfig, workload: &RecordingWorkload) -> OperatorContext {
    OperatorContext::from_config(config, Arc::new(workload.clone()))
}

pub fn bag(pairs: &[(&str, &str)]) -> RelationData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

pub fn changed(relation: RelationName, pairs: &[(&str, &str)]) -> HookEvent {
    HookEvent::RelationChanged {
        relation,
        relation_id: 1,
        data: bag(pairs),
    }
}

pub fn joined(relation: RelationName) -> HookEvent {
    HookEvent::RelationJoined {
        relation,
        relation_id: 1,
    }
}

pub fn database_data() -> Vec<(&'static str, &'static str)> {
    vec![("uri", "mongodb://db:27017"), ("database", "legend")]
}

pub fn identity_data() -> Vec<(&'static str, &'static str)> {
    vec![
        ("client_id", "engine-client"),
        ("client_secret", "engine-secret"),
        (
            "openid_discovery_url",
            "https://gitlab.example/.well-known/openid-configuration",
        ),
    ]
}
