//! # Unit State Repository
//!
//! Persists the unit's state document between dispatches. Every dispatch loads
//! the document first and saves it again only after a handler mutated it.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::models::{CredentialStore, UnitStatus};

/// Everything the operator remembers about this unit across events.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitState {
    #[serde(default)]
    pub credentials: CredentialStore,
    /// Last status reported to the host, for display only. Reconciliation never reads it.
    #[serde(default)]
    pub status: UnitStatus,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read state from {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to write state to {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("state document {path} is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        source: serde_json::Error,
    },
    #[error("failed to encode state: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Load/save seam for the unit state document.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns the persisted state, or the initial state if nothing was saved yet.
    async fn load(&self) -> Result<UnitState, StoreError>;

    async fn save(&self, state: &UnitState) -> Result<(), StoreError>;
}

/// Stores the state as a JSON document on local disk.
pub struct JsonFileStateStore {
    path: PathBuf,
}

impl JsonFileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl StateStore for JsonFileStateStore {
    async fn load(&self) -> Result<UnitState, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                debug!(path = %self.path.display(), "No persisted state; starting fresh");
                return Ok(UnitState::default());
            }
            Err(source) => {
                return Err(StoreError::Read {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        serde_json::from_slice(&bytes).map_err(|source| StoreError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    async fn save(&self, state: &UnitState) -> Result<(), StoreError> {
        let encoded = serde_json::to_vec_pretty(state)?;
        let write_err = |source| StoreError::Write {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(write_err)?;
        }

        // Write-then-rename so a crash never leaves a truncated document behind.
        let temp = self.temp_path();
        tokio::fs::write(&temp, &encoded).await.map_err(write_err)?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(write_err)?;

        debug!(path = %self.path.display(), "Persisted unit state");
        Ok(())
    }
}

/// In-memory store; clones share the same underlying state.
#[derive(Clone, Default)]
pub struct MemoryStateStore {
    inner: Arc<Mutex<Option<UnitState>>>,
    saves: Arc<Mutex<usize>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_state(state: UnitState) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Some(state))),
            saves: Arc::default(),
        }
    }

    /// The last saved state, if any.
    pub fn snapshot(&self) -> Option<UnitState> {
        self.inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner())
            .clone()
    }

    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|poison| poison.into_inner())
    }
}

#[async_trait]
impl StateStore for MemoryStateStore {
    async fn load(&self) -> Result<UnitState, StoreError> {
        Ok(self.snapshot().unwrap_or_default())
    }

    async fn save(&self, state: &UnitState) -> Result<(), StoreError> {
        *self
            .inner
            .lock()
            .unwrap_or_else(|poison| poison.into_inner()) = Some(state.clone());
        *self.saves.lock().unwrap_or_else(|poison| poison.into_inner()) += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::DatabaseCredentials;
    use tempfile::TempDir;

    #[tokio::test]
    async fn missing_file_loads_initial_state() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStateStore::new(dir.path().join("state.json"));

        let state = store.load().await.unwrap();
        assert_eq!(state, UnitState::default());
        assert_eq!(state.status, UnitStatus::blocked("awaiting relations"));
    }

    #[tokio::test]
    async fn saved_state_survives_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("state.json");
        let store = JsonFileStateStore::new(&path);

        let mut state = UnitState::default();
        state.credentials.set_database_credentials(
            DatabaseCredentials::new("mongodb://db:27017", "legend").unwrap(),
        );
        state.status = UnitStatus::Active;
        store.save(&state).await.unwrap();

        let reloaded = JsonFileStateStore::new(&path).load().await.unwrap();
        assert_eq!(reloaded, state);
        assert!(!dir.path().join("nested").join("state.json.tmp").exists());
    }

    #[tokio::test]
    async fn corrupt_file_is_reported() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json").unwrap();

        let err = JsonFileStateStore::new(&path).load().await.unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { .. }));
    }

    #[tokio::test]
    async fn memory_store_counts_saves() {
        let store = MemoryStateStore::new();
        assert!(store.snapshot().is_none());
        store.save(&UnitState::default()).await.unwrap();
        assert_eq!(store.save_count(), 1);
        assert_eq!(store.load().await.unwrap(), UnitState::default());
    }
}
