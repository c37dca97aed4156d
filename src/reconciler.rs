//! # Reconciler
//!
//! Drives the Engine workload toward the state implied by the stored
//! credentials and the current settings. Every failure ends in a unit status
//! rather than an error: the host only ever sees Active, Waiting or Blocked.

use std::sync::Arc;

use metrics::counter;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, EngineSettings};
use crate::engine_config::synthesize;
use crate::error::ReconcileError;
use crate::models::{CredentialStore, UnitStatus};
use crate::relations::{RelationData, engine_service_url};
use crate::repositories::UnitState;
use crate::telemetry::{current_event, current_relation_id};
use crate::truststore::{
    TRUSTSTORE_NAME, TRUSTSTORE_PASSPHRASE, certificate_fingerprint, decode_certificate,
    encode_truststore,
};
use crate::workload::{
    ENGINE_CONFIG_FILE_CONTAINER_LOCAL_PATH, ENGINE_CONTAINER_NAME, ENGINE_SERVICE_NAME,
    ServiceLayer, TRUSTSTORE_CONTAINER_LOCAL_PATH, Workload,
};

/// Per-invocation inputs that do not come from the state document.
#[derive(Clone)]
pub struct OperatorContext {
    pub settings: EngineSettings,
    pub unit_address: String,
    pub app_name: String,
    pub workload: Arc<dyn Workload>,
}

impl OperatorContext {
    pub fn from_config(config: &AppConfig, workload: Arc<dyn Workload>) -> Self {
        Self {
            settings: config.engine.clone(),
            unit_address: config.unit_address.clone(),
            app_name: config.app_name.clone(),
            workload,
        }
    }
}

/// The operator as seen by a single event handler: the loaded state plus
/// whatever this unit publishes on the relation being handled.
pub struct EngineOperator {
    context: OperatorContext,
    state: UnitState,
    published: RelationData,
}

impl EngineOperator {
    pub fn new(context: OperatorContext, state: UnitState) -> Self {
        Self {
            context,
            state,
            published: RelationData::new(),
        }
    }

    pub fn app_name(&self) -> &str {
        &self.context.app_name
    }

    pub fn workload(&self) -> &dyn Workload {
        self.context.workload.as_ref()
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.state.credentials
    }

    pub fn credentials_mut(&mut self) -> &mut CredentialStore {
        &mut self.state.credentials
    }

    pub fn status(&self) -> &UnitStatus {
        &self.state.status
    }

    pub fn set_status(&mut self, status: UnitStatus) {
        if self.state.status != status {
            info!(status = %status, "Unit status changed");
        }
        self.state.status = status;
    }

    /// Base URL of the Engine API served by this unit.
    pub fn service_url(&self) -> String {
        engine_service_url(&self.context.unit_address, &self.context.settings.root_path)
    }

    /// This unit's side of the relation bag for the current event.
    pub fn published_mut(&mut self) -> &mut RelationData {
        &mut self.published
    }

    pub fn into_parts(self) -> (UnitState, RelationData) {
        (self.state, self.published)
    }

    /// Installs the Engine service definition in the workload supervisor.
    pub async fn install_service_layer(&self) -> Result<(), ReconcileError> {
        let layer = ServiceLayer::engine();
        self.workload()
            .add_layer(ENGINE_CONTAINER_NAME, &layer)
            .await?;
        debug!(label = ENGINE_CONTAINER_NAME, "Service layer added");
        Ok(())
    }

    /// Attempts one full reconciliation and records the resulting status.
    pub async fn reconcile(&mut self) -> UnitStatus {
        let status = match self.apply().await {
            Ok(()) => {
                counter!("operator_reconcile_total", "outcome" => "active").increment(1);
                info!("Engine configured and restarted");
                UnitStatus::Active
            }
            Err(err) => {
                counter!("operator_reconcile_total", "outcome" => err.kind()).increment(1);
                let reason = err.reason();
                warn!(
                    event = ?current_event(),
                    relation_id = ?current_relation_id(),
                    error = %err,
                    reason = %reason,
                    "Reconciliation blocked"
                );
                UnitStatus::blocked(reason)
            }
        };
        self.set_status(status.clone());
        status
    }

    async fn apply(&self) -> Result<(), ReconcileError> {
        let credentials = &self.state.credentials;
        let config = synthesize(
            &self.context.settings,
            credentials.database_credentials(),
            credentials.identity_credentials(),
        )?;

        if !self.workload().can_connect().await {
            return Err(ReconcileError::ContainerNotReady);
        }

        // Nothing is written until every artifact has rendered.
        let truststore = match credentials
            .identity_credentials()
            .and_then(|identity| identity.host_certificate_b64())
        {
            Some(cert_b64) => {
                let certificate = decode_certificate(cert_b64)?;
                let store =
                    encode_truststore(&certificate, TRUSTSTORE_NAME, TRUSTSTORE_PASSPHRASE)?;
                Some((certificate_fingerprint(&certificate), store))
            }
            None => None,
        };
        let rendered = config.to_json_bytes()?;

        self.workload()
            .push(ENGINE_CONFIG_FILE_CONTAINER_LOCAL_PATH, &rendered)
            .await?;
        if let Some((fingerprint, store)) = truststore {
            debug!(certificate_sha256 = %fingerprint, "Pushing trust store");
            self.workload()
                .push(TRUSTSTORE_CONTAINER_LOCAL_PATH, &store)
                .await?;
        }
        self.workload().restart(ENGINE_SERVICE_NAME).await?;
        Ok(())
    }
}
