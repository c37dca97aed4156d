use async_trait::async_trait;
use tracing::{info, warn};

use super::EventHandler;
use crate::events::{Flow, HookEvent};
use crate::models::UnitStatus;
use crate::reconciler::EngineOperator;

/// Settings may have changed; reconcile against them.
pub struct ConfigChanged;

#[async_trait]
impl EventHandler for ConfigChanged {
    async fn handle(&self, operator: &mut EngineOperator, _event: &HookEvent) -> Flow {
        operator.reconcile().await;
        Flow::Continue
    }
}

/// The workload supervisor became reachable: install the service definition, then reconcile.
pub struct WorkloadReady;

#[async_trait]
impl EventHandler for WorkloadReady {
    async fn handle(&self, operator: &mut EngineOperator, _event: &HookEvent) -> Flow {
        if let Err(err) = operator.install_service_layer().await {
            warn!(error = %err, "Failed to install service layer");
            operator.set_status(UnitStatus::blocked(err.reason()));
            return Flow::Continue;
        }
        operator.reconcile().await;
        Flow::Continue
    }
}

/// A remote application left a relation. Stored credentials are kept as-is.
pub struct RelationDeparted;

#[async_trait]
impl EventHandler for RelationDeparted {
    async fn handle(&self, _operator: &mut EngineOperator, event: &HookEvent) -> Flow {
        info!(
            event = %event,
            relation_id = ?event.relation_id(),
            "Relation departed; retaining last-known relation data"
        );
        Flow::Continue
    }
}
