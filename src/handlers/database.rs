use async_trait::async_trait;
use tracing::{debug, info, warn};

use super::EventHandler;
use crate::events::{Flow, HookEvent};
use crate::models::UnitStatus;
use crate::reconciler::EngineOperator;
use crate::relations::database::credentials_from_relation;

pub const AWAITING_DATABASE_DATA: &str = "awaiting legend db relation data";

/// Nothing to publish to the database provider; it pushes data to us.
pub struct DatabaseJoined;

#[async_trait]
impl EventHandler for DatabaseJoined {
    async fn handle(&self, _operator: &mut EngineOperator, event: &HookEvent) -> Flow {
        debug!(relation_id = ?event.relation_id(), "Database relation joined");
        Flow::Continue
    }
}

pub struct DatabaseChanged;

#[async_trait]
impl EventHandler for DatabaseChanged {
    async fn handle(&self, operator: &mut EngineOperator, event: &HookEvent) -> Flow {
        let HookEvent::RelationChanged { data, .. } = event else {
            return Flow::Continue;
        };

        match credentials_from_relation(data) {
            Ok(Some(credentials)) => {
                info!(database = credentials.database(), "Stored database credentials");
                operator.credentials_mut().set_database_credentials(credentials);
                operator.reconcile().await;
                Flow::Continue
            }
            Ok(None) => {
                operator.set_status(UnitStatus::waiting(AWAITING_DATABASE_DATA));
                Flow::Defer
            }
            Err(err) => {
                warn!(error = %err, "Rejected database relation data");
                operator.set_status(UnitStatus::blocked(format!(
                    "invalid legend db relation data: {err}"
                )));
                Flow::Continue
            }
        }
    }
}
