//! # Event Handlers
//!
//! One handler per host event the operator cares about. Handlers never fail:
//! every problem is reported through the unit status, and the returned
//! [`Flow`] tells the host whether to redeliver the event.

use async_trait::async_trait;

use crate::events::{Flow, HookEvent};
use crate::reconciler::EngineOperator;

pub mod database;
pub mod identity;
pub mod lifecycle;
pub mod studio;

pub use database::{DatabaseChanged, DatabaseJoined};
pub use identity::{IdentityChanged, IdentityJoined};
pub use lifecycle::{ConfigChanged, RelationDeparted, WorkloadReady};
pub use studio::{IngressJoined, StudioJoined};

#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, operator: &mut EngineOperator, event: &HookEvent) -> Flow;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::path::Path;
    use std::sync::Arc;

    use crate::config::AppConfig;
    use crate::reconciler::{EngineOperator, OperatorContext};
    use crate::repositories::UnitState;
    use crate::workload::LocalWorkload;

    pub fn operator(root: &Path) -> EngineOperator {
        let mut config = AppConfig::default();
        config.unit_address = "10.0.0.5".to_string();
        let context =
            OperatorContext::from_config(&config, Arc::new(LocalWorkload::new(root, None)));
        EngineOperator::new(context, UnitState::default())
    }
}
