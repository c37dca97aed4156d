use async_trait::async_trait;
use tracing::info;

use super::EventHandler;
use crate::events::{Flow, HookEvent};
use crate::reconciler::EngineOperator;
use crate::relations::ingress::publish_ingress_requirements;
use crate::relations::studio::publish_engine_url;

/// Hands Legend Studio the Engine base URL.
pub struct StudioJoined;

#[async_trait]
impl EventHandler for StudioJoined {
    async fn handle(&self, operator: &mut EngineOperator, _event: &HookEvent) -> Flow {
        let url = operator.service_url();
        publish_engine_url(operator.published_mut(), &url);
        info!(engine_url = %url, "Published Engine URL");
        Flow::Continue
    }
}

pub struct IngressJoined;

#[async_trait]
impl EventHandler for IngressJoined {
    async fn handle(&self, operator: &mut EngineOperator, _event: &HookEvent) -> Flow {
        let app_name = operator.app_name().to_string();
        publish_ingress_requirements(operator.published_mut(), &app_name);
        Flow::Continue
    }
}
