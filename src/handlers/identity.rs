use async_trait::async_trait;
use tracing::{info, warn};

use super::EventHandler;
use crate::events::{Flow, HookEvent};
use crate::models::UnitStatus;
use crate::reconciler::EngineOperator;
use crate::relations::identity::{
    credentials_from_relation, publish_redirect_uris, redirect_uris,
};

pub const AWAITING_IDENTITY_DATA: &str = "awaiting legend gitlab credentials from integrator";

/// Tells the GitLab integrator which callback URLs to register.
pub struct IdentityJoined;

#[async_trait]
impl EventHandler for IdentityJoined {
    async fn handle(&self, operator: &mut EngineOperator, _event: &HookEvent) -> Flow {
        let uris = redirect_uris(&operator.service_url());
        if let Err(err) = publish_redirect_uris(operator.published_mut(), &uris) {
            warn!(error = %err, "Failed to encode redirect URIs");
            operator.set_status(UnitStatus::blocked("failed to publish redirect uris"));
            return Flow::Continue;
        }
        info!(redirect_uris = ?uris, "Published redirect URIs");
        Flow::Continue
    }
}

pub struct IdentityChanged;

#[async_trait]
impl EventHandler for IdentityChanged {
    async fn handle(&self, operator: &mut EngineOperator, event: &HookEvent) -> Flow {
        let HookEvent::RelationChanged { data, .. } = event else {
            return Flow::Continue;
        };

        match credentials_from_relation(data) {
            Ok(Some(credentials)) => {
                info!(
                    client_id = credentials.client_id(),
                    has_host_certificate = credentials.host_certificate_b64().is_some(),
                    "Stored GitLab client credentials"
                );
                operator.credentials_mut().set_identity_credentials(credentials);
                operator.reconcile().await;
                Flow::Continue
            }
            Ok(None) => {
                operator.set_status(UnitStatus::waiting(AWAITING_IDENTITY_DATA));
                Flow::Defer
            }
            Err(err) => {
                warn!(error = %err, "Rejected GitLab relation data");
                operator.set_status(UnitStatus::blocked(format!(
                    "invalid legend gitlab relation data: {err}"
                )));
                Flow::Continue
            }
        }
    }
}
