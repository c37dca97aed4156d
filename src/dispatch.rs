//! # Event Dispatcher
//!
//! Maps each host event to its handler and runs exactly one event per
//! invocation: load state, handle, save if anything changed, report.

use std::collections::HashMap;
use std::sync::Arc;

use metrics::counter;
use serde::Serialize;
use tracing::{debug, info};

use crate::events::{EventKey, EventKind, Flow, HookEvent};
use crate::handlers::{
    ConfigChanged, DatabaseChanged, DatabaseJoined, EventHandler, IdentityChanged,
    IdentityJoined, IngressJoined, RelationDeparted, StudioJoined, WorkloadReady,
};
use crate::models::UnitStatus;
use crate::reconciler::{EngineOperator, OperatorContext};
use crate::relations::{RelationData, RelationName};
use crate::repositories::{StateStore, StoreError};
use crate::telemetry::{EventContext, with_event_context};

/// What a dispatch did, as reported back to the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    pub event: String,
    pub flow: Flow,
    pub status: UnitStatus,
    /// Data this unit publishes on the event's relation. Empty for lifecycle events.
    pub published: RelationData,
}

/// Dispatch table from event keys to handlers.
#[derive(Clone, Default)]
pub struct Dispatcher {
    handlers: HashMap<EventKey, Arc<dyn EventHandler>>,
}

impl Dispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// The operator's full set of event handlers.
    pub fn with_default_handlers() -> Self {
        let mut dispatcher = Self::new();
        dispatcher.register(
            EventKey::lifecycle(EventKind::ConfigChanged),
            Arc::new(ConfigChanged),
        );
        dispatcher.register(
            EventKey::lifecycle(EventKind::WorkloadReady),
            Arc::new(WorkloadReady),
        );

        dispatcher.register(
            EventKey::relation(EventKind::RelationJoined, RelationName::Database),
            Arc::new(DatabaseJoined),
        );
        dispatcher.register(
            EventKey::relation(EventKind::RelationChanged, RelationName::Database),
            Arc::new(DatabaseChanged),
        );
        dispatcher.register(
            EventKey::relation(EventKind::RelationJoined, RelationName::Identity),
            Arc::new(IdentityJoined),
        );
        dispatcher.register(
            EventKey::relation(EventKind::RelationChanged, RelationName::Identity),
            Arc::new(IdentityChanged),
        );
        dispatcher.register(
            EventKey::relation(EventKind::RelationJoined, RelationName::Studio),
            Arc::new(StudioJoined),
        );
        dispatcher.register(
            EventKey::relation(EventKind::RelationJoined, RelationName::Ingress),
            Arc::new(IngressJoined),
        );

        let departed: Arc<dyn EventHandler> = Arc::new(RelationDeparted);
        for relation in RelationName::ALL {
            dispatcher.register(
                EventKey::relation(EventKind::RelationDeparted, relation),
                departed.clone(),
            );
        }
        dispatcher
    }

    pub fn register(&mut self, key: EventKey, handler: Arc<dyn EventHandler>) {
        self.handlers.insert(key, handler);
    }

    pub fn handles(&self, key: &EventKey) -> bool {
        self.handlers.contains_key(key)
    }

    /// Runs one event to completion.
    ///
    /// Only state store failures are returned as errors; everything else ends up
    /// in the reported status.
    pub async fn dispatch(
        &self,
        context: OperatorContext,
        store: &dyn StateStore,
        event: HookEvent,
    ) -> Result<DispatchOutcome, StoreError> {
        let name = event.name();
        let loaded = store.load().await?;

        let Some(handler) = self.handlers.get(&event.key()).cloned() else {
            debug!(event = %name, "No handler registered; ignoring event");
            counter!("operator_events_total", "event" => name.clone(), "flow" => "ignored")
                .increment(1);
            return Ok(DispatchOutcome {
                event: name,
                flow: Flow::Continue,
                status: loaded.status,
                published: RelationData::new(),
            });
        };

        let mut operator = EngineOperator::new(context, loaded.clone());
        let event_context = EventContext {
            event: name.clone(),
            relation_id: event.relation_id(),
        };
        let flow = with_event_context(event_context, async {
            info!(event = %name, relation_id = ?event.relation_id(), "Dispatching event");
            handler.handle(&mut operator, &event).await
        })
        .await;

        let (state, published) = operator.into_parts();
        if state != loaded {
            store.save(&state).await?;
        }

        counter!("operator_events_total", "event" => name.clone(), "flow" => flow.as_str())
            .increment(1);
        info!(event = %name, flow = flow.as_str(), status = %state.status, "Event handled");

        Ok(DispatchOutcome {
            event: name,
            flow,
            status: state.status,
            published,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::repositories::{MemoryStateStore, UnitState};
    use crate::workload::LocalWorkload;
    use tempfile::TempDir;

    fn context(root: &std::path::Path) -> OperatorContext {
        OperatorContext::from_config(
            &AppConfig::default(),
            Arc::new(LocalWorkload::new(root, None)),
        )
    }

    #[test]
    fn default_table_covers_every_departure() {
        let dispatcher = Dispatcher::with_default_handlers();
        for relation in RelationName::ALL {
            assert!(dispatcher.handles(&EventKey::relation(EventKind::RelationDeparted, relation)));
        }
        assert!(!dispatcher.handles(&EventKey::relation(
            EventKind::RelationChanged,
            RelationName::Ingress
        )));
    }

    #[tokio::test]
    async fn unregistered_event_is_ignored() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStateStore::new();
        let event = HookEvent::RelationChanged {
            relation: RelationName::Studio,
            relation_id: 1,
            data: RelationData::new(),
        };

        let outcome = Dispatcher::with_default_handlers()
            .dispatch(context(dir.path()), &store, event)
            .await
            .unwrap();

        assert_eq!(outcome.flow, Flow::Continue);
        assert_eq!(outcome.event, "legend-engine-relation-changed");
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn unchanged_state_is_not_saved() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStateStore::with_state(UnitState::default());

        let outcome = Dispatcher::with_default_handlers()
            .dispatch(context(dir.path()), &store, HookEvent::ConfigChanged)
            .await
            .unwrap();

        assert_eq!(outcome.status, UnitStatus::blocked("awaiting relations"));
        assert_eq!(store.save_count(), 0);
    }

    #[tokio::test]
    async fn status_change_is_persisted() {
        let dir = TempDir::new().unwrap();
        let store = MemoryStateStore::new();
        let event = HookEvent::RelationChanged {
            relation: RelationName::Database,
            relation_id: 1,
            data: RelationData::new(),
        };

        let outcome = Dispatcher::with_default_handlers()
            .dispatch(context(dir.path()), &store, event)
            .await
            .unwrap();

        assert_eq!(outcome.flow, Flow::Defer);
        assert_eq!(store.save_count(), 1);
        assert!(matches!(
            store.snapshot().unwrap().status,
            UnitStatus::Waiting(_)
        ));
    }
}
