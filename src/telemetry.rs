//! Event-scoped tracing metadata and the process-wide subscriber.
//!
//! Each invocation handles exactly one host event, so the subscriber is installed
//! once from `main` and the event identity travels in a task-local.

use std::io;
use std::sync::OnceLock;

use log::LevelFilter;
use thiserror::Error;
use tokio::task_local;
use tracing::Subscriber;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_log::LogTracer;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, registry::LookupSpan};

use crate::config::AppConfig;

/// Identifies the host event currently being dispatched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventContext {
    pub event: String,
    pub relation_id: Option<u32>,
}

task_local! {
    static ACTIVE_EVENT_CONTEXT: EventContext;
}

#[derive(Debug, Error)]
pub enum TelemetryInitError {
    #[error("failed to install tracing subscriber: {0}")]
    Subscriber(#[from] SetGlobalDefaultError),
}

static SUBSCRIBER_INSTALLED: OnceLock<()> = OnceLock::new();

/// Installs the global subscriber on first call; later calls are no-ops.
///
/// `RUST_LOG` wins over the configured level. Records go to stderr because
/// stdout carries the dispatch report.
pub fn init_tracing(config: &AppConfig) -> Result<(), TelemetryInitError> {
    if SUBSCRIBER_INSTALLED.get().is_some() {
        return Ok(());
    }

    bridge_log_records();

    let subscriber = tracing_subscriber::registry()
        .with(event_filter(&config.log_level))
        .with(output_layer(&config.log_format));
    tracing::subscriber::set_global_default(subscriber)?;

    let _ = SUBSCRIBER_INSTALLED.set(());
    Ok(())
}

/// Routes `log` records from dependencies into tracing. A logger that is already
/// registered keeps its place.
fn bridge_log_records() {
    if LogTracer::builder()
        .with_max_level(LevelFilter::Trace)
        .init()
        .is_err()
    {
        eprintln!("warning: a `log` backend is already installed; dependency logs bypass tracing");
    }
}

fn event_filter(fallback_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback_level))
}

fn output_layer<S>(format: &str) -> Box<dyn Layer<S> + Send + Sync>
where
    S: Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    let layer = fmt::layer().with_writer(io::stderr).with_target(true);
    match format {
        "pretty" => layer.pretty().boxed(),
        _ => layer.json().flatten_event(true).boxed(),
    }
}

/// Runs `future` with `context` visible to [`current_event`] and [`current_relation_id`].
pub async fn with_event_context<Fut, R>(context: EventContext, future: Fut) -> R
where
    Fut: std::future::Future<Output = R>,
{
    ACTIVE_EVENT_CONTEXT.scope(context, future).await
}

pub fn current_event() -> Option<String> {
    ACTIVE_EVENT_CONTEXT.try_with(|ctx| ctx.event.clone()).ok()
}

/// Relation id of the event being dispatched; `None` outside dispatch and for
/// events that are not tied to a relation.
pub fn current_relation_id() -> Option<u32> {
    ACTIVE_EVENT_CONTEXT
        .try_with(|ctx| ctx.relation_id)
        .ok()
        .flatten()
}
