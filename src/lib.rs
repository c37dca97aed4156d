//! # Legend Engine Operator Library
//!
//! Event-driven lifecycle controller for a FINOS Legend Engine workload:
//! relation bridges, configuration synthesis, trust store generation and the
//! reconciler that pushes the result into the workload container.

pub mod config;
pub mod dispatch;
pub mod engine_config;
pub mod error;
pub mod events;
pub mod handlers;
pub mod models;
pub mod reconciler;
pub mod relations;
pub mod repositories;
pub mod telemetry;
pub mod truststore;
pub mod workload;
