//! # Legend Engine Operator Entry Point
//!
//! One invocation handles one host event and prints the outcome as JSON on stdout.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};
use clap::{Parser, Subcommand};
use legend_engine_operator::{
    config::ConfigLoader,
    dispatch::Dispatcher,
    events::HookEvent,
    reconciler::OperatorContext,
    relations::{RelationData, RelationName},
    repositories::{JsonFileStateStore, StateStore},
    telemetry::init_tracing,
    workload::LocalWorkload,
};
use serde_json::json;
use tracing::debug;

#[derive(Debug, Parser)]
#[command(
    name = "legend-engine-operator",
    about = "Lifecycle operator for a FINOS Legend Engine workload"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Handle a single host event
    Dispatch {
        /// Event name, e.g. `config-changed` or `legend-db-relation-changed`.
        /// With --relation, the short form `relation-changed` is accepted too.
        event: String,
        /// Relation the event concerns
        #[arg(long, value_name = "NAME")]
        relation: Option<RelationName>,
        #[arg(long, value_name = "N", default_value_t = 0)]
        relation_id: u32,
        /// JSON object holding the remote relation data bag
        #[arg(long, value_name = "PATH", conflicts_with = "data")]
        data_file: Option<PathBuf>,
        /// Remote relation data entry; may be repeated
        #[arg(long, value_name = "KEY=VALUE")]
        data: Vec<String>,
    },
    /// Print the last reported unit status
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::new()
        .load()
        .context("loading configuration")?;
    init_tracing(&config).context("initializing telemetry")?;
    if let Ok(redacted) = config.redacted_json() {
        debug!(profile = %config.profile, config = %redacted, "Loaded configuration");
    }

    let store = JsonFileStateStore::new(&config.state_path);

    match cli.command {
        Command::Dispatch {
            event,
            relation,
            relation_id,
            data_file,
            data,
        } => {
            let name = match relation {
                Some(relation) if !event.starts_with(relation.as_str()) => {
                    format!("{relation}-{event}")
                }
                _ => event,
            };
            let bag = match data_file {
                Some(path) => read_data_file(&path).await?,
                None => parse_data_pairs(&data)?,
            };
            let event = HookEvent::from_name(&name, relation_id, bag)?;

            let workload = LocalWorkload::new(&config.workload_root, config.restart_command.clone());
            let context = OperatorContext::from_config(&config, Arc::new(workload));
            let outcome = Dispatcher::with_default_handlers()
                .dispatch(context, &store, event)
                .await
                .context("dispatching event")?;
            println!("{}", serde_json::to_string(&outcome)?);
        }
        Command::Status => {
            let state = store.load().await.context("loading unit state")?;
            let report = json!({
                "status": state.status,
                "database_credentials": state.credentials.database_credentials().is_some(),
                "identity_credentials": state.credentials.identity_credentials().is_some(),
            });
            println!("{report}");
        }
    }

    Ok(())
}

fn parse_data_pairs(pairs: &[String]) -> Result<RelationData> {
    pairs
        .iter()
        .map(|pair| {
            pair.split_once('=')
                .map(|(key, value)| (key.to_string(), value.to_string()))
                .ok_or_else(|| anyhow!("relation data entry '{pair}' is not KEY=VALUE"))
        })
        .collect()
}

async fn read_data_file(path: &Path) -> Result<RelationData> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading relation data from {}", path.display()))?;
    let value: serde_json::Value =
        serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))?;
    let Some(object) = value.as_object() else {
        bail!("relation data file {} must hold a JSON object", path.display());
    };

    let mut bag = RelationData::new();
    for (key, value) in object {
        let text = match value {
            serde_json::Value::String(s) => s.clone(),
            // Non-string values keep their JSON encoding.
            other => other.to_string(),
        };
        bag.insert(key.clone(), text);
    }
    Ok(bag)
}
