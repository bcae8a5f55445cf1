//! Bad Node Detector CLI
//!
//! Runs a single detection pass against the current cluster, or inspects and
//! manipulates the pacing time lock. Every command prints one JSON document on
//! stdout; logs go to stderr.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use bad_node_detector::{Detector, DetectorConfig, KubeStore};
use clap::{Parser, Subcommand};
use k8s_openapi::api::core::v1::{Namespace, Node};
use serde_json::{json, Value};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Detect persistently unhealthy nodes that are safe to terminate
#[derive(Parser)]
#[command(name = "bad-node-detector")]
#[command(about = "Detect persistently unhealthy nodes that are safe to terminate")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Identity of the calling component (scopes the time lock)
    #[arg(long, env = "DETECTOR_OWNER")]
    owner: String,

    /// Maximum share of the fleet returned by one pass
    #[arg(long, env = "DETECTOR_MAX_TERMINATION_FRACTION", default_value = "0.10")]
    max_termination_fraction: f64,

    /// Not-ready ticks before a node is marked for termination
    #[arg(long, env = "DETECTOR_TICK_THRESHOLD", default_value = "6")]
    tick_threshold: u32,

    /// Pause between two terminations, in seconds
    #[arg(long, env = "DETECTOR_PAUSE_SECS", default_value = "600")]
    pause_secs: u64,

    /// Namespace holding the time lock annotations
    #[arg(long, env = "DETECTOR_COORDINATION_NAMESPACE", default_value = "default")]
    coordination_namespace: String,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one detection pass and print the nodes marked for termination
    Detect,
    /// Inspect or manipulate the pacing time lock
    Lock {
        #[command(subcommand)]
        action: LockAction,
    },
}

#[derive(Subcommand)]
enum LockAction {
    /// Take the time lock for the configured owner
    Acquire,
    /// Release the time lock early
    Release {
        /// Release another component's lock instead of our own
        #[arg(long)]
        component: Option<String>,
    },
    /// Show when the time lock expires
    Status,
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,bad_node_detector=debug".into());
    let registry = tracing_subscriber::registry().with(filter);

    if json {
        registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }
}

async fn run_lock(detector: &Detector, action: LockAction) -> Result<Value> {
    let lock = detector.lock();

    let output = match action {
        LockAction::Acquire => match lock.acquire().await {
            Ok(until) => json!({ "owner": lock.owner(), "acquired": true, "until": until }),
            Err(err) if err.is_already_locked() => {
                let until = lock.locked_until().await?;
                json!({ "owner": lock.owner(), "acquired": false, "until": until })
            }
            Err(err) => return Err(err).context("failed to acquire time lock"),
        },
        LockAction::Release { component } => {
            let owner = component.as_deref().unwrap_or(lock.owner());
            let released = lock
                .release_owner(owner)
                .await
                .context("failed to release time lock")?;
            json!({ "owner": owner, "released": released })
        }
        LockAction::Status => {
            let until = lock.locked_until().await?;
            json!({ "owner": lock.owner(), "locked": until.is_some(), "until": until })
        }
    };

    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json);

    info!(
        "Starting bad-node-detector v{} for {}",
        env!("CARGO_PKG_VERSION"),
        cli.owner
    );

    let config = DetectorConfig::new(&cli.owner)
        .with_max_termination_fraction(cli.max_termination_fraction)
        .with_tick_threshold(cli.tick_threshold)
        .with_pause_between_terminations(Duration::from_secs(cli.pause_secs))
        .with_coordination_namespace(&cli.coordination_namespace);

    let client = kube::Client::try_default()
        .await
        .context("failed to create Kubernetes client")?;

    let detector = Detector::new(
        Arc::new(KubeStore::<Node>::new(client.clone())),
        Arc::new(KubeStore::<Namespace>::new(client)),
        config,
    )
    .context("invalid detector configuration")?;

    let output = match cli.command {
        Commands::Detect => {
            let bad_nodes = detector
                .detect_bad_nodes()
                .await
                .context("detection pass failed")?;
            let should_terminate = bad_nodes.should_terminate();
            json!({
                "nodes": bad_nodes.nodes,
                "pacing": bad_nodes.pacing,
                "shouldTerminate": should_terminate,
            })
        }
        Commands::Lock { action } => run_lock(&detector, action).await?,
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
