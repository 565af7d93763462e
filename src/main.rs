//! taskhub server.
//!
//! # Architecture Overview
//!
//! ```text
//!   Client ──▶ request id / timeout ──▶ pin snapshot ──▶ gatekeeper ──▶ bulkhead(group) ──▶ handler
//!                                            │               │                │               │
//!                                       ConfigStore    denylist, rate     per-group        retry +
//!                                       (ArcSwap)      limit, sanitize,   admission        backoff
//!                                                      policy, audit                          │
//!                                                                                         DataStore
//! ```

use std::path::PathBuf;

use clap::Parser;

use taskhub::lifecycle::startup::{self, StartupOptions};

#[derive(Parser, Debug)]
#[command(name = "taskhub", version, about = "Task API with gatekeeper, bulkheads and retries")]
struct Args {
    /// Path to the TOML configuration file; created with defaults if missing
    #[arg(short, long, default_value = "config/taskhub.toml")]
    config: PathBuf,

    /// Force the Prometheus exporter on
    #[arg(long, conflicts_with = "no_metrics")]
    metrics: bool,

    /// Force the Prometheus exporter off
    #[arg(long)]
    no_metrics: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let metrics = match (args.metrics, args.no_metrics) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    };

    startup::run(StartupOptions {
        config_path: args.config,
        metrics,
    })
    .await?;

    Ok(())
}
