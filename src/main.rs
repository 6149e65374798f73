//! Trusted edge server (v1)
//!
//! Serves one application on many listeners and resolves the real client
//! behind trusted reverse proxies.
//!
//! # Architecture Overview
//!
//! ```text
//!                      ┌──────────────────────────────────────────────────┐
//!                      │                  TRUSTED EDGE                    │
//!                      │                                                  │
//!   Proxy / Client     │  ┌──────────┐   ┌───────────┐   ┌────────────┐   │
//!   ───────────────────┼─▶│ listener │──▶│ trust     │──▶│ forwarded  │   │
//!                      │  │ (plain / │   │ boundary  │   │ headers    │   │
//!                      │  │   TLS)   │   │ (CIDRs)   │   │ resolver   │   │
//!                      │  └──────────┘   └───────────┘   └─────┬──────┘   │
//!                      │       × N                             │          │
//!                      │                                       ▼          │
//!   Response           │                               ┌────────────┐     │
//!   ◀──────────────────┼───────────────────────────────│ app router │     │
//!                      │                               └────────────┘     │
//!                      │  ┌────────────────────────────────────────────┐  │
//!                      │  │ lifecycle: concurrent start, first failure │  │
//!                      │  │ stops all, deadline-bounded shutdown       │  │
//!                      │  └────────────────────────────────────────────┘  │
//!                      └──────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use trusted_edge::config::{load_config, ObservabilityConfig, ServiceConfig};
use trusted_edge::http::default_app;
use trusted_edge::lifecycle::{build_runtime, shutdown_signal};
use trusted_edge::observability::init_logging;

#[derive(Parser)]
#[command(name = "trusted-edge")]
#[command(about = "Multi-listener HTTP server with trusted proxy header resolution", long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let log_filter = init_logging(&ObservabilityConfig::default());

    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ServiceConfig::default(),
    };
    if let Some(log_filter) = &log_filter {
        log_filter.apply(&config.observability);
    }

    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        config = ?cli.config,
        shutdown_timeout_secs = config.shutdown.timeout_secs,
        "trusted-edge starting"
    );

    let span = tracing::info_span!("runtime");
    let runtime = Arc::new(build_runtime(&config, default_app(), span)?);

    let mut run = tokio::spawn({
        let runtime = Arc::clone(&runtime);
        async move { runtime.run().await }
    });

    tokio::select! {
        joined = &mut run => {
            joined??;
        }
        _ = shutdown_signal() => {
            runtime.shutdown(config.shutdown.timeout()).await?;
            run.await??;
        }
    }

    tracing::info!("Shutdown complete");
    Ok(())
}
