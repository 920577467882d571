//! SIP application router (admin process).
//!
//! # Architecture Overview
//!
//! ```text
//!     router.toml
//!         │
//!         ▼
//!     ┌──────────┐   ┌─────────────┐   ┌──────────────────────┐
//!     │  config  │──▶│ descriptors │──▶│ ApplicationContainer │
//!     └──────────┘   └─────────────┘   └──────────┬───────────┘
//!                                                 │
//!                        ┌────────────────────────┼──────────────┐
//!                        ▼                        ▼              ▼
//!                 ┌────────────┐          ┌──────────────┐  ┌─────────┐
//!                 │ admin API  │          │ SIP dispatch │  │ events  │
//!                 │  (axum)    │          │  (resolve)   │  │  (log)  │
//!                 └────────────┘          └──────────────┘  └─────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use sip_app_router::admin::{self, AdminState};
use sip_app_router::config::load_config;
use sip_app_router::container::{self, ApplicationContainer};
use sip_app_router::lifecycle::{deploy_all, wait_for_signal, Shutdown};
use sip_app_router::observability::{logging, metrics};

const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Parser)]
#[command(name = "sip-app-router")]
#[command(
    about = "Deploys SIP application descriptors and serves the admin API",
    long_about = None
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, default_value = "router.toml")]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    logging::init_logging(&config.observability);
    tracing::info!(
        config = %cli.config.display(),
        "sip-app-router v{} starting",
        env!("CARGO_PKG_VERSION")
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let (events_tx, events_rx) = container::events::channel();
    let drain = container::events::drain_events(events_rx);

    let container = Arc::new(ApplicationContainer::with_events(events_tx));
    deploy_all(&config, &container)?;

    let shutdown = Shutdown::new();
    let admin_task = if config.admin.enabled {
        let listener = TcpListener::bind(&config.admin.bind_address).await?;
        let state = AdminState::new(container.clone(), config.admin.api_key.as_str());
        Some(tokio::spawn(admin::serve(listener, state, shutdown.clone())))
    } else {
        None
    };

    wait_for_signal(shutdown).await;

    if let Some(task) = admin_task {
        match task.await {
            Ok(Err(e)) => tracing::error!(error = %e, "Admin API failed"),
            Err(e) => tracing::error!(error = %e, "Admin task panicked"),
            Ok(Ok(())) => {}
        }
    }

    let undeployed = container.undeploy_all();
    // Descriptors hold sink clones; the drain ends once the last one is gone.
    drop(container);
    match tokio::time::timeout(DRAIN_TIMEOUT, drain).await {
        Ok(Ok(events)) => tracing::debug!(events, "Container events drained"),
        Ok(Err(e)) => tracing::error!(error = %e, "Event drain task panicked"),
        Err(_) => tracing::warn!("Timed out draining container events"),
    }
    tracing::info!(applications = undeployed, "Shutdown complete");
    Ok(())
}
