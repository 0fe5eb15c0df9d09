//! # Site Node
//!
//! Entry point for one site of the mesh.
//!
//! ## Startup Sequence
//!
//! 1. Initialize logging (`RUST_LOG`, default `info`)
//! 2. Load configuration (`SM_CONFIG` file, `SM_*` overrides)
//! 3. Validate configuration for production
//! 4. Lock the data directory and open storage
//! 5. Recover held messages and drain them inline (bootstrap)
//! 6. Go online: consumer work runs on the tokio runtime
//! 7. Run the periodic check until Ctrl+C

use anyhow::{Context, Result};
use ism_sequencer::IsmExchangeApi;
use node_runtime::{NodeConfig, SiteNode};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .with_thread_ids(true)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let config = NodeConfig::load().context("Failed to load configuration")?;
    config.validate_for_production()?;

    info!(
        "Starting site {} (data dir {:?})",
        config.site_id, config.storage.data_dir
    );
    let node = Arc::new(SiteNode::open(&config)?);

    node.bootstrap()?;
    node.go_online(tokio::runtime::Handle::current())?;
    info!("Site {} is online", node.site_id());

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let periodic_node = Arc::clone(&node);
    let periodic = tokio::spawn(async move { periodic_node.run_periodic(shutdown_rx).await });

    info!("Node is running. Press Ctrl+C to stop.");
    tokio::signal::ctrl_c().await?;

    info!("Initiating graceful shutdown...");
    let _ = shutdown_tx.send(true);
    let _ = periodic.await;

    // Let an in-flight consumer finish; its held copy survives otherwise.
    for _ in 0..50 {
        if node.service().in_flight().is_none() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    info!("Shutdown complete");
    Ok(())
}
