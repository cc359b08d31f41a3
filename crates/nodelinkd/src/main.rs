//! nodelinkd: keeps a pool of links to the configured chain nodes.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};

use nodelink_core::NodelinkConfig;
use nodelink_pool::{ChannelPool, ConnectionHandle, ConnectionRegistry, HeartbeatFn};
use nodelinkd::{frame, TcpTransport};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Load config
    if let Err(e) = NodelinkConfig::write_default_if_missing() {
        tracing::warn!(error = %e, "failed to write default config");
    }
    let config = NodelinkConfig::load().context("failed to load config")?;
    tracing::info!(
        path = %NodelinkConfig::file_path().display(),
        peers = config.peers.len(),
        "nodelinkd starting"
    );

    // Pool
    let registry = ConnectionRegistry::new();
    let transport = Arc::new(TcpTransport::new(registry.clone(), config.idle_timeout()));
    let pool = Arc::new(
        ChannelPool::init(&config, registry, transport).context("invalid peer configuration")?,
    );

    let report = pool.connect_all().await?;
    for error in &report.errors {
        tracing::warn!(error = %error, "endpoint unavailable at startup");
    }

    let heartbeat: HeartbeatFn =
        Arc::new(|conn: &ConnectionHandle| conn.send(frame::encode(frame::HEARTBEAT)));
    let tasks = pool.start_periodic_tasks(heartbeat);

    // ── Shutdown channel ─────────────────────────────────────────────────────
    let (shutdown_tx, _) = tokio::sync::broadcast::channel::<()>(1);

    {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("shutdown signal received");
            let _ = shutdown.send(());
        });
    }

    let pool_printer = {
        let pool = pool.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(5));
            let no_heights: Option<&HashMap<String, u64>> = None;
            loop {
                interval.tick().await;
                let links = pool.registry().snapshot();
                tracing::info!(count = links.len(), "link table snapshot");
                for (peer, conn) in &links {
                    tracing::info!(peer = %peer, active = conn.is_active(), "  link");
                }
                match pool.select(no_heights) {
                    Ok(conn) => tracing::debug!(selected = %conn.remote_address(), "selection probe"),
                    Err(e) => tracing::warn!(error = %e, "selection probe"),
                }
            }
        })
    };

    // ── Wait for exit ────────────────────────────────────────────────────────

    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::select! {
        _ = shutdown_rx.recv() => tracing::info!("shutting down"),
        r = pool_printer       => tracing::error!("pool printer exited: {:?}", r),
    }

    pool.shutdown(tasks).await;
    Ok(())
}
