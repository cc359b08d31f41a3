//! Heartbeat loop: asks every active link to emit a keepalive.
//!
//! The callback is owned by the caller. Its outcome is logged and
//! otherwise ignored: dead links are reported by the transport as
//! disconnect events, never removed here.

use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::MissedTickBehavior;

use crate::registry::ConnectionRegistry;
use crate::transport::ConnectionHandle;

/// Caller-supplied heartbeat, invoked once per active link per tick.
pub type HeartbeatFn = Arc<dyn Fn(&ConnectionHandle) -> anyhow::Result<()> + Send + Sync>;

/// Run one heartbeat pass. Returns how many links were visited.
///
/// A failing or panicking callback does not stop the pass.
pub fn heartbeat_tick(registry: &ConnectionRegistry, heartbeat: &HeartbeatFn) -> usize {
    let active = registry.active_entries();
    for (peer, conn) in &active {
        tracing::trace!(peer = %peer, "send heart beat");
        match catch_unwind(AssertUnwindSafe(|| heartbeat(conn))) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => tracing::warn!(peer = %peer, error = %e, "heartbeat failed"),
            Err(_) => tracing::error!(peer = %peer, "heartbeat callback panicked"),
        }
    }
    active.len()
}

/// Tick every `period` (first tick immediate) until shutdown.
pub async fn heartbeat_loop(
    registry: ConnectionRegistry,
    heartbeat: HeartbeatFn,
    period: Duration,
    mut shutdown: broadcast::Receiver<()>,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("heartbeat loop shutting down");
                return;
            }

            _ = interval.tick() => {
                heartbeat_tick(&registry, &heartbeat);
            }
        }
    }
}
