//! Reconnect loop: periodically re-dials catalog endpoints that have no
//! active link.
//!
//! Fixed-interval retry with no backoff: a failed endpoint is simply tried
//! again next tick. A tick never waits on the network. Attempts started by
//! the loop belong to it and are aborted when it stops, so no link can be
//! registered after shutdown. Racing attempts for one endpoint resolve
//! through `insert_if_vacant`, so exactly one link is kept.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::MissedTickBehavior;

use nodelink_core::EndpointConfig;

use crate::registry::ConnectionRegistry;
use crate::transport::{activate, LinkTimeouts, Transport};

#[derive(Clone)]
pub struct Reconnector {
    transport: Arc<dyn Transport>,
    registry: ConnectionRegistry,
    catalog: Arc<[EndpointConfig]>,
    timeouts: LinkTimeouts,
}

impl Reconnector {
    pub fn new(
        transport: Arc<dyn Transport>,
        registry: ConnectionRegistry,
        catalog: Arc<[EndpointConfig]>,
        timeouts: LinkTimeouts,
    ) -> Self {
        Self {
            transport,
            registry,
            catalog,
            timeouts,
        }
    }

    /// Catalog entries without an active registered link.
    pub fn broken(&self) -> Vec<EndpointConfig> {
        self.catalog
            .iter()
            .filter(|e| !self.registry.has_active(&e.identity()))
            .cloned()
            .collect()
    }

    /// Start one detached attempt per broken endpoint and return immediately.
    pub fn tick(&self) -> Vec<JoinHandle<()>> {
        self.scan()
            .into_iter()
            .map(|entry| {
                let this = self.clone();
                tokio::spawn(async move { this.attempt(entry).await })
            })
            .collect()
    }

    fn scan(&self) -> Vec<EndpointConfig> {
        let broken = self.broken();
        tracing::info!(
            alive = self.catalog.len() - broken.len(),
            broken = broken.len(),
            "keepalive nodes count"
        );
        broken
    }

    async fn attempt(&self, entry: EndpointConfig) {
        let endpoint = &entry.address;
        tracing::debug!(%endpoint, "try reconnect");

        match activate(self.transport.as_ref(), endpoint, self.timeouts).await {
            Ok(conn) => match self.registry.insert_if_vacant(entry.identity(), conn) {
                Ok(()) => tracing::info!(%endpoint, "reconnect success"),
                Err(loser) => {
                    tracing::debug!(%endpoint, "endpoint reconnected elsewhere, dropping link");
                    loser.close();
                }
            },
            Err(e) => tracing::error!(%endpoint, error = %e, "reconnect failed"),
        }
    }

    /// Tick every `period` (first tick immediate) until shutdown.
    ///
    /// Returns only once every attempt it started has been aborted.
    pub async fn run(self, period: Duration, mut shutdown: broadcast::Receiver<()>) {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut attempts = JoinSet::new();

        loop {
            tokio::select! {
                _ = shutdown.recv() => {
                    tracing::info!(in_flight = attempts.len(), "reconnect loop shutting down");
                    attempts.shutdown().await;
                    return;
                }

                _ = interval.tick() => {
                    for entry in self.scan() {
                        let this = self.clone();
                        attempts.spawn(async move { this.attempt(entry).await });
                    }
                }

                Some(done) = attempts.join_next(), if !attempts.is_empty() => {
                    if let Err(e) = done {
                        tracing::error!(error = %e, "reconnect attempt exited abnormally");
                    }
                }
            }
        }
    }
}
