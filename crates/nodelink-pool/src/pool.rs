//! Channel pool: the public face of the connection core.
//!
//! Owns the endpoint catalog and the registry, and wires the connector,
//! the two periodic loops, and the selector onto them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use nodelink_core::{ConfigError, EndpointConfig, NodelinkConfig};

use crate::connector::{self, ConnectReport};
use crate::error::PoolError;
use crate::heartbeat::{heartbeat_loop, HeartbeatFn};
use crate::reconnect::Reconnector;
use crate::registry::ConnectionRegistry;
use crate::selector;
use crate::transport::{ConnectionHandle, LinkTimeouts, Transport};

/// Periods and deadlines for the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSettings {
    pub timeouts: LinkTimeouts,
    pub heartbeat_period: Duration,
    pub reconnect_period: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self::from(&NodelinkConfig::default())
    }
}

impl From<&NodelinkConfig> for PoolSettings {
    fn from(config: &NodelinkConfig) -> Self {
        Self {
            timeouts: LinkTimeouts {
                connect: config.connect_timeout(),
                handshake: config.handshake_timeout(),
            },
            heartbeat_period: config.heartbeat_period(),
            reconnect_period: config.reconnect_period(),
        }
    }
}

pub struct ChannelPool {
    catalog: Arc<[EndpointConfig]>,
    registry: ConnectionRegistry,
    transport: Arc<dyn Transport>,
    settings: PoolSettings,
    started: Mutex<bool>,
}

impl ChannelPool {
    /// Validate the configured peers and build an idle pool.
    ///
    /// `registry` is passed in so the transport can be built around the
    /// same registry for its disconnect callbacks.
    pub fn init(
        config: &NodelinkConfig,
        registry: ConnectionRegistry,
        transport: Arc<dyn Transport>,
    ) -> Result<Self, ConfigError> {
        let catalog = config.catalog()?;
        Ok(Self::new(catalog, registry, transport, PoolSettings::from(config)))
    }

    pub fn new(
        catalog: Vec<EndpointConfig>,
        registry: ConnectionRegistry,
        transport: Arc<dyn Transport>,
        settings: PoolSettings,
    ) -> Self {
        Self {
            catalog: catalog.into(),
            registry,
            transport,
            settings,
            started: Mutex::new(false),
        }
    }

    pub fn catalog(&self) -> &[EndpointConfig] {
        &self.catalog
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    pub fn settings(&self) -> &PoolSettings {
        &self.settings
    }

    /// Catalog entry for `host:port`, if configured.
    pub fn endpoint(&self, host: &str, port: u16) -> Option<&EndpointConfig> {
        self.catalog
            .iter()
            .find(|e| e.address.host == host && e.address.port == port)
    }

    /// Dial every catalog endpoint in parallel and wait for all to settle.
    ///
    /// Once a call has succeeded, later calls return the current active
    /// count without dialing.
    pub async fn connect_all(&self) -> Result<ConnectReport, PoolError> {
        let mut started = self.started.lock().await;
        if *started {
            tracing::debug!("already connected");
            return Ok(ConnectReport {
                activated: self.registry.active_entries().len(),
                errors: Vec::new(),
            });
        }

        let report = connector::connect_all(
            self.transport.clone(),
            &self.registry,
            &self.catalog,
            self.settings.timeouts,
        )
        .await?;
        *started = true;
        Ok(report)
    }

    /// Spawn the heartbeat and reconnect loops. Both fire immediately.
    pub fn start_periodic_tasks(&self, heartbeat: HeartbeatFn) -> PeriodicTasks {
        let (shutdown, _) = broadcast::channel(1);

        let heartbeat = tokio::spawn(heartbeat_loop(
            self.registry.clone(),
            heartbeat,
            self.settings.heartbeat_period,
            shutdown.subscribe(),
        ));

        let reconnector = Reconnector::new(
            self.transport.clone(),
            self.registry.clone(),
            self.catalog.clone(),
            self.settings.timeouts,
        );
        let reconnect = tokio::spawn(
            reconnector.run(self.settings.reconnect_period, shutdown.subscribe()),
        );

        tracing::info!(
            heartbeat_ms = self.settings.heartbeat_period.as_millis() as u64,
            reconnect_ms = self.settings.reconnect_period.as_millis() as u64,
            "periodic tasks started"
        );
        PeriodicTasks {
            shutdown,
            heartbeat,
            reconnect,
        }
    }

    /// Pick a link for the next request, preferring the highest peers.
    pub fn select<H: Ord>(
        &self,
        heights: Option<&HashMap<String, H>>,
    ) -> Result<ConnectionHandle, PoolError> {
        selector::select(&self.registry, heights)
    }

    pub fn lookup(&self, host: &str, port: u16) -> Option<ConnectionHandle> {
        self.registry.lookup(host, port)
    }

    /// Stop the loops, then close and forget every registered link.
    pub async fn shutdown(&self, tasks: PeriodicTasks) {
        tasks.stop().await;
        let links = self.registry.drain();
        tracing::info!(closed = links.len(), "closing links");
        for conn in links {
            conn.close();
        }
        *self.started.lock().await = false;
    }
}

/// Running heartbeat and reconnect loops.
pub struct PeriodicTasks {
    shutdown: broadcast::Sender<()>,
    heartbeat: JoinHandle<()>,
    reconnect: JoinHandle<()>,
}

impl PeriodicTasks {
    /// Halt both loops and wait for them to exit. Reconnect attempts still
    /// in flight are aborted, and any half-open link they hold is closed.
    pub async fn stop(self) {
        let _ = self.shutdown.send(());
        if let Err(e) = self.heartbeat.await {
            tracing::error!(error = %e, "heartbeat loop exited abnormally");
        }
        if let Err(e) = self.reconnect.await {
            tracing::error!(error = %e, "reconnect loop exited abnormally");
        }
    }
}
