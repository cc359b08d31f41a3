//! Startup connector: dials every catalog endpoint in parallel.
//!
//! Each attempt runs on its own task, so once started it settles even if
//! the caller stops waiting; the pool always ends in a definite state.
//! Startup succeeds if at least one endpoint activates.

use std::sync::Arc;

use futures::future::join_all;

use nodelink_core::EndpointConfig;

use crate::error::PoolError;
use crate::registry::ConnectionRegistry;
use crate::transport::{activate, LinkTimeouts, Transport};

/// Outcome of a startup pass that activated at least one link.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectReport {
    /// Links that completed dial + handshake and were registered.
    pub activated: usize,
    /// One entry per failed endpoint, in catalog order.
    pub errors: Vec<String>,
}

enum Settled {
    Activated,
    Duplicate,
    Failed(String),
}

/// Dial and handshake every endpoint concurrently, register the survivors.
///
/// Returns `NoConnectionEstablished` with every error string if nothing
/// activated. Partial failure is not an error.
pub async fn connect_all(
    transport: Arc<dyn Transport>,
    registry: &ConnectionRegistry,
    catalog: &[EndpointConfig],
    timeouts: LinkTimeouts,
) -> Result<ConnectReport, PoolError> {
    tracing::debug!(endpoints = catalog.len(), "start connect");

    let attempts = catalog.iter().map(|entry| {
        let transport = transport.clone();
        let registry = registry.clone();
        let endpoint = entry.address.clone();
        tokio::spawn(async move {
            match activate(transport.as_ref(), &endpoint, timeouts).await {
                Ok(conn) => match registry.insert_if_vacant(endpoint.identity(), conn) {
                    Ok(()) => Settled::Activated,
                    Err(extra) => {
                        // Catalog listed this endpoint twice and both won.
                        tracing::debug!(%endpoint, "endpoint already registered, closing extra link");
                        extra.close();
                        Settled::Duplicate
                    }
                },
                Err(e) => {
                    tracing::error!(%endpoint, error = %e, "connect failed");
                    Settled::Failed(e.to_string())
                }
            }
        })
    });
    let attempts: Vec<_> = attempts.collect();

    let mut report = ConnectReport::default();
    for (entry, settled) in catalog.iter().zip(join_all(attempts).await) {
        match settled {
            Ok(Settled::Activated) => report.activated += 1,
            Ok(Settled::Duplicate) => {}
            Ok(Settled::Failed(e)) => report.errors.push(e),
            Err(join_err) => report
                .errors
                .push(format!("connect to {} aborted: {join_err}", entry.address)),
        }
    }

    if report.activated == 0 {
        tracing::error!(errors = ?report.errors, "all connections have failed");
        return Err(PoolError::NoConnectionEstablished {
            errors: report.errors,
        });
    }

    tracing::info!(
        activated = report.activated,
        failed = report.errors.len(),
        "start connect end"
    );
    Ok(report)
}
