//! Transport seam: what the pool needs from the link layer.
//!
//! The pool never touches sockets. A `Transport` dials and handshakes,
//! and hands back a `Connection` the pool can ask about liveness and
//! push heartbeat bytes through.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use tokio::time::timeout;

use nodelink_core::{DialError, EndpointAddress, HandshakeError};

use crate::error::AttemptError;

/// An established link to one peer node.
pub trait Connection: Send + Sync + fmt::Debug {
    /// The endpoint this link is bound to.
    fn remote_address(&self) -> &EndpointAddress;

    /// True iff the underlying socket is open and writable.
    ///
    /// Called while registry shards are locked, so it must be cheap and
    /// must not touch the registry.
    fn is_active(&self) -> bool;

    /// Queue a frame for the peer.
    fn send(&self, payload: Bytes) -> anyhow::Result<()>;

    /// Tear the link down. Idempotent.
    fn close(&self);
}

/// Shared reference to a live link. Registry identity is pointer identity.
pub type ConnectionHandle = Arc<dyn Connection>;

/// Dial + handshake provider.
///
/// Both futures are `'static` so attempts can run on their own tasks,
/// independent of whoever started them. Implementations should bound each
/// future by the `timeout` they are given; [`activate`] also enforces it
/// from the outside.
pub trait Transport: Send + Sync {
    fn dial(
        &self,
        endpoint: &EndpointAddress,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ConnectionHandle, DialError>>;

    fn handshake(
        &self,
        conn: ConnectionHandle,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<(), HandshakeError>>;
}

/// Connect and handshake deadlines for a single attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkTimeouts {
    pub connect: Duration,
    pub handshake: Duration,
}

impl Default for LinkTimeouts {
    fn default() -> Self {
        Self {
            connect: Duration::from_millis(10_000),
            handshake: Duration::from_millis(10_000),
        }
    }
}

/// Closes a dialed link unless the attempt hands it off.
struct PendingLink {
    conn: ConnectionHandle,
    armed: bool,
}

impl PendingLink {
    fn release(mut self) -> ConnectionHandle {
        self.armed = false;
        self.conn.clone()
    }
}

impl Drop for PendingLink {
    fn drop(&mut self) {
        if self.armed {
            self.conn.close();
        }
    }
}

/// Dial `endpoint` and run the handshake, each bounded by its own timeout.
///
/// Expiry is an ordinary attempt failure. A link that dialed but did not
/// complete its handshake is closed, including when the attempt itself is
/// dropped or aborted mid-handshake.
pub async fn activate(
    transport: &dyn Transport,
    endpoint: &EndpointAddress,
    timeouts: LinkTimeouts,
) -> Result<ConnectionHandle, AttemptError> {
    let conn = match timeout(timeouts.connect, transport.dial(endpoint, timeouts.connect)).await {
        Ok(result) => result?,
        Err(_) => {
            return Err(DialError::TimedOut {
                endpoint: endpoint.clone(),
                after: timeouts.connect,
            }
            .into())
        }
    };
    let pending = PendingLink { conn, armed: true };
    tracing::trace!(%endpoint, "connected, waiting for handshake");

    let handshake = transport.handshake(pending.conn.clone(), timeouts.handshake);
    match timeout(timeouts.handshake, handshake).await {
        Ok(Ok(())) => {
            tracing::trace!(%endpoint, "handshake complete");
            Ok(pending.release())
        }
        Ok(Err(e)) => Err(e.into()),
        Err(_) => Err(HandshakeError::TimedOut {
            endpoint: endpoint.clone(),
            after: timeouts.handshake,
        }
        .into()),
    }
}
