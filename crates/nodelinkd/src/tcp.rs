//! Plain TCP transport for the pool.
//!
//! Each link gets a reader task and a writer task. The reader treats EOF,
//! a read error, or `idle_timeout` without any inbound frame as a dead
//! link and reports it to the registry. The first inbound frame completes
//! the handshake.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};

use nodelink_core::{DialError, EndpointAddress, HandshakeError};
use nodelink_pool::{Connection, ConnectionHandle, ConnectionRegistry, Transport};

use crate::frame;

pub struct TcpTransport {
    registry: ConnectionRegistry,
    idle_timeout: Duration,
    /// Greeting signals for dialed links whose handshake hasn't run yet,
    /// keyed by link address.
    pending: Arc<DashMap<usize, oneshot::Receiver<()>>>,
}

impl TcpTransport {
    pub fn new(registry: ConnectionRegistry, idle_timeout: Duration) -> Self {
        Self {
            registry,
            idle_timeout,
            pending: Arc::new(DashMap::new()),
        }
    }
}

fn link_key(conn: &ConnectionHandle) -> usize {
    Arc::as_ptr(conn) as *const () as usize
}

impl Transport for TcpTransport {
    fn dial(
        &self,
        endpoint: &EndpointAddress,
        timeout: Duration,
    ) -> BoxFuture<'static, Result<ConnectionHandle, DialError>> {
        let endpoint = endpoint.clone();
        let registry = self.registry.clone();
        let idle_timeout = self.idle_timeout;
        let pending = self.pending.clone();

        async move {
            let connect = TcpStream::connect((endpoint.host.as_str(), endpoint.port));
            let stream = match tokio::time::timeout(timeout, connect).await {
                Ok(result) => result.map_err(|source| DialError::Io {
                    endpoint: endpoint.clone(),
                    source,
                })?,
                Err(_) => {
                    return Err(DialError::TimedOut {
                        endpoint,
                        after: timeout,
                    })
                }
            };
            socket2::SockRef::from(&stream)
                .set_keepalive(true)
                .map_err(|source| DialError::Io {
                    endpoint: endpoint.clone(),
                    source,
                })?;
            if let Err(e) = stream.set_nodelay(true) {
                tracing::debug!(peer = %endpoint, error = %e, "set_nodelay failed");
            }

            let (link, greeted) = TcpLink::spawn(endpoint, stream, registry, idle_timeout);
            let handle: ConnectionHandle = link;
            pending.insert(link_key(&handle), greeted);
            Ok(handle)
        }
        .boxed()
    }

    fn handshake(
        &self,
        conn: ConnectionHandle,
        _timeout: Duration,
    ) -> BoxFuture<'static, Result<(), HandshakeError>> {
        let greeted = self.pending.remove(&link_key(&conn)).map(|(_, rx)| rx);
        async move {
            let endpoint = conn.remote_address().clone();
            let failed = |reason: String| HandshakeError::Failed {
                endpoint: endpoint.clone(),
                reason,
            };

            let greeted = greeted.ok_or_else(|| failed("link was not dialed by this transport".into()))?;
            conn.send(frame::encode(frame::HELLO))
                .map_err(|e| failed(e.to_string()))?;
            greeted
                .await
                .map_err(|_| failed("link closed before greeting".into()))
        }
        .boxed()
    }
}

/// One live TCP link.
#[derive(Debug)]
pub struct TcpLink {
    addr: EndpointAddress,
    active: AtomicBool,
    outbound: mpsc::UnboundedSender<Bytes>,
    closed: watch::Sender<bool>,
}

impl TcpLink {
    fn spawn(
        addr: EndpointAddress,
        stream: TcpStream,
        registry: ConnectionRegistry,
        idle_timeout: Duration,
    ) -> (Arc<Self>, oneshot::Receiver<()>) {
        let (read_half, write_half) = stream.into_split();
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (closed, closed_rx) = watch::channel(false);
        let (greeted_tx, greeted_rx) = oneshot::channel();

        let link = Arc::new(Self {
            addr,
            active: AtomicBool::new(true),
            outbound,
            closed,
        });

        tokio::spawn(writer(write_half, outbound_rx, closed_rx.clone()));
        tokio::spawn(reader(
            link.clone(),
            read_half,
            registry,
            idle_timeout,
            greeted_tx,
            closed_rx,
        ));
        (link, greeted_rx)
    }
}

impl Connection for TcpLink {
    fn remote_address(&self) -> &EndpointAddress {
        &self.addr
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    fn send(&self, payload: Bytes) -> anyhow::Result<()> {
        if !self.is_active() {
            anyhow::bail!("link to {} is closed", self.addr);
        }
        self.outbound
            .send(payload)
            .map_err(|_| anyhow::anyhow!("writer for {} has exited", self.addr))
    }

    fn close(&self) {
        self.active.store(false, Ordering::Release);
        let _ = self.closed.send(true);
    }
}

async fn writer(
    mut half: OwnedWriteHalf,
    mut outbound: mpsc::UnboundedReceiver<Bytes>,
    mut closed: watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            _ = closed.changed() => break,
            next = outbound.recv() => {
                let Some(bytes) = next else { break };
                if let Err(e) = half.write_all(&bytes).await {
                    tracing::debug!(error = %e, "write failed");
                    break;
                }
            }
        }
    }
    let _ = half.shutdown().await;
}

async fn reader(
    link: Arc<TcpLink>,
    mut half: OwnedReadHalf,
    registry: ConnectionRegistry,
    idle_timeout: Duration,
    greeted: oneshot::Sender<()>,
    mut closed: watch::Receiver<bool>,
) {
    let mut greeted = Some(greeted);
    loop {
        tokio::select! {
            _ = closed.changed() => break,
            read = tokio::time::timeout(idle_timeout, frame::read_frame(&mut half)) => {
                match read {
                    Ok(Ok(Some(payload))) => {
                        if let Some(tx) = greeted.take() {
                            let _ = tx.send(());
                        }
                        tracing::trace!(peer = %link.addr, len = payload.len(), "frame received");
                    }
                    Ok(Ok(None)) => {
                        tracing::debug!(peer = %link.addr, "peer closed link");
                        break;
                    }
                    Ok(Err(e)) => {
                        tracing::warn!(peer = %link.addr, error = %e, "read failed");
                        break;
                    }
                    Err(_) => {
                        tracing::warn!(peer = %link.addr, idle = ?idle_timeout, "link idle, closing");
                        break;
                    }
                }
            }
        }
    }

    link.close();
    let handle: ConnectionHandle = link.clone();
    registry.on_disconnected(&link.addr, &handle);
}
