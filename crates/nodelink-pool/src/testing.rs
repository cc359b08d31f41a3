//! Scripted in-memory transport for unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures::future::BoxFuture;
use futures::FutureExt;

use nodelink_core::{DialError, EndpointAddress, HandshakeError};

use crate::transport::{Connection, ConnectionHandle, Transport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    Succeed,
    /// Succeed after the given delay.
    SlowDial(Duration),
    RefuseDial,
    HangDial,
    FailHandshake,
    HangHandshake,
}

#[derive(Debug)]
pub struct MockConnection {
    addr: EndpointAddress,
    active: AtomicBool,
    sent: Mutex<Vec<Bytes>>,
    fail_sends: AtomicBool,
}

impl MockConnection {
    pub fn new(addr: EndpointAddress) -> Arc<Self> {
        Arc::new(Self {
            addr,
            active: AtomicBool::new(true),
            sent: Mutex::new(Vec::new()),
            fail_sends: AtomicBool::new(false),
        })
    }

    pub fn handle(addr: EndpointAddress) -> ConnectionHandle {
        Self::new(addr)
    }

    pub fn sent(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    pub fn fail_sends(&self) {
        self.fail_sends.store(true, Ordering::SeqCst);
    }
}

impl Connection for MockConnection {
    fn remote_address(&self) -> &EndpointAddress {
        &self.addr
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn send(&self, payload: Bytes) -> anyhow::Result<()> {
        if self.fail_sends.load(Ordering::SeqCst) {
            anyhow::bail!("send failed");
        }
        self.sent.lock().unwrap().push(payload);
        Ok(())
    }

    fn close(&self) {
        self.active.store(false, Ordering::SeqCst);
    }
}

/// Transport whose outcome per endpoint is set by the test.
/// Unscripted endpoints succeed.
#[derive(Default)]
pub struct MockTransport {
    script: Mutex<HashMap<String, Behavior>>,
    dials: AtomicUsize,
    connections: Arc<Mutex<Vec<Arc<MockConnection>>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, endpoint: &EndpointAddress, behavior: Behavior) {
        self.script
            .lock()
            .unwrap()
            .insert(endpoint.identity(), behavior);
    }

    pub fn dials(&self) -> usize {
        self.dials.load(Ordering::SeqCst)
    }

    /// Every link this transport has produced, in dial order.
    pub fn connections(&self) -> Vec<Arc<MockConnection>> {
        self.connections.lock().unwrap().clone()
    }

    fn behavior(&self, endpoint: &EndpointAddress) -> Behavior {
        self.script
            .lock()
            .unwrap()
            .get(&endpoint.identity())
            .copied()
            .unwrap_or(Behavior::Succeed)
    }
}

impl Transport for MockTransport {
    fn dial(
        &self,
        endpoint: &EndpointAddress,
        _timeout: Duration,
    ) -> BoxFuture<'static, Result<ConnectionHandle, DialError>> {
        self.dials.fetch_add(1, Ordering::SeqCst);
        let endpoint = endpoint.clone();
        match self.behavior(&endpoint) {
            Behavior::RefuseDial => async move {
                Err(DialError::Refused {
                    endpoint,
                    reason: "connection refused".into(),
                })
            }
            .boxed(),
            Behavior::HangDial => futures::future::pending().boxed(),
            Behavior::SlowDial(delay) => {
                let connections = self.connections.clone();
                async move {
                    tokio::time::sleep(delay).await;
                    let conn = MockConnection::new(endpoint);
                    connections.lock().unwrap().push(conn.clone());
                    let handle: ConnectionHandle = conn;
                    Ok(handle)
                }
                .boxed()
            }
            _ => {
                let conn = MockConnection::new(endpoint);
                self.connections.lock().unwrap().push(conn.clone());
                let handle: ConnectionHandle = conn;
                async move { Ok(handle) }.boxed()
            }
        }
    }

    fn handshake(
        &self,
        conn: ConnectionHandle,
        _timeout: Duration,
    ) -> BoxFuture<'static, Result<(), HandshakeError>> {
        let endpoint = conn.remote_address().clone();
        match self.behavior(&endpoint) {
            Behavior::FailHandshake => async move {
                Err(HandshakeError::Failed {
                    endpoint,
                    reason: "bad certificate".into(),
                })
            }
            .boxed(),
            Behavior::HangHandshake => futures::future::pending().boxed(),
            _ => async { Ok(()) }.boxed(),
        }
    }
}
