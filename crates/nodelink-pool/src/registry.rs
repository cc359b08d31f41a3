//! Connection registry: the single source of truth for what is connected.
//!
//! Keyed on endpoint identity (`host:port`). Shared between the connector,
//! the periodic loops, the selector, and transport callbacks. Entries are
//! never mutated in place: a link is retired with a compare-and-remove
//! against the exact handle, so a late disconnect for a replaced link
//! cannot evict its successor.

use std::sync::Arc;

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

use nodelink_core::EndpointAddress;

use crate::transport::ConnectionHandle;

#[derive(Clone, Default)]
pub struct ConnectionRegistry {
    links: Arc<DashMap<String, ConnectionHandle>>,
}

impl ConnectionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, identity: &str) -> Option<ConnectionHandle> {
        self.links.get(identity).map(|e| e.value().clone())
    }

    pub fn lookup(&self, host: &str, port: u16) -> Option<ConnectionHandle> {
        self.get(&format!("{host}:{port}"))
    }

    /// True if `identity` maps to a link that is currently active.
    pub fn has_active(&self, identity: &str) -> bool {
        // Clone out first so `is_active` never runs under a shard lock.
        self.get(identity).is_some_and(|h| h.is_active())
    }

    /// Unconditionally associate `handle` with `identity`, returning the
    /// previous handle if there was one.
    pub fn insert(&self, identity: String, handle: ConnectionHandle) -> Option<ConnectionHandle> {
        self.links.insert(identity, handle)
    }

    /// Insert `handle` unless an active link already holds `identity`.
    ///
    /// An inactive incumbent is replaced. When two attempts race for the
    /// same endpoint exactly one wins; the loser gets its handle back.
    pub fn insert_if_vacant(
        &self,
        identity: String,
        handle: ConnectionHandle,
    ) -> Result<(), ConnectionHandle> {
        match self.links.entry(identity) {
            Entry::Occupied(mut entry) => {
                if entry.get().is_active() {
                    return Err(handle);
                }
                entry.insert(handle);
                Ok(())
            }
            Entry::Vacant(entry) => {
                entry.insert(handle);
                Ok(())
            }
        }
    }

    /// Remove `identity` only if it still maps to exactly `handle`.
    pub fn remove_if_current(&self, identity: &str, handle: &ConnectionHandle) -> bool {
        self.links
            .remove_if(identity, |_, current| Arc::ptr_eq(current, handle))
            .is_some()
    }

    /// Transport callback: a link came up outside the connector.
    pub fn on_connected(&self, endpoint: &EndpointAddress, handle: ConnectionHandle) {
        let identity = endpoint.identity();
        if let Some(previous) = self.insert(identity, handle) {
            tracing::debug!(%endpoint, active = previous.is_active(), "replaced registered link");
        }
    }

    /// Transport callback: a link went down.
    ///
    /// A no-op if the endpoint has since been re-registered with a newer link.
    pub fn on_disconnected(&self, endpoint: &EndpointAddress, handle: &ConnectionHandle) -> bool {
        let removed = self.remove_if_current(&endpoint.identity(), handle);
        tracing::debug!(%endpoint, removed, "link disconnected");
        removed
    }

    /// Point-in-time copy of every entry. Concurrent writers may or may not
    /// be reflected.
    pub fn snapshot(&self) -> Vec<(String, ConnectionHandle)> {
        self.links
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    /// Point-in-time copy of the entries whose link is active.
    pub fn active_entries(&self) -> Vec<(String, ConnectionHandle)> {
        let mut entries = self.snapshot();
        entries.retain(|(_, h)| h.is_active());
        entries
    }

    /// Remove and return everything. Used at shutdown.
    pub fn drain(&self) -> Vec<ConnectionHandle> {
        let keys: Vec<String> = self.links.iter().map(|e| e.key().clone()).collect();
        keys.into_iter()
            .filter_map(|k| self.links.remove(&k).map(|(_, h)| h))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}
