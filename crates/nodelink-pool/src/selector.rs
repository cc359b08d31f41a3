//! Peer selection: picks the link for the next outbound request.
//!
//! Prefer the peers reporting the highest chain height; break ties, and
//! fall back when no height is known for any active peer, with a uniform
//! pick from a cryptographically secure source so an adversarial peer
//! cannot predict or bias which node serves a client.

use std::collections::HashMap;

use rand::rngs::OsRng;
use rand::seq::SliceRandom;
use rand::{CryptoRng, RngCore};

use crate::error::PoolError;
use crate::registry::ConnectionRegistry;
use crate::transport::ConnectionHandle;

/// Select a link using the OS random source.
///
/// `heights` maps endpoint identity (`host:port`) to the peer's last
/// observed chain height. Any `Ord` height type works, including
/// arbitrary-precision integers.
pub fn select<H: Ord>(
    registry: &ConnectionRegistry,
    heights: Option<&HashMap<String, H>>,
) -> Result<ConnectionHandle, PoolError> {
    select_with_rng(registry, heights, &mut OsRng)
}

pub fn select_with_rng<H: Ord, R: RngCore + CryptoRng>(
    registry: &ConnectionRegistry,
    heights: Option<&HashMap<String, H>>,
    rng: &mut R,
) -> Result<ConnectionHandle, PoolError> {
    let active = registry.active_entries();
    if active.is_empty() {
        tracing::error!("no active connection is available, maybe network connection exception");
        return Err(PoolError::NoActiveConnection);
    }

    let freshest = heights.map(|h| highest(&active, h)).unwrap_or_default();
    let pool: Vec<&ConnectionHandle> = if freshest.is_empty() {
        active.iter().map(|(_, conn)| conn).collect()
    } else {
        freshest
    };

    pool.choose(rng)
        .map(|conn| (*conn).clone())
        .ok_or(PoolError::NoActiveConnection)
}

/// Active links whose endpoint reports the maximum height.
///
/// Heights for endpoints with no active link are skipped entirely: they
/// neither join the set nor raise the bar.
fn highest<'a, H: Ord>(
    active: &'a [(String, ConnectionHandle)],
    heights: &HashMap<String, H>,
) -> Vec<&'a ConnectionHandle> {
    let by_identity: HashMap<&str, &ConnectionHandle> =
        active.iter().map(|(id, conn)| (id.as_str(), conn)).collect();

    let mut best: Option<&H> = None;
    let mut tied = Vec::new();
    for (identity, height) in heights {
        let Some(conn) = by_identity.get(identity.as_str()) else {
            continue;
        };
        match best {
            Some(max) if height < max => continue,
            Some(max) if height == max => {}
            _ => {
                tied.clear();
                best = Some(height);
            }
        }
        tied.push(*conn);
    }
    tied
}
