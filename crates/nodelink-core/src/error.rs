//! Per-attempt link errors reported by the transport layer.
//!
//! Both are always recovered locally: the connector folds them into an
//! aggregate error list, the reconnect loop logs them and retries next tick.

use std::time::Duration;

use thiserror::Error;

use crate::endpoint::EndpointAddress;

#[derive(Debug, Error)]
pub enum DialError {
    #[error("connect to {endpoint} timed out after {after:?}")]
    TimedOut {
        endpoint: EndpointAddress,
        after: Duration,
    },

    #[error("connect to {endpoint} failed: {source}")]
    Io {
        endpoint: EndpointAddress,
        #[source]
        source: std::io::Error,
    },

    #[error("connect to {endpoint} failed: {reason}")]
    Refused {
        endpoint: EndpointAddress,
        reason: String,
    },
}

#[derive(Debug, Error)]
pub enum HandshakeError {
    #[error("handshake with {endpoint} timed out after {after:?}")]
    TimedOut {
        endpoint: EndpointAddress,
        after: Duration,
    },

    #[error("handshake with {endpoint} failed: {reason}")]
    Failed {
        endpoint: EndpointAddress,
        reason: String,
    },
}
