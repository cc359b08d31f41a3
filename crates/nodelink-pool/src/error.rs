use thiserror::Error;

use nodelink_core::{DialError, HandshakeError};

/// Why a single dial-and-handshake attempt failed.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error(transparent)]
    Dial(#[from] DialError),

    #[error(transparent)]
    Handshake(#[from] HandshakeError),
}

#[derive(Debug, Error)]
pub enum PoolError {
    /// Every startup attempt failed. One error string per failed attempt,
    /// in catalog order.
    #[error("failed to connect to nodes: {errors:?}")]
    NoConnectionEstablished { errors: Vec<String> },

    /// The pool currently holds no active link. Callers retry later.
    #[error("no active connection available")]
    NoActiveConnection,
}
