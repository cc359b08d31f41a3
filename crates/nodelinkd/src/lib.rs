//! nodelinkd internals: the TCP transport and framing the daemon plugs
//! into the pool.

pub mod frame;
pub mod tcp;

pub use tcp::{TcpLink, TcpTransport};
