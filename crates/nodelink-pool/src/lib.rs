//! nodelink-pool: the connection pool and peer selection engine.
//!
//! A pool keeps one live link per configured peer node. Links are dialed in
//! parallel at startup, repaired by a periodic reconnect loop, kept warm by a
//! periodic heartbeat loop, and handed out to callers by a selector that
//! prefers the most caught-up peers.

pub mod connector;
pub mod error;
pub mod heartbeat;
pub mod pool;
pub mod reconnect;
pub mod registry;
pub mod selector;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

pub use connector::{connect_all, ConnectReport};
pub use error::{AttemptError, PoolError};
pub use heartbeat::HeartbeatFn;
pub use pool::{ChannelPool, PeriodicTasks, PoolSettings};
pub use reconnect::Reconnector;
pub use registry::ConnectionRegistry;
pub use selector::select;
pub use transport::{activate, Connection, ConnectionHandle, LinkTimeouts, Transport};
