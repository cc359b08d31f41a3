//! nodelink-core: endpoint catalog, tunables, and the shared error types.
//! The pool and the daemon both depend on this one.

pub mod config;
pub mod endpoint;
pub mod error;

pub use config::{ConfigError, NodelinkConfig};
pub use endpoint::{build_catalog, valid_ipv4_literal, valid_port, EndpointAddress, EndpointConfig};
pub use error::{DialError, HandshakeError};
