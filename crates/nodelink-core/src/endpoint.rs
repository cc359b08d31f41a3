//! Endpoint catalog: the static list of peer nodes we keep links to.
//!
//! Built once at startup from `"host:port"` strings. Every entry is
//! validated up front: a bad host or port fails the whole catalog, so
//! nothing downstream ever sees a half-built list.

use std::fmt;

use crate::config::ConfigError;

/// A peer node address. Identity (and registry key) is the `host:port` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EndpointAddress {
    pub host: String,
    pub port: u16,
}

impl EndpointAddress {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// Registry key for this endpoint.
    pub fn identity(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Display for EndpointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A catalog entry. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointConfig {
    pub address: EndpointAddress,
    /// Statically provisioned (as opposed to discovered). Always true today.
    pub configured: bool,
}

impl EndpointConfig {
    pub fn identity(&self) -> String {
        self.address.identity()
    }
}

/// Build the endpoint catalog from raw `"host:port"` entries.
///
/// One `EndpointConfig` per input entry, in input order. Duplicates are
/// kept as separate entries.
pub fn build_catalog<S: AsRef<str>>(raw: &[S]) -> Result<Vec<EndpointConfig>, ConfigError> {
    if raw.is_empty() {
        return Err(ConfigError::EmptyCatalog);
    }

    let mut catalog = Vec::with_capacity(raw.len());
    for entry in raw {
        catalog.push(parse_entry(entry.as_ref())?);
    }

    tracing::info!(
        count = catalog.len(),
        endpoints = ?catalog.iter().map(EndpointConfig::identity).collect::<Vec<_>>(),
        "endpoint catalog built"
    );
    Ok(catalog)
}

fn parse_entry(entry: &str) -> Result<EndpointConfig, ConfigError> {
    // Fields past the second are ignored.
    let mut fields = entry.split(':');
    let (Some(host), Some(port)) = (fields.next(), fields.next()) else {
        return Err(ConfigError::MalformedEntry(entry.to_string()));
    };

    if !valid_ipv4_literal(host) {
        return Err(ConfigError::InvalidHost {
            entry: entry.to_string(),
            host: host.to_string(),
        });
    }

    let port = parse_port(port).ok_or_else(|| ConfigError::InvalidPort {
        entry: entry.to_string(),
        port: port.to_string(),
    })?;

    Ok(EndpointConfig {
        address: EndpointAddress::new(host, port),
        configured: true,
    })
}

/// True if `host` looks like a dotted-quad IPv4 literal: four groups of
/// one to three ASCII digits. Octet values are not range-checked.
pub fn valid_ipv4_literal(host: &str) -> bool {
    let mut groups = 0;
    for group in host.split('.') {
        groups += 1;
        if group.is_empty() || group.len() > 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
            return false;
        }
    }
    groups == 4
}

/// True if `port` parses as an integer in `1..=65535`.
pub fn valid_port(port: &str) -> bool {
    parse_port(port).is_some()
}

fn parse_port(port: &str) -> Option<u16> {
    match port.parse::<i64>() {
        Ok(p) if (1..=65535).contains(&p) => Some(p as u16),
        _ => None,
    }
}
