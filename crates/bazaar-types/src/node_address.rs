use crate::{BazaarError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Overlay address of a peer in `HOSTNAME:PORT` form.
///
/// Port 0 means "choose automatically" and is resolved by the environment
/// before the address is announced to other peers.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeAddress {
    pub host_name: String,
    pub port: u16,
}

impl NodeAddress {
    pub fn new(host_name: impl Into<String>, port: u16) -> Self {
        Self {
            host_name: host_name.into(),
            port,
        }
    }

    pub fn is_localhost(&self) -> bool {
        self.host_name == "localhost" || self.host_name == "127.0.0.1"
    }

    /// Full address string, the canonical form used on the wire.
    pub fn full_address(&self) -> String {
        format!("{}:{}", self.host_name, self.port)
    }
}

impl FromStr for NodeAddress {
    type Err = BazaarError;

    fn from_str(s: &str) -> Result<Self> {
        let mut parts = s.splitn(2, ':');
        let host_name = match parts.next() {
            Some(h) if !h.is_empty() => h.to_string(),
            _ => return Err(BazaarError::InvalidAddress(s.to_string())),
        };
        let port = match parts.next() {
            Some(p) => p
                .parse::<u16>()
                .map_err(|_| BazaarError::InvalidAddress(s.to_string()))?,
            None => 0,
        };
        Ok(Self { host_name, port })
    }
}

impl fmt::Display for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_address())
    }
}

impl fmt::Debug for NodeAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeAddress({})", self.full_address())
    }
}
