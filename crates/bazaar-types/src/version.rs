use crate::{BazaarError, Result};
use serde::{Deserialize, Serialize};

/// Version of the P2P wire protocol. Bumped on every incompatible change to
/// a message or storage entry layout.
pub const P2P_NETWORK_VERSION: u32 = 1;

/// Explicit protocol-version tag carried by every wire message and storage
/// entry, checked at deserialization boundaries.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ProtocolVersion(pub u32);

impl ProtocolVersion {
    pub fn current() -> Self {
        Self(P2P_NETWORK_VERSION)
    }

    pub fn check(&self) -> Result<()> {
        if self.0 != P2P_NETWORK_VERSION {
            return Err(BazaarError::VersionMismatch {
                got: self.0,
                expected: P2P_NETWORK_VERSION,
            });
        }
        Ok(())
    }
}

impl Default for ProtocolVersion {
    fn default() -> Self {
        Self::current()
    }
}
