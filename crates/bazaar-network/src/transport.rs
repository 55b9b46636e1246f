use crate::envelope::Envelope;
use async_trait::async_trait;
use bazaar_types::{NodeAddress, Result};

/// Connection substrate boundary.
///
/// The anonymizing overlay (hidden-service setup, connection management,
/// reconnection policy) lives outside this core. This trait is the surface
/// the broadcaster and the P2P service program against.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Our own overlay address as other peers can reach it.
    fn local_address(&self) -> NodeAddress;

    /// Peers we currently hold an open connection to.
    async fn connected_peers(&self) -> Vec<NodeAddress>;

    /// Deliver one envelope to one peer. Best-effort: the transport may
    /// retry internally, but a returned error means this delivery failed.
    async fn send(&self, peer: &NodeAddress, envelope: Envelope) -> Result<()>;
}

/// Transport lifecycle notifications, delivered over a channel instead of
/// registered listener callbacks.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LifecycleEvent {
    TorNodeReady,
    HiddenServicePublished,
    DataReceived,
    BootstrapComplete,
    NoSeedNodeAvailable,
    NoPeersAvailable,
    SetupFailed(String),
}

impl LifecycleEvent {
    /// Stable name used in testbed-style stdout logs.
    pub fn name(&self) -> &'static str {
        match self {
            LifecycleEvent::TorNodeReady => "TOR_READY",
            LifecycleEvent::HiddenServicePublished => "PUBLISHED",
            LifecycleEvent::DataReceived => "DATA_RECEIVED",
            LifecycleEvent::BootstrapComplete => "BOOTSTRAPPED",
            LifecycleEvent::NoSeedNodeAvailable => "NO_SEED_NODE",
            LifecycleEvent::NoPeersAvailable => "NO_PEERS",
            LifecycleEvent::SetupFailed(_) => "SETUP_FAILED",
        }
    }
}
