//! In-process transport for tests and local integration runs. The real
//! overlay transport is an external collaborator; this hub gives every
//! registered address a direct channel to every other one.

use crate::envelope::Envelope;
use crate::transport::Transport;
use async_trait::async_trait;
use bazaar_types::{BazaarError, NodeAddress, Result};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{mpsc, RwLock};

pub struct MemoryHub {
    peers: RwLock<HashMap<NodeAddress, mpsc::UnboundedSender<Envelope>>>,
}

impl MemoryHub {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            peers: RwLock::new(HashMap::new()),
        })
    }

    /// Register an address on the hub, returning its transport handle and
    /// the stream of envelopes addressed to it.
    pub async fn register(
        self: &Arc<Self>,
        address: NodeAddress,
    ) -> (Arc<MemoryTransport>, mpsc::UnboundedReceiver<Envelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        self.peers.write().await.insert(address.clone(), tx);
        (
            Arc::new(MemoryTransport {
                hub: Arc::clone(self),
                local: address,
            }),
            rx,
        )
    }

    /// Drop an address, simulating the peer going offline.
    pub async fn disconnect(&self, address: &NodeAddress) {
        self.peers.write().await.remove(address);
    }
}

pub struct MemoryTransport {
    hub: Arc<MemoryHub>,
    local: NodeAddress,
}

#[async_trait]
impl Transport for MemoryTransport {
    fn local_address(&self) -> NodeAddress {
        self.local.clone()
    }

    async fn connected_peers(&self) -> Vec<NodeAddress> {
        self.hub
            .peers
            .read()
            .await
            .keys()
            .filter(|addr| **addr != self.local)
            .cloned()
            .collect()
    }

    async fn send(&self, peer: &NodeAddress, envelope: Envelope) -> Result<()> {
        let peers = self.hub.peers.read().await;
        let tx = peers
            .get(peer)
            .ok_or_else(|| BazaarError::Network(format!("peer {} not connected", peer)))?;
        tx.send(envelope)
            .map_err(|_| BazaarError::Network(format!("peer {} hung up", peer)))
    }
}
