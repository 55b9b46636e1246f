use async_trait::async_trait;
use bazaar_network::P2PService;
use bazaar_types::{NodeAddress, PubKeyRing, Result, TradeMessage};
use std::sync::Arc;

/// Outbound message boundary of the trade engine: deliver one message to
/// the counterparty, directly or via its mailbox.
#[async_trait]
pub trait TradeMessenger: Send + Sync {
    async fn send(&self, message: TradeMessage) -> Result<()>;
}

/// Production messenger: routes through the P2P service to the trade's
/// counterparty.
pub struct P2PMessenger {
    service: Arc<P2PService>,
    peer_address: NodeAddress,
    peer_keys: PubKeyRing,
}

impl P2PMessenger {
    pub fn new(service: Arc<P2PService>, peer_address: NodeAddress, peer_keys: PubKeyRing) -> Self {
        Self {
            service,
            peer_address,
            peer_keys,
        }
    }
}

#[async_trait]
impl TradeMessenger for P2PMessenger {
    async fn send(&self, message: TradeMessage) -> Result<()> {
        self.service
            .send_message(&self.peer_address, &self.peer_keys, &message)
            .await
    }
}
