use crate::envelope::Envelope;
use crate::transport::Transport;
use bazaar_types::NodeAddress;
use std::sync::Arc;
use tracing::{debug, warn};

/// Disseminates a message to the currently connected peer set.
///
/// Delivery to each peer is best-effort; per-peer failures are logged and
/// never fail the broadcast as a whole. Ordering across peers is not
/// guaranteed.
pub struct Broadcaster {
    transport: Arc<dyn Transport>,
}

impl Broadcaster {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Send `envelope` to every connected peer except `exclude`.
    ///
    /// Returns the number of peers the message was handed to.
    pub async fn broadcast(
        &self,
        envelope: Envelope,
        sender: &NodeAddress,
        exclude: Option<&NodeAddress>,
        is_data_owner: bool,
    ) -> usize {
        let peers = self.transport.connected_peers().await;
        let mut sent = 0;

        for peer in &peers {
            if peer == sender {
                continue;
            }
            if exclude.is_some_and(|ex| ex == peer) {
                continue;
            }
            match self.transport.send(peer, envelope.clone()).await {
                Ok(()) => sent += 1,
                Err(e) => {
                    warn!(
                        peer = %peer,
                        kind = envelope.kind.name(),
                        error = %e,
                        "Broadcast to peer failed"
                    );
                }
            }
        }

        debug!(
            kind = envelope.kind.name(),
            num_peers = peers.len(),
            num_broadcasts = sent,
            is_data_owner = is_data_owner,
            "Broadcast finished"
        );
        sent
    }
}
