use crate::broadcaster::Broadcaster;
use crate::envelope::{Envelope, EnvelopeKind};
use crate::transport::{LifecycleEvent, Transport};
use bazaar_crypto::{open_sealed, seal_and_sign, KeyRing};
use bazaar_storage::{MailboxEntry, P2PDataStorage, ProtectedStorageEntry, StorageEvent, DEFAULT_TTL};
use bazaar_types::{
    Announcement, NodeAddress, ProtocolVersion, PubKeyRing, PublicKey, Result, SealedAndSigned,
    StoragePayload, TradeMessage,
};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// A verified, decrypted protocol message handed to the application layer.
#[derive(Clone, Debug)]
pub struct DecryptedMessage {
    pub sender_sig_key: PublicKey,
    pub message: TradeMessage,
}

/// Facade over storage, broadcaster and transport: the single entry point
/// the trade engine and the node binaries use to talk to the overlay.
pub struct P2PService {
    key_ring: KeyRing,
    storage: Arc<P2PDataStorage>,
    broadcaster: Broadcaster,
    transport: Arc<dyn Transport>,
    message_subscribers: RwLock<Vec<mpsc::UnboundedSender<DecryptedMessage>>>,
    lifecycle_subscribers: RwLock<Vec<mpsc::UnboundedSender<LifecycleEvent>>>,
}

impl P2PService {
    pub fn new(key_ring: KeyRing, transport: Arc<dyn Transport>) -> Arc<Self> {
        let (storage, event_rx) = P2PDataStorage::new();
        let service = Arc::new(Self {
            key_ring,
            storage,
            broadcaster: Broadcaster::new(Arc::clone(&transport)),
            transport,
            message_subscribers: RwLock::new(Vec::new()),
            lifecycle_subscribers: RwLock::new(Vec::new()),
        });

        service.spawn_rebroadcast_loop(event_rx);
        service
    }

    pub fn storage(&self) -> &Arc<P2PDataStorage> {
        &self.storage
    }

    pub fn pub_key_ring(&self) -> PubKeyRing {
        self.key_ring.pub_key_ring()
    }

    pub fn local_address(&self) -> NodeAddress {
        self.transport.local_address()
    }

    /// Stream of decrypted trade messages addressed to this node.
    pub async fn subscribe_messages(&self) -> mpsc::UnboundedReceiver<DecryptedMessage> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.message_subscribers.write().await.push(tx);
        rx
    }

    /// Stream of transport lifecycle events.
    pub async fn subscribe_lifecycle(&self) -> mpsc::UnboundedReceiver<LifecycleEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lifecycle_subscribers.write().await.push(tx);
        rx
    }

    /// Consume the transport's lifecycle channel: forward every event to
    /// subscribers, and fetch our mailbox once bootstrap completes.
    pub fn start(self: &Arc<Self>, mut lifecycle_rx: mpsc::UnboundedReceiver<LifecycleEvent>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = lifecycle_rx.recv().await {
                info!(event = event.name(), "Transport lifecycle event");
                if event == LifecycleEvent::BootstrapComplete {
                    service.retrieve_mailbox().await;
                }
                let mut subs = service.lifecycle_subscribers.write().await;
                subs.retain(|tx| tx.send(event.clone()).is_ok());
            }
        });
    }

    /// Pump envelopes from the transport's inbound channel into
    /// `handle_envelope` until the channel closes.
    pub fn spawn_inbound_loop(
        self: &Arc<Self>,
        mut inbound_rx: mpsc::UnboundedReceiver<Envelope>,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(envelope) = inbound_rx.recv().await {
                if let Err(e) = service.handle_envelope(envelope).await {
                    warn!(error = %e, "Envelope rejected");
                }
            }
        })
    }

    /// Handle one envelope received from a peer.
    pub async fn handle_envelope(&self, envelope: Envelope) -> Result<()> {
        envelope.version.check()?;
        debug!(
            kind = envelope.kind.name(),
            from = %envelope.sender,
            "Envelope received"
        );

        match envelope.kind {
            EnvelopeKind::AddData(entry) => {
                self.storage.add(entry).await;
            }
            EnvelopeKind::AddMailboxData(entry) => {
                let for_us = entry.receiver_pub_key == *self.key_ring.signing.public_key();
                if self.storage.add_mailbox(entry).await && for_us {
                    self.retrieve_mailbox().await;
                }
            }
            EnvelopeKind::RemoveData(op) => {
                self.storage.remove(op).await;
            }
            EnvelopeKind::RemoveMailboxData(op) => {
                self.storage.remove_mailbox(op).await;
            }
            EnvelopeKind::DirectMessage(sealed) => {
                self.open_and_deliver(&sealed).await;
            }
            EnvelopeKind::GetDataRequest => {
                let (entries, mailbox_entries) = self.storage.all_entries().await;
                debug!(
                    peer = %envelope.sender,
                    entries = entries.len(),
                    mailbox_entries = mailbox_entries.len(),
                    "Answering data request"
                );
                let response = Envelope::new(
                    self.local_address(),
                    EnvelopeKind::GetDataResponse {
                        entries,
                        mailbox_entries,
                    },
                );
                self.transport.send(&envelope.sender, response).await?;
            }
            EnvelopeKind::GetDataResponse {
                entries,
                mailbox_entries,
            } => {
                for entry in entries {
                    self.storage.add(entry).await;
                }
                for entry in mailbox_entries {
                    self.storage.add_mailbox(entry).await;
                }
                self.retrieve_mailbox().await;
                let mut subs = self.lifecycle_subscribers.write().await;
                subs.retain(|tx| tx.send(LifecycleEvent::DataReceived).is_ok());
            }
        }
        Ok(())
    }

    /// Ask a peer for its current store content (initial sync after
    /// connecting). The response is handled like any other envelope.
    pub async fn request_data(&self, peer: &NodeAddress) -> Result<()> {
        let envelope = Envelope::new(self.local_address(), EnvelopeKind::GetDataRequest);
        self.transport.send(peer, envelope).await
    }

    /// Send a trade message to a counterparty: directly when it is
    /// connected, otherwise via a mailbox entry flooded through the store.
    pub async fn send_message(
        &self,
        receiver_address: &NodeAddress,
        receiver_keys: &PubKeyRing,
        message: &TradeMessage,
    ) -> Result<()> {
        let plaintext = serde_json::to_vec(message)?;
        let sealed = seal_and_sign(&self.key_ring, &receiver_keys.encryption_pub_key, &plaintext)?;

        let connected = self
            .transport
            .connected_peers()
            .await
            .iter()
            .any(|p| p == receiver_address);

        if connected {
            debug!(
                receiver = %receiver_address,
                body = message.body.name(),
                "Sending direct message"
            );
            let envelope = Envelope::new(
                self.local_address(),
                EnvelopeKind::DirectMessage(sealed),
            );
            return self.transport.send(receiver_address, envelope).await;
        }

        info!(
            receiver = %receiver_address,
            body = message.body.name(),
            "Receiver offline, publishing mailbox entry"
        );
        let payload = StoragePayload::Mailbox(sealed);
        let seq = self.storage.next_sequence_number(payload.id()).await;
        let entry = MailboxEntry::new_signed(
            payload,
            seq,
            &self.key_ring.signing,
            receiver_keys.signing_pub_key,
        )?;
        self.storage.add_mailbox(entry).await;
        Ok(())
    }

    /// Publish our address and public keys so peers can reach us.
    pub async fn announce(&self) -> Result<()> {
        let payload = StoragePayload::Announcement(Announcement {
            version: ProtocolVersion::current(),
            node_address: self.local_address(),
            pub_key_ring: self.pub_key_ring(),
            timestamp: Utc::now(),
        });
        let seq = self.storage.next_sequence_number(payload.id()).await;
        let entry =
            ProtectedStorageEntry::new_signed(payload, seq, DEFAULT_TTL, &self.key_ring.signing)?;
        self.storage.add(entry).await;
        Ok(())
    }

    /// Periodically re-announce ourselves (mirrors the hello broadcast of
    /// the controller peer).
    pub fn start_announcement_task(
        self: &Arc<Self>,
        interval: Duration,
    ) -> tokio::task::JoinHandle<()> {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                if let Err(e) = service.announce().await {
                    warn!(error = %e, "Announcement failed");
                }
            }
        })
    }

    /// Fetch, decrypt and acknowledge every mailbox entry addressed to us.
    /// Each entry is delivered to the application exactly once: the
    /// acknowledging remove wins the sequence-number race before any
    /// duplicate delivery can be accepted again.
    pub async fn retrieve_mailbox(&self) {
        let own_key = *self.key_ring.signing.public_key();
        let entries = self.storage.mailbox_entries_for(&own_key).await;

        for mailbox_entry in entries {
            let StoragePayload::Mailbox(sealed) = &mailbox_entry.entry.payload else {
                continue;
            };
            self.open_and_deliver(sealed).await;

            let ack = MailboxEntry::new_signed(
                mailbox_entry.entry.payload.clone(),
                mailbox_entry.entry.sequence_number + 1,
                &self.key_ring.signing,
                own_key,
            );
            match ack {
                Ok(ack) => {
                    self.storage.remove_mailbox(ack).await;
                }
                Err(e) => warn!(error = %e, "Failed to sign mailbox acknowledgement"),
            }
        }
    }

    async fn open_and_deliver(&self, sealed: &SealedAndSigned) {
        let plaintext = match open_sealed(&self.key_ring.encryption, sealed) {
            Ok(p) => p,
            Err(e) => {
                warn!(error = %e, "Sealed message could not be opened, dropped");
                return;
            }
        };

        let message: TradeMessage = match serde_json::from_slice(&plaintext) {
            Ok(m) => m,
            Err(e) => {
                warn!(error = %e, "Decrypted payload is not a trade message, dropped");
                return;
            }
        };
        if let Err(e) = message.version.check() {
            warn!(error = %e, "Trade message with unknown version, dropped");
            return;
        }

        debug!(
            trade_id = %message.trade_id,
            body = message.body.name(),
            "Trade message delivered"
        );
        let decrypted = DecryptedMessage {
            sender_sig_key: sealed.sig_pub_key,
            message,
        };
        let mut subs = self.message_subscribers.write().await;
        subs.retain(|tx| tx.send(decrypted.clone()).is_ok());
    }

    fn spawn_rebroadcast_loop(self: &Arc<Self>, mut event_rx: mpsc::UnboundedReceiver<StorageEvent>) {
        let service = Arc::clone(self);
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                let (kind, owner) = match event {
                    StorageEvent::EntryAdded(entry) => {
                        let owner = entry.owner_pub_key;
                        (EnvelopeKind::AddData(entry), owner)
                    }
                    StorageEvent::MailboxAdded(entry) => {
                        let owner = entry.entry.owner_pub_key;
                        (EnvelopeKind::AddMailboxData(entry), owner)
                    }
                    StorageEvent::EntryRemoved(op) => {
                        let owner = op.owner_pub_key;
                        (EnvelopeKind::RemoveData(op), owner)
                    }
                    StorageEvent::MailboxRemoved(op) => {
                        let owner = op.entry.owner_pub_key;
                        (EnvelopeKind::RemoveMailboxData(op), owner)
                    }
                };

                let local = service.local_address();
                let is_data_owner = owner == *service.key_ring.signing.public_key();
                let envelope = Envelope::new(local.clone(), kind);
                service
                    .broadcaster
                    .broadcast(envelope, &local, None, is_data_owner)
                    .await;
            }
        });
    }
}
