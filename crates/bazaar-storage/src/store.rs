use crate::entry::{MailboxEntry, ProtectedStorageEntry};
use bazaar_types::{PayloadId, PublicKey};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, info, warn};

/// Emitted whenever the local store accepts an operation, so the network
/// layer can re-broadcast it to connected peers.
#[derive(Clone, Debug)]
pub enum StorageEvent {
    EntryAdded(ProtectedStorageEntry),
    MailboxAdded(MailboxEntry),
    EntryRemoved(ProtectedStorageEntry),
    MailboxRemoved(MailboxEntry),
}

enum Slot {
    Protected {
        entry: ProtectedStorageEntry,
        expires_at: Instant,
    },
    Mailbox {
        entry: MailboxEntry,
        expires_at: Instant,
    },
    /// A removed slot keeps its sequence number until the TTL elapses so a
    /// stale add cannot resurrect it.
    Tombstone {
        sequence_number: u64,
        owner_pub_key: PublicKey,
        expires_at: Instant,
    },
}

impl Slot {
    fn sequence_number(&self) -> u64 {
        match self {
            Slot::Protected { entry, .. } => entry.sequence_number,
            Slot::Mailbox { entry, .. } => entry.entry.sequence_number,
            Slot::Tombstone {
                sequence_number, ..
            } => *sequence_number,
        }
    }

    fn owner_pub_key(&self) -> &PublicKey {
        match self {
            Slot::Protected { entry, .. } => &entry.owner_pub_key,
            Slot::Mailbox { entry, .. } => &entry.entry.owner_pub_key,
            Slot::Tombstone { owner_pub_key, .. } => owner_pub_key,
        }
    }

    fn expires_at(&self) -> Instant {
        match self {
            Slot::Protected { expires_at, .. }
            | Slot::Mailbox { expires_at, .. }
            | Slot::Tombstone { expires_at, .. } => *expires_at,
        }
    }
}

/// Replicated entry store.
///
/// Acceptance is a monotonic sequence-number comparison per payload
/// identity, so peers that see the same set of operations converge
/// regardless of delivery order. Stale or duplicate deliveries are expected
/// under flooding and are dropped silently.
pub struct P2PDataStorage {
    map: RwLock<HashMap<PayloadId, Slot>>,
    my_sequence_numbers: RwLock<HashMap<PayloadId, u64>>,
    event_tx: mpsc::UnboundedSender<StorageEvent>,
}

impl P2PDataStorage {
    pub fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<StorageEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                map: RwLock::new(HashMap::new()),
                my_sequence_numbers: RwLock::new(HashMap::new()),
                event_tx,
            }),
            event_rx,
        )
    }

    /// Next sequence number for an operation we publish on this payload
    /// identity. Starts at 1 and increases on every add/remove we issue.
    pub async fn next_sequence_number(&self, payload_id: PayloadId) -> u64 {
        let mut numbers = self.my_sequence_numbers.write().await;
        let next = numbers.entry(payload_id).or_insert(0);
        *next += 1;
        *next
    }

    /// Accept a flooded entry if it is authentic and fresh.
    ///
    /// Returns `true` when the entry was stored. Rejection is not an error:
    /// duplicate and stale deliveries are normal under flooding.
    pub async fn add(&self, entry: ProtectedStorageEntry) -> bool {
        if !self.verify_entry(&entry) {
            return false;
        }

        let payload_id = entry.payload_id();
        let mut map = self.map.write().await;

        if let Some(slot) = map.get(&payload_id) {
            if entry.sequence_number <= slot.sequence_number() {
                debug!(
                    payload_id = %payload_id,
                    candidate_seq = entry.sequence_number,
                    stored_seq = slot.sequence_number(),
                    "Stale entry dropped"
                );
                return false;
            }
        }

        let expires_at = Instant::now() + entry.ttl();
        debug!(
            payload_id = %payload_id,
            sequence_number = entry.sequence_number,
            owner = %entry.owner_pub_key,
            "Entry accepted"
        );
        map.insert(
            payload_id,
            Slot::Protected {
                entry: entry.clone(),
                expires_at,
            },
        );
        drop(map);

        let _ = self.event_tx.send(StorageEvent::EntryAdded(entry));
        true
    }

    /// Accept a mailbox entry, additionally keyed by its receiver.
    pub async fn add_mailbox(&self, entry: MailboxEntry) -> bool {
        if !entry.verify() {
            debug!(payload_id = %entry.payload_id(), "Mailbox entry with bad signature dropped");
            return false;
        }

        let payload_id = entry.payload_id();
        let mut map = self.map.write().await;

        if let Some(slot) = map.get(&payload_id) {
            if entry.entry.sequence_number <= slot.sequence_number() {
                debug!(
                    payload_id = %payload_id,
                    candidate_seq = entry.entry.sequence_number,
                    stored_seq = slot.sequence_number(),
                    "Stale mailbox entry dropped"
                );
                return false;
            }
        }

        let expires_at = Instant::now() + entry.entry.ttl();
        debug!(
            payload_id = %payload_id,
            receiver = %entry.receiver_pub_key,
            sequence_number = entry.entry.sequence_number,
            "Mailbox entry accepted"
        );
        map.insert(
            payload_id,
            Slot::Mailbox {
                entry: entry.clone(),
                expires_at,
            },
        );
        drop(map);

        let _ = self.event_tx.send(StorageEvent::MailboxAdded(entry));
        true
    }

    /// Apply a sequence-numbered remove operation.
    ///
    /// The same gating as `add` applies, so an old remove cannot erase a
    /// newer add. The slot is replaced by a tombstone keeping the remove's
    /// sequence number until the TTL elapses.
    pub async fn remove(&self, op: ProtectedStorageEntry) -> bool {
        if !self.verify_entry(&op) {
            return false;
        }

        let payload_id = op.payload_id();
        let mut map = self.map.write().await;

        let slot = match map.get(&payload_id) {
            Some(slot) => slot,
            None => {
                debug!(payload_id = %payload_id, "Remove ignored, no entry for payload");
                return false;
            }
        };

        if op.sequence_number <= slot.sequence_number() {
            debug!(
                payload_id = %payload_id,
                candidate_seq = op.sequence_number,
                stored_seq = slot.sequence_number(),
                "Stale remove dropped"
            );
            return false;
        }

        if slot.owner_pub_key() != &op.owner_pub_key {
            warn!(
                payload_id = %payload_id,
                "Remove signed by a key other than the stored owner, dropped"
            );
            return false;
        }

        map.insert(
            payload_id,
            Slot::Tombstone {
                sequence_number: op.sequence_number,
                owner_pub_key: op.owner_pub_key,
                expires_at: Instant::now() + op.ttl(),
            },
        );
        drop(map);

        info!(payload_id = %payload_id, "Entry removed");
        let _ = self.event_tx.send(StorageEvent::EntryRemoved(op));
        true
    }

    /// Apply a mailbox remove. Only the receiver may issue it: the
    /// operation must be signed by the receiver key the entry was bound to.
    pub async fn remove_mailbox(&self, op: MailboxEntry) -> bool {
        if !op.verify() {
            return false;
        }
        if op.entry.owner_pub_key != op.receiver_pub_key {
            warn!(
                payload_id = %op.payload_id(),
                "Mailbox remove not signed by its receiver, dropped"
            );
            return false;
        }

        let payload_id = op.payload_id();
        let mut map = self.map.write().await;

        let slot = match map.get(&payload_id) {
            Some(slot) => slot,
            None => {
                debug!(payload_id = %payload_id, "Mailbox remove ignored, no entry");
                return false;
            }
        };

        if op.entry.sequence_number <= slot.sequence_number() {
            debug!(payload_id = %payload_id, "Stale mailbox remove dropped");
            return false;
        }

        if let Slot::Mailbox { entry, .. } = slot {
            if entry.receiver_pub_key != op.receiver_pub_key {
                warn!(payload_id = %payload_id, "Mailbox remove for a different receiver, dropped");
                return false;
            }
        }

        map.insert(
            payload_id,
            Slot::Tombstone {
                sequence_number: op.entry.sequence_number,
                owner_pub_key: op.entry.owner_pub_key,
                expires_at: Instant::now() + op.entry.ttl(),
            },
        );
        drop(map);

        info!(payload_id = %payload_id, "Mailbox entry removed");
        let _ = self.event_tx.send(StorageEvent::MailboxRemoved(op));
        true
    }

    /// Mailbox entries currently stored for the given receiver key.
    pub async fn mailbox_entries_for(&self, receiver: &PublicKey) -> Vec<MailboxEntry> {
        let map = self.map.read().await;
        let now = Instant::now();
        map.values()
            .filter_map(|slot| match slot {
                Slot::Mailbox { entry, expires_at }
                    if &entry.receiver_pub_key == receiver && *expires_at > now =>
                {
                    Some(entry.clone())
                }
                _ => None,
            })
            .collect()
    }

    /// The stored entry for a payload identity, if an active one exists.
    pub async fn get(&self, payload_id: &PayloadId) -> Option<ProtectedStorageEntry> {
        let map = self.map.read().await;
        match map.get(payload_id) {
            Some(Slot::Protected { entry, .. }) => Some(entry.clone()),
            Some(Slot::Mailbox { entry, .. }) => Some(entry.entry.clone()),
            _ => None,
        }
    }

    /// Every active entry, split by kind. Used to answer a peer's initial
    /// data request after it (re)connects.
    pub async fn all_entries(&self) -> (Vec<ProtectedStorageEntry>, Vec<MailboxEntry>) {
        let map = self.map.read().await;
        let now = Instant::now();
        let mut entries = Vec::new();
        let mut mailbox_entries = Vec::new();
        for slot in map.values() {
            match slot {
                Slot::Protected { entry, expires_at } if *expires_at > now => {
                    entries.push(entry.clone());
                }
                Slot::Mailbox { entry, expires_at } if *expires_at > now => {
                    mailbox_entries.push(entry.clone());
                }
                _ => {}
            }
        }
        (entries, mailbox_entries)
    }

    /// Number of active (non-tombstone) entries.
    pub async fn len(&self) -> usize {
        let map = self.map.read().await;
        map.values()
            .filter(|slot| !matches!(slot, Slot::Tombstone { .. }))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Evict every slot whose TTL elapsed, regardless of sequence number.
    pub async fn purge_expired(&self) -> usize {
        let mut map = self.map.write().await;
        let now = Instant::now();
        let before = map.len();
        map.retain(|_, slot| slot.expires_at() > now);
        let purged = before - map.len();
        if purged > 0 {
            debug!(purged = purged, remaining = map.len(), "Expired entries purged");
        }
        purged
    }

    /// Background purge sweep on a fixed interval.
    pub fn start_purge_task(self: &Arc<Self>, interval: Duration) -> tokio::task::JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.purge_expired().await;
            }
        })
    }

    fn verify_entry(&self, entry: &ProtectedStorageEntry) -> bool {
        if entry.version.check().is_err() {
            debug!(payload_id = %entry.payload_id(), "Entry with unknown protocol version dropped");
            return false;
        }
        if !entry.verify() {
            debug!(payload_id = %entry.payload_id(), "Entry with bad signature dropped");
            return false;
        }
        if !entry.owner_matches_payload() {
            debug!(
                payload_id = %entry.payload_id(),
                "Entry owner does not match payload key, dropped"
            );
            return false;
        }
        true
    }
}
