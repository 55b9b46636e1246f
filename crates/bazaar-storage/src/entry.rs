use bazaar_crypto::{verify_signature, Keypair};
use bazaar_types::{
    PayloadId, ProtocolVersion, PublicKey, Result, Signature, StoragePayload,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default lifetime of a flooded entry.
pub const DEFAULT_TTL: Duration = Duration::from_secs(6 * 60 * 60);

/// Mailbox entries live longer so an offline receiver has time to return.
pub const MAILBOX_TTL: Duration = Duration::from_secs(15 * 24 * 60 * 60);

/// A signed, sequence-numbered, time-limited record: the unit of
/// replication. The signature covers `(payload, sequence_number)` so a
/// replayed entry cannot be re-published under a different number.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct ProtectedStorageEntry {
    pub version: ProtocolVersion,
    pub payload: StoragePayload,
    pub owner_pub_key: PublicKey,
    pub sequence_number: u64,
    pub signature: Signature,
    pub ttl_secs: u64,
}

impl ProtectedStorageEntry {
    pub fn new_signed(
        payload: StoragePayload,
        sequence_number: u64,
        ttl: Duration,
        owner: &Keypair,
    ) -> Result<Self> {
        let signature = owner.sign(&signing_bytes(&payload, sequence_number)?);
        Ok(Self {
            version: ProtocolVersion::current(),
            payload,
            owner_pub_key: *owner.public_key(),
            sequence_number,
            signature,
            ttl_secs: ttl.as_secs(),
        })
    }

    pub fn payload_id(&self) -> PayloadId {
        self.payload.id()
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    /// Check the signature over `(payload, sequence_number)` against the
    /// owner key.
    pub fn verify(&self) -> bool {
        match signing_bytes(&self.payload, self.sequence_number) {
            Ok(bytes) => verify_signature(&self.owner_pub_key, &bytes, &self.signature),
            Err(_) => false,
        }
    }

    /// For announcements the claimed owner must be the announced signing
    /// key, so a third party cannot republish someone else's payload under
    /// its own key.
    pub fn owner_matches_payload(&self) -> bool {
        match &self.payload {
            StoragePayload::Announcement(ann) => {
                ann.pub_key_ring.signing_pub_key == self.owner_pub_key
            }
            StoragePayload::Mailbox(_) => true,
        }
    }
}

/// A `ProtectedStorageEntry` additionally bound to one receiver.
///
/// The payload is sealed to the receiver's encryption key; the
/// `receiver_pub_key` here is the receiver's signing key, which authorizes
/// the removal once the entry has been retrieved.
#[derive(Clone, PartialEq, Debug, Serialize, Deserialize)]
pub struct MailboxEntry {
    pub entry: ProtectedStorageEntry,
    pub receiver_pub_key: PublicKey,
}

impl MailboxEntry {
    pub fn new_signed(
        payload: StoragePayload,
        sequence_number: u64,
        owner: &Keypair,
        receiver_pub_key: PublicKey,
    ) -> Result<Self> {
        let entry = ProtectedStorageEntry::new_signed(payload, sequence_number, MAILBOX_TTL, owner)?;
        Ok(Self {
            entry,
            receiver_pub_key,
        })
    }

    pub fn payload_id(&self) -> PayloadId {
        self.entry.payload_id()
    }

    pub fn verify(&self) -> bool {
        self.entry.verify()
    }
}

/// Canonical bytes covered by an entry signature.
pub fn signing_bytes(payload: &StoragePayload, sequence_number: u64) -> Result<Vec<u8>> {
    let mut bytes = serde_json::to_vec(payload)?;
    bytes.extend_from_slice(&sequence_number.to_le_bytes());
    Ok(bytes)
}
