use crate::keys::{EncryptionPubKey, PubKeyRing, PublicKey, Signature};
use crate::node_address::NodeAddress;
use crate::version::ProtocolVersion;
use blake3::Hasher;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identity of a storage payload: the blake3 hash of its serialized form.
/// Sequence-number gating in the replicated store is keyed by this.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PayloadId([u8; 32]);

impl PayloadId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl fmt::Debug for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PayloadId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for PayloadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A payload encrypted to one receiver and signed by the sender.
///
/// The ciphertext is AES-256-GCM under a key agreed via ephemeral X25519
/// with the receiver's static encryption key; the signature covers the
/// ciphertext and verifies against `sig_pub_key`. Construction and opening
/// live in `bazaar-crypto`; this is only the wire shape.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct SealedAndSigned {
    pub version: ProtocolVersion,
    pub ephemeral_pub_key: EncryptionPubKey,
    pub ciphertext: Vec<u8>,
    pub signature: Signature,
    pub sig_pub_key: PublicKey,
}

/// Periodic announcement of a node's address and public keys so that other
/// peers can verify its signatures and seal mailbox payloads to it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Announcement {
    pub version: ProtocolVersion,
    pub node_address: NodeAddress,
    pub pub_key_ring: PubKeyRing,
    pub timestamp: DateTime<Utc>,
}

/// Everything the replicated store can hold.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum StoragePayload {
    /// Store-and-forward message addressed to one offline receiver.
    Mailbox(SealedAndSigned),
    /// Flooded node announcement.
    Announcement(Announcement),
}

impl StoragePayload {
    /// Payload identity used for sequence-number gating. Two payloads with
    /// identical serialized bytes share a slot in the store.
    pub fn id(&self) -> PayloadId {
        // Serialization of these enums is deterministic: field order is
        // declaration order and there are no maps involved.
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Hasher::new();
        hasher.update(&bytes);
        PayloadId(hasher.finalize().into())
    }
}
