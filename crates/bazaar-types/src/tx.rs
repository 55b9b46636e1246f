use blake3::Hasher;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a ledger transaction.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TxId([u8; 32]);

impl TxId {
    pub fn new(raw_tx: &[u8]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(raw_tx);
        Self(hasher.finalize().into())
    }

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

impl fmt::Debug for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TxId({}...)", &self.to_hex()[..8])
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

/// A ledger transaction as this core sees it: an opaque byte blob plus the
/// metadata the trade protocol needs. Script construction and validation
/// live in the wallet collaborator.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxId,
    pub raw: Vec<u8>,
    /// Target chain height before which this tx must not be broadcast.
    pub lock_time_height: u64,
}

impl Transaction {
    pub fn new(raw: Vec<u8>) -> Self {
        Self {
            id: TxId::new(&raw),
            raw,
            lock_time_height: 0,
        }
    }

    pub fn with_lock_time(mut self, height: u64) -> Self {
        self.lock_time_height = height;
        self
    }
}

/// A raw funding input contributed to the multi-signature deposit tx.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RawInput {
    pub parent_tx_id: TxId,
    pub output_index: u32,
    pub value: u64,
}

/// Change data left over after a party selects its deposit inputs.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct ChangeOutput {
    pub value: u64,
    pub address: String,
}

/// Inputs and change as returned by the wallet for one party.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InputsAndChangeOutput {
    pub raw_inputs: Vec<RawInput>,
    pub change_output: Option<ChangeOutput>,
}
