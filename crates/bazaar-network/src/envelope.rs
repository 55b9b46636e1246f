use bazaar_storage::{MailboxEntry, ProtectedStorageEntry};
use bazaar_types::{NodeAddress, ProtocolVersion, SealedAndSigned};
use serde::{Deserialize, Serialize};

/// Versioned wire frame carrying one P2P operation between peers.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Envelope {
    pub version: ProtocolVersion,
    pub sender: NodeAddress,
    pub kind: EnvelopeKind,
}

impl Envelope {
    pub fn new(sender: NodeAddress, kind: EnvelopeKind) -> Self {
        Self {
            version: ProtocolVersion::current(),
            sender,
            kind,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum EnvelopeKind {
    AddData(ProtectedStorageEntry),
    AddMailboxData(MailboxEntry),
    RemoveData(ProtectedStorageEntry),
    RemoveMailboxData(MailboxEntry),
    /// Sealed trade message delivered directly to a connected peer.
    DirectMessage(SealedAndSigned),
    /// Ask a peer (typically the seed node) for its current store content.
    GetDataRequest,
    /// Store content returned for a `GetDataRequest`.
    GetDataResponse {
        entries: Vec<ProtectedStorageEntry>,
        mailbox_entries: Vec<MailboxEntry>,
    },
}

impl EnvelopeKind {
    pub fn name(&self) -> &'static str {
        match self {
            EnvelopeKind::AddData(_) => "AddData",
            EnvelopeKind::AddMailboxData(_) => "AddMailboxData",
            EnvelopeKind::RemoveData(_) => "RemoveData",
            EnvelopeKind::RemoveMailboxData(_) => "RemoveMailboxData",
            EnvelopeKind::DirectMessage(_) => "DirectMessage",
            EnvelopeKind::GetDataRequest => "GetDataRequest",
            EnvelopeKind::GetDataResponse { .. } => "GetDataResponse",
        }
    }
}
