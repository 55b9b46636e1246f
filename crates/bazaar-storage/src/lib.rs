pub mod entry;
pub mod store;

pub use entry::{signing_bytes, MailboxEntry, ProtectedStorageEntry, DEFAULT_TTL, MAILBOX_TTL};
pub use store::{P2PDataStorage, StorageEvent};
