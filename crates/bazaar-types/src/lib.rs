pub mod error;
pub mod keys;
pub mod message;
pub mod node_address;
pub mod payload;
pub mod tx;
pub mod version;

pub use error::{BazaarError, Result};
pub use keys::{EncryptionPubKey, PubKeyRing, PublicKey, Signature};
pub use message::{TradeMessage, TradeMessageBody};
pub use node_address::NodeAddress;
pub use payload::{Announcement, PayloadId, SealedAndSigned, StoragePayload};
pub use tx::{ChangeOutput, InputsAndChangeOutput, RawInput, Transaction, TxId};
pub use version::{ProtocolVersion, P2P_NETWORK_VERSION};
