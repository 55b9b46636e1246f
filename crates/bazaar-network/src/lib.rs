pub mod broadcaster;
pub mod envelope;
pub mod memory_transport;
pub mod p2p_service;
pub mod transport;

pub use broadcaster::Broadcaster;
pub use envelope::{Envelope, EnvelopeKind};
pub use memory_transport::{MemoryHub, MemoryTransport};
pub use p2p_service::{DecryptedMessage, P2PService};
pub use transport::{LifecycleEvent, Transport};
