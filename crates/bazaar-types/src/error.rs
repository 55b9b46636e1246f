use thiserror::Error;

#[derive(Error, Debug)]
pub enum BazaarError {
    #[error("Invalid message format: {0}")]
    InvalidMessage(String),

    #[error("Signature verification failed")]
    SignatureVerification,

    #[error("Protocol version mismatch: got {got}, expected {expected}")]
    VersionMismatch { got: u32, expected: u32 },

    #[error("Invalid node address: {0}")]
    InvalidAddress(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Trade protocol error: {0}")]
    Trade(String),

    #[error("Crypto error: {0}")]
    Crypto(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for BazaarError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BazaarError>;
