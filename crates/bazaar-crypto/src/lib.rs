pub mod sealed;

use bazaar_types::{BazaarError, EncryptionPubKey, PubKeyRing, PublicKey, Result, Signature};
use ed25519_dalek::{Signature as DalekSignature, Signer, SigningKey, Verifier, VerifyingKey};
use rand::rngs::OsRng;
use x25519_dalek::{PublicKey as X25519PublicKey, StaticSecret};

pub use sealed::{open_sealed, seal_and_sign};

/// A keypair for signing and verification
#[derive(Clone)]
pub struct Keypair {
    signing_key: SigningKey,
    public_key: PublicKey,
}

impl Keypair {
    /// Generate a new random keypair
    pub fn generate() -> Self {
        let signing_key = SigningKey::generate(&mut OsRng);
        let verifying_key = signing_key.verifying_key();
        let public_key = PublicKey::from_bytes(verifying_key.to_bytes());

        Self {
            signing_key,
            public_key,
        }
    }

    /// Create a keypair from bytes (32 bytes for private key)
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(BazaarError::Crypto("Invalid key length".to_string()));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(bytes);

        let signing_key = SigningKey::from_bytes(&key_bytes);
        let verifying_key = signing_key.verifying_key();
        let public_key = PublicKey::from_bytes(verifying_key.to_bytes());

        Ok(Self {
            signing_key,
            public_key,
        })
    }

    /// Get the public key
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    /// Sign a message
    pub fn sign(&self, message: &[u8]) -> Signature {
        let signature = self.signing_key.sign(message);
        Signature::new(signature.to_bytes().to_vec())
    }

    /// Export keypair as bytes (private key only, public can be derived)
    pub fn to_bytes(&self) -> Vec<u8> {
        self.signing_key.to_bytes().to_vec()
    }
}

/// Static X25519 keypair used to open mailbox payloads sealed to us.
#[derive(Clone)]
pub struct EncryptionKeypair {
    secret: StaticSecret,
    public_key: EncryptionPubKey,
}

impl EncryptionKeypair {
    pub fn generate() -> Self {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public_key = EncryptionPubKey::from_bytes(X25519PublicKey::from(&secret).to_bytes());

        Self { secret, public_key }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != 32 {
            return Err(BazaarError::Crypto("Invalid key length".to_string()));
        }

        let mut key_bytes = [0u8; 32];
        key_bytes.copy_from_slice(bytes);

        let secret = StaticSecret::from(key_bytes);
        let public_key = EncryptionPubKey::from_bytes(X25519PublicKey::from(&secret).to_bytes());

        Ok(Self { secret, public_key })
    }

    pub fn public_key(&self) -> &EncryptionPubKey {
        &self.public_key
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        self.secret.to_bytes().to_vec()
    }

    /// Compute the shared secret with a peer's (possibly ephemeral) key.
    pub(crate) fn diffie_hellman(&self, peer: &EncryptionPubKey) -> [u8; 32] {
        let peer_key = X25519PublicKey::from(*peer.as_bytes());
        self.secret.diffie_hellman(&peer_key).to_bytes()
    }
}

/// A node's full key ring: one keypair for signing, one for decrypting
/// mailbox payloads addressed to us.
#[derive(Clone)]
pub struct KeyRing {
    pub signing: Keypair,
    pub encryption: EncryptionKeypair,
}

impl KeyRing {
    pub fn generate() -> Self {
        Self {
            signing: Keypair::generate(),
            encryption: EncryptionKeypair::generate(),
        }
    }

    /// The public half announced to peers.
    pub fn pub_key_ring(&self) -> PubKeyRing {
        PubKeyRing {
            signing_pub_key: *self.signing.public_key(),
            encryption_pub_key: *self.encryption.public_key(),
        }
    }
}

/// Verify an ed25519 signature against a public key.
pub fn verify_signature(public_key: &PublicKey, message: &[u8], signature: &Signature) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(public_key.as_bytes()) {
        Ok(k) => k,
        Err(_) => return false,
    };

    let sig_bytes = signature.as_bytes();
    if sig_bytes.len() != 64 {
        return false;
    }

    let mut sig_array = [0u8; 64];
    sig_array.copy_from_slice(sig_bytes);
    let dalek_sig = DalekSignature::from_bytes(&sig_array);

    verifying_key.verify(message, &dalek_sig).is_ok()
}
