//! Hybrid encryption for mailbox payloads: ephemeral X25519 key agreement,
//! AES-256-GCM for the payload, ed25519 signature over the ciphertext.

use crate::{verify_signature, EncryptionKeypair, KeyRing};
use aes_gcm::{
    aead::{Aead, KeyInit},
    Aes256Gcm, Key, Nonce,
};
use bazaar_types::{
    BazaarError, EncryptionPubKey, ProtocolVersion, Result, SealedAndSigned,
};
use rand::rngs::OsRng;
use rand::RngCore;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};

const NONCE_LEN: usize = 12;

/// Seal `plaintext` to the receiver's encryption key and sign the result
/// with our signing key.
pub fn seal_and_sign(
    key_ring: &KeyRing,
    receiver_key: &EncryptionPubKey,
    plaintext: &[u8],
) -> Result<SealedAndSigned> {
    let ephemeral = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_pub = X25519PublicKey::from(&ephemeral);

    let peer_key = X25519PublicKey::from(*receiver_key.as_bytes());
    let shared = ephemeral.diffie_hellman(&peer_key);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(shared.as_bytes()));
    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| BazaarError::Crypto(format!("encryption failed: {}", e)))?;

    // Prepend nonce to ciphertext
    let mut sealed = nonce_bytes.to_vec();
    sealed.append(&mut ciphertext);

    let signature = key_ring.signing.sign(&sealed);

    Ok(SealedAndSigned {
        version: ProtocolVersion::current(),
        ephemeral_pub_key: EncryptionPubKey::from_bytes(ephemeral_pub.to_bytes()),
        ciphertext: sealed,
        signature,
        sig_pub_key: *key_ring.signing.public_key(),
    })
}

/// Verify the sender's signature and decrypt a sealed payload with our
/// static encryption key. Fails if we are not the intended receiver.
pub fn open_sealed(receiver: &EncryptionKeypair, sealed: &SealedAndSigned) -> Result<Vec<u8>> {
    sealed.version.check()?;

    if !verify_signature(&sealed.sig_pub_key, &sealed.ciphertext, &sealed.signature) {
        return Err(BazaarError::SignatureVerification);
    }

    if sealed.ciphertext.len() < NONCE_LEN {
        return Err(BazaarError::Crypto("ciphertext too short".to_string()));
    }

    let shared = receiver.diffie_hellman(&sealed.ephemeral_pub_key);
    let (nonce_bytes, actual_ciphertext) = sealed.ciphertext.split_at(NONCE_LEN);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&shared));
    let nonce = Nonce::from_slice(nonce_bytes);

    cipher
        .decrypt(nonce, actual_ciphertext)
        .map_err(|e| BazaarError::Crypto(format!("decryption failed: {}", e)))
}
