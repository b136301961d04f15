//! Long-term signing identities and per-handshake ephemeral ECDH keys.

use crate::core::{
    DiffieHellman, SigningKey, SigningPublicKey, SptpsError, ECDH_KEY_SIZE,
    SIGNATURE_SIZE, SIGNING_PUBLIC_KEY_SIZE,
};
use ed25519_dalek::{Signer, Verifier};
use rand::rngs::OsRng;
use x25519_dalek::{EphemeralSecret, PublicKey as X25519PublicKey};
use zeroize::Zeroize;

/// A long-term Ed25519 signing keypair identifying one side of a session.
///
/// The private key is zeroized on drop.
pub struct StaticSigningKeypair {
    signing: ed25519_dalek::SigningKey,
}

impl StaticSigningKeypair {
    /// Generate a new random signing keypair.
    pub fn generate() -> Self {
        let mut csprng = OsRng;
        Self {
            signing: ed25519_dalek::SigningKey::generate(&mut csprng),
        }
    }

    /// Reconstruct a keypair from a 32-byte seed.
    pub fn from_bytes(seed: [u8; 32]) -> Self {
        Self {
            signing: ed25519_dalek::SigningKey::from_bytes(&seed),
        }
    }

    /// The matching public key, as exchanged out-of-band before the
    /// session starts.
    pub fn public_key(&self) -> StaticVerifyingKey {
        StaticVerifyingKey {
            verifying: self.signing.verifying_key(),
        }
    }
}

impl SigningKey for StaticSigningKeypair {
    fn sign(&self, message: &[u8]) -> [u8; SIGNATURE_SIZE] {
        self.signing.sign(message).to_bytes()
    }
}

/// A peer's long-term Ed25519 public key, known out-of-band.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StaticVerifyingKey {
    verifying: ed25519_dalek::VerifyingKey,
}

impl StaticVerifyingKey {
    /// Parse a public key from its wire bytes.
    pub fn from_bytes(bytes: &[u8; SIGNING_PUBLIC_KEY_SIZE]) -> Result<Self, SptpsError> {
        let verifying = ed25519_dalek::VerifyingKey::from_bytes(bytes)
            .map_err(|_| SptpsError::BadSignature)?;
        Ok(Self { verifying })
    }

    /// The raw wire bytes of this public key.
    pub fn to_bytes(&self) -> [u8; SIGNING_PUBLIC_KEY_SIZE] {
        self.verifying.to_bytes()
    }
}

impl SigningPublicKey for StaticVerifyingKey {
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SptpsError> {
        let sig_bytes: [u8; SIGNATURE_SIZE] =
            signature.try_into().map_err(|_| SptpsError::BadSignature)?;
        let sig = ed25519_dalek::Signature::from_bytes(&sig_bytes);
        self.verifying
            .verify(message, &sig)
            .map_err(|_| SptpsError::BadSignature)
    }
}

/// A one-shot X25519 ephemeral keypair, generated fresh for every KEX
/// (including every rekey).
///
/// `EphemeralSecret` is not `Clone`, matching the protocol rule that an
/// ECDH private key is used for exactly one shared-secret computation and
/// discarded immediately afterward.
pub struct EphemeralKeypair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeypair {
    /// Generate a new ephemeral keypair.
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(OsRng);
        let public = X25519PublicKey::from(&secret);
        Self { secret, public }
    }
}

impl DiffieHellman for EphemeralKeypair {
    fn public_bytes(&self) -> [u8; ECDH_KEY_SIZE] {
        self.public.to_bytes()
    }

    fn shared_secret(self, peer_public: &[u8; ECDH_KEY_SIZE]) -> Result<[u8; ECDH_KEY_SIZE], SptpsError> {
        let peer = X25519PublicKey::from(*peer_public);
        Ok(*self.secret.diffie_hellman(&peer).as_bytes())
    }
}

/// Expanded session key material: two 64-byte halves, one per direction.
///
/// Zeroized on drop. [`crate::crypto::aead`] slices this into per-suite
/// AEAD keys.
#[derive(Clone)]
pub struct KeyMaterial(pub [u8; crate::core::EXPANDED_KEY_SIZE]);

impl KeyMaterial {
    /// Wrap raw expanded key bytes.
    pub fn from_bytes(bytes: [u8; crate::core::EXPANDED_KEY_SIZE]) -> Self {
        Self(bytes)
    }

    /// The first key half (bytes `0..64`).
    pub fn half_a(&self) -> &[u8] {
        &self.0[..crate::core::CIPHER_KEY_HALF_SIZE]
    }

    /// The second key half (bytes `64..128`).
    pub fn half_b(&self) -> &[u8] {
        &self.0[crate::core::CIPHER_KEY_HALF_SIZE..]
    }
}

impl Drop for KeyMaterial {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_roundtrip() {
        let kp = StaticSigningKeypair::generate();
        let pubkey = kp.public_key();
        let msg = b"sptps handshake";
        let sig = kp.sign(msg);
        assert!(pubkey.verify(msg, &sig).is_ok());
    }

    #[test]
    fn signing_rejects_tampered_message() {
        let kp = StaticSigningKeypair::generate();
        let pubkey = kp.public_key();
        let sig = kp.sign(b"hello");
        assert!(pubkey.verify(b"hellp", &sig).is_err());
    }

    #[test]
    fn ecdh_agrees_both_ways() {
        let a = EphemeralKeypair::generate();
        let b = EphemeralKeypair::generate();
        let a_pub = a.public_bytes();
        let b_pub = b.public_bytes();
        let shared_a = a.shared_secret(&b_pub).unwrap();
        let shared_b = b.shared_secret(&a_pub).unwrap();
        assert_eq!(shared_a, shared_b);
    }

    #[test]
    fn key_material_halves_are_disjoint_slices() {
        let mut bytes = [0u8; crate::core::EXPANDED_KEY_SIZE];
        for (i, b) in bytes.iter_mut().enumerate() {
            *b = i as u8;
        }
        let km = KeyMaterial::from_bytes(bytes);
        assert_eq!(km.half_a()[0], 0);
        assert_eq!(km.half_b()[0], 64);
    }
}
