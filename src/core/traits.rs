//! Seams for the cryptographic primitives the session engine treats as
//! external collaborators.
//!
//! The handshake and record layers are written against these traits rather
//! than against concrete crates directly, so the choice of signature and
//! ECDH backend is a detail of [`crate::crypto::keys`] rather than baked
//! into the state machine.

use crate::core::error::SptpsError;

/// A long-term signing keypair, able to produce signatures over arbitrary
/// messages.
///
/// Implemented by [`crate::crypto::keys::StaticSigningKeypair`].
pub trait SigningKey {
    /// Sign `message`, returning a fixed-size signature.
    fn sign(&self, message: &[u8]) -> [u8; crate::core::constants::SIGNATURE_SIZE];
}

/// A long-term signing public key, able to verify signatures produced by
/// the matching [`SigningKey`].
pub trait SigningPublicKey {
    /// Verify `signature` over `message`.
    fn verify(&self, message: &[u8], signature: &[u8]) -> Result<(), SptpsError>;
}

/// An ephemeral Diffie-Hellman keypair used once per handshake.
///
/// `shared_secret` consumes the keypair: an ECDH private key is used for
/// exactly one shared-secret computation and then discarded, matching the
/// invariant that `ecdh` is only live between sending a KEX and computing
/// that KEX round's shared secret.
///
/// Implemented by [`crate::crypto::keys::EphemeralKeypair`].
pub trait DiffieHellman {
    /// This side's public key, as sent in the KEX record.
    fn public_bytes(&self) -> [u8; crate::core::constants::ECDH_KEY_SIZE];

    /// Compute the shared secret with the peer's public key, consuming
    /// this keypair.
    fn shared_secret(
        self,
        peer_public: &[u8; crate::core::constants::ECDH_KEY_SIZE],
    ) -> Result<[u8; crate::core::constants::ECDH_KEY_SIZE], SptpsError>;
}

/// The pseudorandom function used to expand an ECDH shared secret plus
/// handshake context into session key material.
///
/// Implemented by [`crate::crypto::kdf::expand_key_material`], exposed as a
/// free function rather than a trait object since there is exactly one
/// implementation and no caller ever needs to swap it at runtime; the
/// trait exists purely so the handshake module's tests can substitute a
/// fake without linking `hkdf`.
pub trait Prf {
    /// Expand `secret` and `seed` into `out_len` bytes of key material.
    fn expand(&self, secret: &[u8], seed: &[u8], out_len: usize) -> Result<Vec<u8>, SptpsError>;
}
