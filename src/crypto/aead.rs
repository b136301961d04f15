//! Cipher adapter: a uniform AEAD interface over the suites SPTPS
//! negotiates, plus the nonce and key-half conventions both sides must
//! agree on to interoperate.

use crate::core::{SptpsError, AEAD_TAG_SIZE, SUITE_CHACHA20_POLY1305, SUITE_COUNT};
use chacha20poly1305::{
    aead::{Aead, KeyInit, Payload},
    ChaCha20Poly1305, Key as ChaChaKey, Nonce as ChaChaNonce,
};

#[cfg(feature = "aes-gcm")]
use crate::core::SUITE_AES256_GCM;
#[cfg(feature = "aes-gcm")]
use aes_gcm::{Aes256Gcm, Key as AesKey, Nonce as AesNonce};

/// Which half of the 128-byte expanded key material a cipher context
/// should be initialized from.
///
/// Each side picks its own outbound/inbound half from its own
/// `initiator` flag (see [`key_half_for`]); this type exists only to make
/// the call sites read as "first half" / "second half" rather than a bare
/// bool whose meaning would have to be re-derived at every call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyHalf {
    /// Bytes `0..64` of the expanded key material.
    First,
    /// Bytes `64..128` of the expanded key material.
    Second,
}

/// Determines which key half a side uses for its outbound and inbound
/// ciphers.
///
/// This matches the reference implementation exactly: the initiator's
/// outbound cipher and the responder's inbound cipher both draw from the
/// first half; the initiator's inbound cipher and the responder's outbound
/// cipher both draw from the second half.
pub fn key_half_for(initiator: bool, outbound: bool) -> KeyHalf {
    let use_second_half = initiator != outbound;
    if use_second_half {
        KeyHalf::Second
    } else {
        KeyHalf::First
    }
}

/// Builds the 12-byte AEAD nonce for a given sequence number: the
/// sequence number as little-endian bytes 0..3, zero elsewhere.
///
/// This layout is a protocol design constant, not an implementation
/// choice; deviating from it breaks interoperability.
pub fn build_nonce(seqno: u32) -> [u8; 12] {
    let mut nonce = [0u8; 12];
    nonce[..4].copy_from_slice(&seqno.to_le_bytes());
    nonce
}

/// A negotiated, keyed AEAD context for one direction of one session.
pub trait CipherContext: Send {
    /// Encrypt `plaintext` under `seqno`, returning ciphertext with a
    /// 16-byte tag appended.
    fn encrypt(&self, seqno: u32, plaintext: &[u8]) -> Result<Vec<u8>, SptpsError>;

    /// Decrypt `ciphertext` (which must include its trailing tag) under
    /// `seqno`.
    fn decrypt(&self, seqno: u32, ciphertext: &[u8]) -> Result<Vec<u8>, SptpsError>;
}

/// ChaCha20-Poly1305, the mandatory cipher suite.
pub struct ChaChaPolyContext {
    cipher: ChaCha20Poly1305,
}

impl ChaChaPolyContext {
    /// Initialize from `key_material`, selecting `half`.
    pub fn new(key_material: &[u8], half: KeyHalf) -> Result<Self, SptpsError> {
        let key_bytes = key_half_bytes(key_material, half)?;
        let cipher = ChaCha20Poly1305::new(ChaChaKey::from_slice(key_bytes));
        Ok(Self { cipher })
    }
}

impl CipherContext for ChaChaPolyContext {
    fn encrypt(&self, seqno: u32, plaintext: &[u8]) -> Result<Vec<u8>, SptpsError> {
        let nonce = build_nonce(seqno);
        self.cipher
            .encrypt(
                ChaChaNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: &[],
                },
            )
            .map_err(|_| SptpsError::CipherInitFailed(SUITE_CHACHA20_POLY1305))
    }

    fn decrypt(&self, seqno: u32, ciphertext: &[u8]) -> Result<Vec<u8>, SptpsError> {
        if ciphertext.len() < AEAD_TAG_SIZE {
            return Err(SptpsError::DecryptFailed);
        }
        let nonce = build_nonce(seqno);
        self.cipher
            .decrypt(
                ChaChaNonce::from_slice(&nonce),
                Payload {
                    msg: ciphertext,
                    aad: &[],
                },
            )
            .map_err(|_| SptpsError::DecryptFailed)
    }
}

/// AES-256-GCM, an optional second cipher suite.
#[cfg(feature = "aes-gcm")]
pub struct Aes256GcmContext {
    cipher: Aes256Gcm,
}

#[cfg(feature = "aes-gcm")]
impl Aes256GcmContext {
    /// Initialize from `key_material`, selecting `half`.
    pub fn new(key_material: &[u8], half: KeyHalf) -> Result<Self, SptpsError> {
        use aes_gcm::KeyInit as _;
        let key_bytes = key_half_bytes(key_material, half)?;
        let cipher = Aes256Gcm::new(AesKey::<Aes256Gcm>::from_slice(key_bytes));
        Ok(Self { cipher })
    }
}

#[cfg(feature = "aes-gcm")]
impl CipherContext for Aes256GcmContext {
    fn encrypt(&self, seqno: u32, plaintext: &[u8]) -> Result<Vec<u8>, SptpsError> {
        use aes_gcm::aead::Aead as _;
        let nonce = build_nonce(seqno);
        self.cipher
            .encrypt(AesNonce::from_slice(&nonce), plaintext)
            .map_err(|_| SptpsError::CipherInitFailed(SUITE_AES256_GCM))
    }

    fn decrypt(&self, seqno: u32, ciphertext: &[u8]) -> Result<Vec<u8>, SptpsError> {
        use aes_gcm::aead::Aead as _;
        if ciphertext.len() < AEAD_TAG_SIZE {
            return Err(SptpsError::DecryptFailed);
        }
        let nonce = build_nonce(seqno);
        self.cipher
            .decrypt(AesNonce::from_slice(&nonce), ciphertext)
            .map_err(|_| SptpsError::DecryptFailed)
    }
}

fn key_half_bytes(key_material: &[u8], half: KeyHalf) -> Result<&[u8], SptpsError> {
    let half_size = crate::core::CIPHER_KEY_HALF_SIZE;
    if key_material.len() < 2 * half_size {
        return Err(SptpsError::CipherInitFailed(SUITE_CHACHA20_POLY1305));
    }
    let start = match half {
        KeyHalf::First => 0,
        KeyHalf::Second => half_size,
    };
    Ok(&key_material[start..start + 32])
}

/// Constructs the [`CipherContext`] for a negotiated suite id.
pub fn init_cipher(
    suite: u8,
    key_material: &[u8],
    half: KeyHalf,
) -> Result<Box<dyn CipherContext>, SptpsError> {
    match suite {
        SUITE_CHACHA20_POLY1305 => Ok(Box::new(ChaChaPolyContext::new(key_material, half)?)),
        #[cfg(feature = "aes-gcm")]
        SUITE_AES256_GCM => Ok(Box::new(Aes256GcmContext::new(key_material, half)?)),
        other => Err(SptpsError::CipherInitFailed(other)),
    }
}

/// `true` if `suite` is one this build knows how to initialize.
pub fn suite_supported(suite: u8) -> bool {
    match suite {
        SUITE_CHACHA20_POLY1305 => true,
        #[cfg(feature = "aes-gcm")]
        SUITE_AES256_GCM => true,
        _ => false,
    }
}

/// The bitmask of every suite this build supports, used as the default
/// `cipher_suites` advertisement.
pub fn all_supported_suites_mask() -> u16 {
    let mut mask = 0u16;
    for suite in 0..SUITE_COUNT {
        if suite_supported(suite) {
            mask |= 1 << suite;
        }
    }
    mask
}
