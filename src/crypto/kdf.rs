//! Key expansion: turns an ECDH shared secret plus handshake context into
//! the 128 bytes of session key material both sides install into their
//! ciphers.

use crate::core::{Prf, SptpsError, EXPANDED_KEY_SIZE, KEX_RECORD_SIZE};
use hkdf::Hkdf;
use sha2::Sha256;

/// Label mixed into every key expansion, providing domain separation from
/// any other protocol that might reuse the same ECDH shared secret.
pub const KEY_EXPANSION_LABEL: &[u8] = b"key expansion";

/// HKDF-SHA256-backed [`Prf`] implementation.
#[derive(Debug, Default, Clone, Copy)]
pub struct HkdfPrf;

impl Prf for HkdfPrf {
    fn expand(&self, secret: &[u8], seed: &[u8], out_len: usize) -> Result<Vec<u8>, SptpsError> {
        let hk = Hkdf::<Sha256>::new(None, secret);
        let mut out = vec![0u8; out_len];
        hk.expand(seed, &mut out).map_err(|_| SptpsError::PrfFailed)?;
        Ok(out)
    }
}

/// Extracts the 32-byte field window a KEX frame contributes to the PRF
/// seed.
///
/// The window starts at byte offset 1 of the KEX record (not 4, and not
/// at the nonce field in isolation): it therefore covers the
/// peer-preference byte, the 2-byte suite mask, and the first 29 bytes of
/// the 32-byte nonce. This offset is preserved exactly because it is part
/// of the wire behavior two interoperating implementations must agree on;
/// since the whole KEX frame is authenticated by the SIG signature
/// anyway, the choice of window has no security consequence, only an
/// interoperability one.
pub fn kex_field_window(kex_record: &[u8]) -> Result<&[u8], SptpsError> {
    if kex_record.len() < KEX_RECORD_SIZE {
        return Err(SptpsError::ShortPacket {
            needed: KEX_RECORD_SIZE,
            got: kex_record.len(),
        });
    }
    Ok(&kex_record[1..33])
}

/// Builds the PRF seed: the expansion label, followed by the initiator's
/// KEX field window, followed by the responder's, followed by the
/// application-supplied label.
///
/// Field ordering is canonical (initiator first) regardless of which side
/// is computing the seed, so both ends derive identical key material.
pub fn build_seed(
    initiator_kex: &[u8],
    responder_kex: &[u8],
    app_label: &[u8],
) -> Result<Vec<u8>, SptpsError> {
    let a = kex_field_window(initiator_kex)?;
    let b = kex_field_window(responder_kex)?;
    let mut seed = Vec::with_capacity(KEY_EXPANSION_LABEL.len() + a.len() + b.len() + app_label.len());
    seed.extend_from_slice(KEY_EXPANSION_LABEL);
    seed.extend_from_slice(a);
    seed.extend_from_slice(b);
    seed.extend_from_slice(app_label);
    Ok(seed)
}

/// Expands an ECDH shared secret into 128 bytes of session key material.
pub fn expand_key_material(
    prf: &impl Prf,
    shared_secret: &[u8],
    initiator_kex: &[u8],
    responder_kex: &[u8],
    app_label: &[u8],
) -> Result<[u8; EXPANDED_KEY_SIZE], SptpsError> {
    let seed = build_seed(initiator_kex, responder_kex, app_label)?;
    let bytes = prf.expand(shared_secret, &seed, EXPANDED_KEY_SIZE)?;
    bytes
        .try_into()
        .map_err(|_| SptpsError::PrfFailed)
}
