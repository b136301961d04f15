//! Wire-format constants fixed by the protocol.
//!
//! These values are fixed by the protocol and MUST NOT be changed; doing so
//! breaks interoperability with any other conforming implementation.

// =============================================================================
// CRYPTOGRAPHIC SIZES
// =============================================================================

/// AEAD authentication tag size, for both supported suites.
pub const AEAD_TAG_SIZE: usize = 16;

/// AEAD nonce size: a 4-byte little-endian sequence number followed by
/// eight zero bytes.
pub const AEAD_NONCE_SIZE: usize = 12;

/// X25519 public/private key size, used for the ephemeral ECDH exchange.
pub const ECDH_KEY_SIZE: usize = 32;

/// Ed25519 public key size, used for long-term signing identities.
pub const SIGNING_PUBLIC_KEY_SIZE: usize = 32;

/// Ed25519 signature size.
pub const SIGNATURE_SIZE: usize = 64;

/// Size in bytes of one cipher key half within the 128-byte expanded key
/// material. Only the first 32 bytes of a half are used by either
/// supported suite; the remainder exists to give room for suites with
/// longer keys.
pub const CIPHER_KEY_HALF_SIZE: usize = 64;

/// Total size of the expanded key material (two key halves).
pub const EXPANDED_KEY_SIZE: usize = 2 * CIPHER_KEY_HALF_SIZE;

/// Random nonce carried in a KEX record.
pub const KEX_NONCE_SIZE: usize = 32;

// =============================================================================
// HANDSHAKE WIRE LAYOUT
// =============================================================================

/// Handshake version understood by this implementation.
pub const HANDSHAKE_VERSION: u8 = 0;

/// KEX record size: version(1) + preferred suite(1) + suite mask(2) +
/// nonce(32) + ECDH public key.
pub const KEX_RECORD_SIZE: usize = 1 + 1 + 2 + KEX_NONCE_SIZE + ECDH_KEY_SIZE;

/// Record type marking a handshake record (KEX, SIG, or ACK).
pub const RECORD_TYPE_HANDSHAKE: u8 = 128;

/// Application record types must be strictly less than this.
pub const RECORD_TYPE_APPLICATION_LIMIT: u8 = 128;

// =============================================================================
// RECORD FRAMING
// =============================================================================

/// Stream-record wire length prefix: always 2 plaintext bytes, even once
/// keyed (it is the length of everything that follows, type byte and tag
/// included).
pub const STREAM_LENGTH_PREFIX_SIZE: usize = 2;

/// Plaintext stream-record header, pre-keying: length(2) + type(1).
pub const STREAM_HEADER_SIZE: usize = STREAM_LENGTH_PREFIX_SIZE + 1;

/// Stream-record wire sequence-number prefix: always 4 plaintext bytes.
pub const DATAGRAM_SEQNO_PREFIX_SIZE: usize = 4;

/// Plaintext datagram-record header, pre-keying: sequence number(4) +
/// type(1).
pub const DATAGRAM_HEADER_SIZE: usize = DATAGRAM_SEQNO_PREFIX_SIZE + 1;

/// Maximum application payload length (fits in the 16-bit stream length
/// field).
pub const MAX_RECORD_LEN: usize = u16::MAX as usize;

// =============================================================================
// CIPHER SUITES
// =============================================================================

/// ChaCha20-Poly1305, the mandatory cipher suite.
pub const SUITE_CHACHA20_POLY1305: u8 = 0;

/// AES-256-GCM, an optional cipher suite.
pub const SUITE_AES256_GCM: u8 = 1;

/// Number of suite ids defined (bits 0..SUITE_COUNT of the negotiation
/// mask are meaningful).
pub const SUITE_COUNT: u8 = 2;

// =============================================================================
// REPLAY WINDOW
// =============================================================================

/// Default replay window size in bytes (one bit per past sequence number,
/// so this covers 8 * 16 = 128 past sequence numbers).
pub const DEFAULT_REPLAY_WINDOW: usize = 16;
