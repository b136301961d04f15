//! Error types for the SPTPS session engine.

use thiserror::Error;

/// Errors that can occur while running an SPTPS session.
///
/// Every fallible session operation returns one of these through a
/// `Result`; the session itself never panics on protocol input. A session
/// that produces an error is no longer usable and must be dropped.
#[derive(Debug, Error)]
pub enum SptpsError {
    /// Fewer bytes were supplied than the current record requires.
    #[error("short packet: need at least {needed} bytes, got {got}")]
    ShortPacket {
        /// Minimum bytes required to make progress.
        needed: usize,
        /// Bytes actually supplied.
        got: usize,
    },

    /// A declared or required length did not match what was expected.
    #[error("bad length: expected {expected}, got {actual}")]
    BadLength {
        /// Expected length.
        expected: usize,
        /// Actual length.
        actual: usize,
    },

    /// The KEX version byte was not recognized.
    #[error("unsupported handshake version: {0}")]
    BadVersion(u8),

    /// The local and peer cipher suite masks share no common suite.
    #[error("no common cipher suite")]
    NoCommonSuite,

    /// A KEX record arrived while one was already in flight.
    #[error("duplicate KEX while a handshake is already in progress")]
    DuplicateKex,

    /// Signature verification on a SIG record failed.
    #[error("signature verification failed")]
    BadSignature,

    /// Computing the ECDH shared secret failed.
    #[error("ECDH key agreement failed")]
    EcdhFailed,

    /// Key expansion (PRF) failed.
    #[error("key derivation failed")]
    PrfFailed,

    /// Initializing an AEAD cipher context failed.
    #[error("cipher initialization failed for suite {0}")]
    CipherInitFailed(u8),

    /// AEAD decryption failed (bad tag or truncated ciphertext).
    #[error("decryption failed (invalid tag or corrupted ciphertext)")]
    DecryptFailed,

    /// A datagram's sequence number is far beyond the current window and
    /// too few far-future packets have been seen yet to accept it.
    #[error("sequence number too far in the future")]
    FarFuture,

    /// A datagram was a duplicate or arrived too late to fit in the replay
    /// window.
    #[error("late or replayed packet")]
    LateOrReplay,

    /// A record carried a type the current state does not accept (an
    /// application-range record before the handshake completes, or a
    /// reserved type).
    #[error("invalid record type {0} for current state")]
    InvalidRecordType(u8),

    /// The requested operation is not legal in the session's current
    /// state (e.g. `send_record` before the handshake completes, or
    /// `force_kex` outside the steady state).
    #[error("invalid operation for current session state: {0}")]
    InvalidState(&'static str),

    /// The `send_data` or `receive_record` callback returned failure.
    #[error("callback reported failure")]
    CallbackFailed,
}
