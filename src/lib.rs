//! # SPTPS
//!
//! **S**imple **P**eer-**T**o-**P**eer **S**ecurity: a minimal
//! authenticated, confidential transport for a single bidirectional
//! channel between two endpoints that already know each other's
//! long-term Ed25519 public key.
//!
//! SPTPS provides:
//!
//! - **Mutual authentication**: both sides sign an ephemeral X25519
//!   exchange with a long-term Ed25519 keypair.
//! - **Forward secrecy**: a fresh ephemeral keypair every handshake,
//!   including every rekey.
//! - **Confidentiality and integrity**: ChaCha20-Poly1305 (mandatory) or
//!   AES-256-GCM (optional, behind the `aes-gcm` feature).
//! - **Replay protection** for datagram transports, via a sliding bitmap
//!   window.
//!
//! SPTPS is not a full protocol stack: it has no notion of addressing,
//! retransmission, or multiplexing. It secures exactly one channel and
//! leaves everything else to the host application, which supplies byte
//! transport via two callbacks.
//!
//! ## Example
//!
//! ```no_run
//! use sptps::{Params, Session, StaticSigningKeypair};
//!
//! let my_key = StaticSigningKeypair::generate();
//! let peer_key_bytes = [0u8; 32]; // known out-of-band
//! let peer_key = sptps::StaticVerifyingKey::from_bytes(&peer_key_bytes).unwrap();
//!
//! let params = Params::new(true, false, my_key, peer_key, b"example".to_vec());
//! let mut session = Session::start(
//!     params,
//!     |_record_type, bytes| {
//!         // hand `bytes` to the socket
//!         true
//!     },
//!     |record_type, payload| {
//!         println!("received record {record_type} ({} bytes)", payload.len());
//!         true
//!     },
//! )
//! .unwrap();
//!
//! // Feed bytes read from the transport back in as they arrive:
//! // session.receive_data(&buf[..n]).unwrap();
//! let _ = &mut session;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

/// Wire constants, error types, the logging hook, and the traits the
/// handshake and record layers are written against.
pub mod core;

/// The AEAD cipher adapter, key types, key expansion, and the datagram
/// replay window.
pub mod crypto;

/// Stream and datagram record framing.
pub mod framer;

/// The KEX/SIG/ACK/SECONDARY_KEX handshake state machine.
pub mod handshake;

/// The public session facade.
pub mod session;

pub use core::{Logger, QuietLogger, SptpsError, StderrLogger};
pub use crypto::{EphemeralKeypair, KeyMaterial, StaticSigningKeypair, StaticVerifyingKey};
pub use session::{Params, Session};
