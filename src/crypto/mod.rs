//! Cryptographic building blocks: the AEAD cipher adapter, long-term and
//! ephemeral key types, key expansion, and the datagram replay window.

mod aead;
mod kdf;
mod keys;
mod replay;

pub use aead::*;
pub use kdf::*;
pub use keys::*;
pub use replay::*;
