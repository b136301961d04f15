//! SPTPS core: wire constants, error types, logging hook, and the traits
//! the handshake and record layers are written against.

mod constants;
mod error;
mod log;
mod traits;

pub use constants::*;
pub use error::*;
pub use log::*;
pub use traits::*;
