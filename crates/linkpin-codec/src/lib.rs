//! Salted, reversible encoding between sequence numbers and short codes.
//!
//! The encoding follows the hashids scheme, so a deployment that keeps its
//! salt and alphabet keeps resolving codes issued by earlier services that
//! used the same scheme.

mod codec;
pub mod error;
mod shuffle;

pub use codec::{Codec, CodecSettings, DEFAULT_ALPHABET};
pub use error::Error;
