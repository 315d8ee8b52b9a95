//! Miscellaneous common structs used throughout the library.

mod id;
mod immutable;
mod keys;
mod mutable;

pub use id::*;
pub use immutable::*;
pub use keys::*;
pub use mutable::*;
