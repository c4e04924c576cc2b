//! Shared foundational types used across the deptrack workspace.
//!
//! This crate provides interned identifiers, 128-bit content hashing for
//! interface fingerprints, and the common internal result type.

#![warn(missing_docs)]

pub mod hash;
pub mod ident;
pub mod result;

pub use hash::{ContentHash, ContentHasher};
pub use ident::{Ident, Interner};
pub use result::{InternalError, TrackResult};
