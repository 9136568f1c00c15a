//! Shared type definitions for relq
//!
//! This crate provides the [`Dialect`] enum used by `relq-core` to decide how
//! identifiers are quoted and how literal values are written into SQL text.
//!
//! # Features
//!
//! - `serde` - Enable serde serialization/deserialization of [`Dialect`]

mod dialect;

pub use dialect::{Dialect, DialectParseError};

/// Prelude module for commonly used types
pub mod prelude {
    pub use crate::Dialect;
}
