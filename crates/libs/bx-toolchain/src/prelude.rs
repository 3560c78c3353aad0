//! Common types and utilities.

/// Toolchain error type.
pub use crate::error::Error;

/// Toolchain result type.
pub type Result<T> = core::result::Result<T, Error>;
