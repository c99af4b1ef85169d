//! Base types and error handling.
//!
//! Provides the crate-wide error type:
//! - [`DohError`]: every failure class produced by the resolution and
//!   fetch paths

pub mod error;

pub use error::DohError;
