//! Core constants and error types.
//!
//! This module has no optional dependencies and is always compiled.

mod constants;
mod error;

pub use constants::*;
pub use error::*;
