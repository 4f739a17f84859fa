//! Relay chat - Obfuscation Layer
//!
//! Implements:
//! - The cascade XOR keystream applied to message bodies
//! - Shared passphrase handling (zeroized on drop)
//!
//! # Security
//!
//! The keystream hides message text from casual observation only. It offers
//! no confidentiality against an attacker and no integrity protection.

mod cipher;
mod keys;

pub use cipher::*;
pub use keys::*;
