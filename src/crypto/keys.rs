//! Shared passphrase handling.
//!
//! The passphrase is agreed out of band and never sent over the wire. The
//! relay never sees it.

use std::fmt;

use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::core::CipherError;

/// Non-empty shared passphrase.
///
/// The bytes are zeroized on drop.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct Passphrase(Vec<u8>);

impl Passphrase {
    /// Create a passphrase, rejecting empty input.
    pub fn new(bytes: impl Into<Vec<u8>>) -> Result<Self, CipherError> {
        let bytes = bytes.into();
        if bytes.is_empty() {
            return Err(CipherError::InvalidKey);
        }
        Ok(Self(bytes))
    }

    /// Create a passphrase from a line of user input.
    ///
    /// A single trailing `\n` or `\r\n` is stripped first.
    pub fn from_line(line: &str) -> Result<Self, CipherError> {
        let trimmed = line
            .strip_suffix('\n')
            .map(|l| l.strip_suffix('\r').unwrap_or(l))
            .unwrap_or(line);
        Self::new(trimmed.as_bytes())
    }

    /// Get the passphrase bytes.
    ///
    /// # Security
    /// Handle with care - this exposes the shared secret.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Passphrase length in bytes (always at least 1).
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; kept for API symmetry with `len`.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Passphrase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Passphrase").field(&"<redacted>").finish()
    }
}

impl TryFrom<&str> for Passphrase {
    type Error = CipherError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value.as_bytes())
    }
}

impl TryFrom<&[u8]> for Passphrase {
    type Error = CipherError;

    fn try_from(value: &[u8]) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}
