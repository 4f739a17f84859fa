//! Error types for the relay chat protocol.

use thiserror::Error;

#[cfg(feature = "client")]
use crate::client::SessionError;
#[cfg(feature = "server")]
use crate::server::RelayError;
#[cfg(feature = "transport")]
use crate::transport::AddressParseError;

/// Errors in the keystream cipher layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// The passphrase is empty.
    #[error("invalid key: passphrase must contain at least one byte")]
    InvalidKey,
}

/// Errors raised while validating configuration values.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A field holds a value the relay or session cannot run with.
    #[error("invalid value for `{field}`: {reason}")]
    InvalidValue {
        /// Name of the offending field.
        field: &'static str,
        /// Why the value was rejected.
        reason: &'static str,
    },
}

/// Top-level relay chat errors.
#[derive(Debug, Error)]
pub enum RelayChatError {
    /// Cipher error.
    #[error("cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Address literal could not be parsed.
    #[cfg(feature = "transport")]
    #[error("address error: {0}")]
    Address(#[from] AddressParseError),

    /// Relay error.
    #[cfg(feature = "server")]
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// Peer session error.
    #[cfg(feature = "client")]
    #[error("session error: {0}")]
    Session(#[from] SessionError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result alias for top-level operations.
pub type Result<T, E = RelayChatError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        assert_eq!(
            CipherError::InvalidKey.to_string(),
            "invalid key: passphrase must contain at least one byte"
        );

        let err = ConfigError::InvalidValue {
            field: "poll_timeout",
            reason: "must be non-zero",
        };
        assert_eq!(
            err.to_string(),
            "invalid value for `poll_timeout`: must be non-zero"
        );
    }

    #[test]
    fn test_top_level_conversion() {
        let err: RelayChatError = CipherError::InvalidKey.into();
        assert!(matches!(err, RelayChatError::Cipher(CipherError::InvalidKey)));

        let io = std::io::Error::new(std::io::ErrorKind::Other, "boom");
        let err: RelayChatError = io.into();
        assert!(err.to_string().starts_with("i/o error"));
    }
}
