//! Transport layer error types.
//!
//! None of these are fatal to the relay as a whole: the relay drops the one
//! connection that produced the error and keeps serving the rest.

use std::io;

use thiserror::Error;

use super::frame::FrameError;

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Frame parsing error.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The remote end closed the connection (zero-length read).
    #[error("connection closed by peer")]
    ConnectionClosed,

    /// The peer is not draining its outbound queue.
    #[error("peer too slow: {pending} bytes pending (limit {limit})")]
    PeerTooSlow {
        /// Bytes waiting to be written.
        pending: usize,
        /// Configured limit.
        limit: usize,
    },
}

impl TransportError {
    /// Whether the error ends the connection it happened on.
    ///
    /// `WouldBlock` and `Interrupted` only mean "try again later".
    pub fn is_fatal(&self) -> bool {
        match self {
            TransportError::Io(e) => !matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            TransportError::Frame(FrameError::Io(e)) => !matches!(
                e.kind(),
                io::ErrorKind::WouldBlock | io::ErrorKind::Interrupted
            ),
            _ => true,
        }
    }

    /// Whether this is an orderly close rather than a failure.
    pub fn is_graceful_close(&self) -> bool {
        matches!(self, TransportError::ConnectionClosed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fatal_errors() {
        assert!(TransportError::ConnectionClosed.is_fatal());
        assert!(TransportError::PeerTooSlow {
            pending: 10,
            limit: 5
        }
        .is_fatal());
        assert!(TransportError::Io(io::Error::from(io::ErrorKind::ConnectionReset)).is_fatal());

        assert!(!TransportError::Io(io::Error::from(io::ErrorKind::WouldBlock)).is_fatal());
        assert!(!TransportError::Io(io::Error::from(io::ErrorKind::Interrupted)).is_fatal());
    }

    #[test]
    fn test_graceful_close() {
        assert!(TransportError::ConnectionClosed.is_graceful_close());
        assert!(!TransportError::Io(io::Error::from(io::ErrorKind::BrokenPipe)).is_graceful_close());
    }
}
