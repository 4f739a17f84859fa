//! Decoded incoming messages and the presentation seam.

use std::borrow::Cow;
use std::fmt;

use crate::transport::SenderTag;

/// A decrypted message received from another peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
    /// Tag the sender chose for itself.
    pub sender: SenderTag,
    /// Nonce carried in the frame header.
    pub nonce: u8,
    /// Decrypted body.
    pub text: Vec<u8>,
}

impl IncomingMessage {
    /// Body as UTF-8, replacing invalid sequences.
    ///
    /// A peer using a different passphrase produces garbage here, not an error.
    pub fn text_lossy(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.text)
    }
}

impl fmt::Display for IncomingMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.sender, self.text_lossy())
    }
}

/// Where [`PeerSession::run`](super::PeerSession::run) delivers messages.
///
/// Implemented for any `FnMut(IncomingMessage)`.
pub trait MessageSink {
    /// Hand one message to the presentation layer.
    fn deliver(&mut self, message: IncomingMessage);
}

impl<F> MessageSink for F
where
    F: FnMut(IncomingMessage),
{
    fn deliver(&mut self, message: IncomingMessage) {
        self(message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(tag: &[u8; 2], text: &[u8]) -> IncomingMessage {
        IncomingMessage {
            sender: SenderTag::from_bytes(*tag),
            nonce: 1,
            text: text.to_vec(),
        }
    }

    #[test]
    fn test_display_format() {
        assert_eq!(message(b"Zz", b"hello").to_string(), "[Zz] hello");
        assert_eq!(message(b"a ", b"").to_string(), "[a ] ");
    }

    #[test]
    fn test_invalid_utf8_is_lossy() {
        let msg = message(b"xy", &[0x68, 0xff, 0x69]);
        assert_eq!(msg.text_lossy(), "h\u{fffd}i");
    }

    #[test]
    fn test_closure_sink() {
        let mut seen = Vec::new();
        {
            let mut sink = |m: IncomingMessage| seen.push(m.to_string());
            sink.deliver(message(b"ab", b"one"));
            sink.deliver(message(b"cd", b"two"));
        }
        assert_eq!(seen, vec!["[ab] one", "[cd] two"]);
    }
}
