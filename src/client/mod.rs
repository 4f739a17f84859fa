//! Relay chat - Peer Library
//!
//! Client side of the chat: one connection to a relay, a shared passphrase
//! and a running nonce.
//!
//! - [`SessionConfig`]: validated address literal and passphrase
//! - [`SessionState`]: nonce, tag and cipher, no I/O
//! - [`PeerSession`]: connected session with non-blocking receive
//! - [`MessageSink`]: where the interactive loop delivers messages

mod message;
mod session;

pub use message::*;
pub use session::*;
