//! # relaychat
//!
//! A minimal relay-based text chat.
//!
//! Peers connect to a central relay over TCP. The relay forwards every frame
//! it receives from one peer to all other connected peers, without looking
//! inside it. Message bodies are obfuscated end to end with a cascade XOR
//! keystream derived from a passphrase the peers share out of band.
//!
//! - **Framing**: fixed 6-byte header plus body, reassembled from partial
//!   and pipelined reads
//! - **Relay**: single task, accept/poll/dispatch/sweep loop with
//!   mark-and-sweep removal of dead peers
//! - **Peer session**: nonce counter, sender tag, non-blocking receive
//!
//! The keystream is not encryption in any security sense. There is no
//! authentication and no integrity protection.
//!
//! ## Feature Flags
//!
//! - `transport` (default): frames, reassembly, address literal, shutdown signal
//! - `crypto` (default): keystream cipher and passphrase handling
//! - `server` (default): connection registry and relay loop
//! - `client` (default): peer session
//!
//! ## Modules
//!
//! - [`core`]: Constants and error types (always included)
//! - [`transport`]: Transport layer (requires `transport` feature)
//! - [`crypto`]: Obfuscation layer (requires `crypto` feature)
//! - [`server`]: Relay (requires `server` feature)
//! - [`client`]: Peer session (requires `client` feature)
//!
//! ## Example Usage
//!
//! ```rust
//! use relaychat::prelude::*;
//!
//! let key = Passphrase::try_from("shared secret").unwrap();
//! let mut body = b"hello".to_vec();
//!
//! encrypt(&mut body, &key, 1);
//! let frame = Frame::user_message(1, SenderTag::from_bytes(*b"Zz"), body).unwrap();
//!
//! let mut reassembler = FrameReassembler::new();
//! reassembler.push(&frame.to_bytes());
//! let received = reassembler.next_frame().unwrap().unwrap();
//!
//! let mut text = received.body.to_vec();
//! decrypt(&mut text, &key, received.nonce);
//! assert_eq!(text, b"hello");
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Obfuscation layer (feature-gated)
#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub mod crypto;

// Peer session (feature-gated)
#[cfg(feature = "client")]
#[cfg_attr(docsrs, doc(cfg(feature = "client")))]
pub mod client;

// Relay (feature-gated)
#[cfg(feature = "server")]
#[cfg_attr(docsrs, doc(cfg(feature = "server")))]
pub mod server;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::{CipherError, ConfigError, HEADER_SIZE, MAX_BODY_LEN, RelayChatError};

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        AddressParseError, Frame, FrameCodec, FrameError, FrameHeader, FrameReassembler,
        FrameType, PeerAddress, SenderTag, Shutdown, ShutdownSignal, TransportError,
    };

    #[cfg(feature = "crypto")]
    pub use crate::crypto::*;

    #[cfg(feature = "server")]
    pub use crate::server::{
        ConnectionId, ConnectionRegistry, Relay, RelayConfig, RelayConfigBuilder, RelayError,
        RelayStats,
    };

    #[cfg(feature = "client")]
    pub use crate::client::{
        IncomingMessage, MessageSink, PeerSession, SessionConfig, SessionError, SessionState,
    };
}

// Re-export commonly used items at crate root
pub use core::{CipherError, ConfigError, RelayChatError};

#[cfg(feature = "transport")]
pub use transport::{Frame, FrameHeader, FrameReassembler, FrameType, PeerAddress, SenderTag};
