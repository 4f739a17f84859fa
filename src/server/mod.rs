//! Relay chat - Relay Library
//!
//! A single-task broadcast relay. Peers connect over TCP; every frame a
//! peer sends is forwarded unchanged to every other connected peer.
//!
//! - [`ConnectionRegistry`]: ordered peer set with mark-and-sweep removal
//! - [`Relay`]: the accept, poll, dispatch and sweep loop

mod registry;
mod relay;

pub use registry::*;
pub use relay::*;
