//! Relay chat - Transport Layer
//!
//! This module provides:
//!
//! - **Frame encoding/decoding**: [`Frame`], [`FrameHeader`] and the 6-byte wire header
//! - **Stream reassembly**: [`FrameCodec`] and [`FrameReassembler`] for partial
//!   and pipelined reads
//! - **Address literal**: [`PeerAddress`] (`A.B.C.D:PORT`)
//! - **Stop signal**: [`Shutdown`] / [`ShutdownSignal`] for long-running loops
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │     Peer session  /  Relay loop         │
//! ├─────────────────────────────────────────┤
//! │         Transport Layer                 │  ← This module
//! │   frames, reassembly, addressing        │
//! ├─────────────────────────────────────────┤
//! │              TCP                        │
//! └─────────────────────────────────────────┘
//! ```
//!
//! The transport layer never looks inside frame bodies. Bodies are opaque
//! ciphertext produced by the peer session.

mod address;
mod codec;
mod error;
mod frame;
mod shutdown;

pub use address::*;
pub use codec::*;
pub use error::*;
pub use frame::*;
pub use shutdown::*;
