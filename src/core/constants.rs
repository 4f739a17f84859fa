//! Protocol constants for the relay chat wire format.
//!
//! Values in the wire section are fixed by the protocol and MUST NOT be changed.

use std::time::Duration;

// =============================================================================
// WIRE FORMAT
// =============================================================================

/// Frame header size (type + nonce + length + sender tag).
pub const HEADER_SIZE: usize = 6;

/// Sender tag size.
pub const SENDER_TAG_SIZE: usize = 2;

/// Largest body a frame can declare (little-endian u16 length field).
pub const MAX_BODY_LEN: usize = u16::MAX as usize;

/// Largest complete frame on the wire.
pub const MAX_FRAME_SIZE: usize = HEADER_SIZE + MAX_BODY_LEN;

// =============================================================================
// FRAME TYPES
// =============================================================================

/// Legacy key checksum frame. Reserved, never emitted.
pub const FRAME_TYPE_KEYSUM: u8 = 0x00;

/// User text message. The only type currently emitted.
pub const FRAME_TYPE_USER: u8 = 0x01;

/// Legacy goodbye frame. Reserved, never emitted.
pub const FRAME_TYPE_BYE: u8 = 0x03;

// =============================================================================
// SENDER TAGS
// =============================================================================

/// Lowest byte a generated sender tag may contain (ASCII space).
pub const TAG_MIN_BYTE: u8 = 32;

/// Highest byte a generated sender tag may contain (ASCII tilde).
pub const TAG_MAX_BYTE: u8 = 126;

// =============================================================================
// RELAY DEFAULTS
// =============================================================================

/// Delay between relay iterations when nothing was ready.
pub const DEFAULT_IDLE_DELAY: Duration = Duration::from_millis(200);

/// Upper bound on a single readiness poll.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(300);

/// Maximum number of simultaneously registered peers.
pub const DEFAULT_MAX_PEERS: usize = 1024;

/// Outbound bytes a peer may have queued before it is dropped as too slow.
pub const DEFAULT_MAX_PENDING_BYTES: usize = 1024 * 1024;

/// Bytes read from one peer per dispatch pass.
pub const DEFAULT_READ_BUDGET: usize = 64 * 1024;

/// Size of each individual socket read.
pub const READ_CHUNK_SIZE: usize = 4096;

// =============================================================================
// SESSION DEFAULTS
// =============================================================================

/// Time allowed for the peer session to establish its connection.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
