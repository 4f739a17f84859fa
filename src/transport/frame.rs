//! Frame encoding and decoding for the relay chat wire format.
//!
//! Wire format (6-byte header followed by the body):
//! ```text
//! +--------+--------+------------------+--------------+----------------+
//! | Type   | Nonce  | Body length      | Sender tag   | Body           |
//! | 1 byte | 1 byte | 2 bytes (LE16)   | 2 bytes      | length bytes   |
//! +--------+--------+------------------+--------------+----------------+
//! ```
//!
//! The body is already ciphertext when it reaches this module. Encryption is
//! the sender's job; the relay forwards bodies without looking at them.

use std::fmt;
use std::io;

use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::core::{
    FRAME_TYPE_BYE, FRAME_TYPE_KEYSUM, FRAME_TYPE_USER, HEADER_SIZE, MAX_BODY_LEN,
    SENDER_TAG_SIZE,
};

/// Frame type identifiers.
///
/// Only [`FrameType::UserMessage`] is ever emitted. The other values are
/// legacy names kept so the byte values stay reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum FrameType {
    /// Legacy key checksum announcement.
    KeySum = FRAME_TYPE_KEYSUM,
    /// User text message.
    UserMessage = FRAME_TYPE_USER,
    /// Legacy goodbye notice.
    Bye = FRAME_TYPE_BYE,
}

impl FrameType {
    /// Parse frame type from a byte.
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            FRAME_TYPE_KEYSUM => Some(Self::KeySum),
            FRAME_TYPE_USER => Some(Self::UserMessage),
            FRAME_TYPE_BYE => Some(Self::Bye),
            _ => None,
        }
    }

    /// Convert frame type to its byte representation.
    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

/// Two-byte identifier chosen by a sender at session start.
///
/// Tags are not unique across peers and carry no authentication meaning.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SenderTag([u8; SENDER_TAG_SIZE]);

impl SenderTag {
    /// Create a tag from raw bytes.
    pub fn from_bytes(bytes: [u8; SENDER_TAG_SIZE]) -> Self {
        Self(bytes)
    }

    /// Get the raw tag bytes.
    pub fn as_bytes(&self) -> &[u8; SENDER_TAG_SIZE] {
        &self.0
    }

    /// Draw a tag uniformly from printable ASCII (32..=126).
    #[cfg(feature = "crypto")]
    pub fn generate<R: rand::Rng + ?Sized>(rng: &mut R) -> Self {
        use crate::core::{TAG_MAX_BYTE, TAG_MIN_BYTE};

        Self([
            rng.gen_range(TAG_MIN_BYTE..=TAG_MAX_BYTE),
            rng.gen_range(TAG_MIN_BYTE..=TAG_MAX_BYTE),
        ])
    }
}

impl fmt::Display for SenderTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for &b in &self.0 {
            if b.is_ascii_graphic() || b == b' ' {
                write!(f, "{}", b as char)?;
            } else {
                write!(f, "\\x{:02x}", b)?;
            }
        }
        Ok(())
    }
}

impl From<[u8; SENDER_TAG_SIZE]> for SenderTag {
    fn from(bytes: [u8; SENDER_TAG_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Decoded frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    /// Raw type byte. Unknown values are preserved so the relay can forward them.
    pub frame_type: u8,
    /// Per-message nonce used by the keystream cipher.
    pub nonce: u8,
    /// Declared body length.
    pub length: u16,
    /// Sender tag.
    pub sender: SenderTag,
}

impl FrameHeader {
    /// Serialize header to bytes (6 bytes).
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let len = self.length.to_le_bytes();
        let tag = self.sender.as_bytes();
        [self.frame_type, self.nonce, len[0], len[1], tag[0], tag[1]]
    }

    /// Parse header from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() < HEADER_SIZE {
            return Err(FrameError::TooShort {
                expected: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            frame_type: bytes[0],
            nonce: bytes[1],
            length: u16::from_le_bytes([bytes[2], bytes[3]]),
            sender: SenderTag::from_bytes([bytes[4], bytes[5]]),
        })
    }

    /// Known frame type, if the type byte is one.
    pub fn kind(&self) -> Option<FrameType> {
        FrameType::from_byte(self.frame_type)
    }

    /// Total size of the frame this header introduces.
    pub fn frame_len(&self) -> usize {
        HEADER_SIZE + self.length as usize
    }
}

/// One complete protocol message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Raw type byte.
    pub frame_type: u8,
    /// Per-message nonce.
    pub nonce: u8,
    /// Sender tag.
    pub sender: SenderTag,
    /// Body bytes (ciphertext).
    pub body: Bytes,
}

impl Frame {
    /// Create a frame, rejecting bodies the length field cannot describe.
    pub fn new(
        frame_type: FrameType,
        nonce: u8,
        sender: SenderTag,
        body: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        let body = body.into();
        if body.len() > MAX_BODY_LEN {
            return Err(FrameError::BodyTooLong {
                len: body.len(),
                max: MAX_BODY_LEN,
            });
        }
        Ok(Self {
            frame_type: frame_type.as_byte(),
            nonce,
            sender,
            body,
        })
    }

    /// Create a user message frame.
    pub fn user_message(
        nonce: u8,
        sender: SenderTag,
        body: impl Into<Bytes>,
    ) -> Result<Self, FrameError> {
        Self::new(FrameType::UserMessage, nonce, sender, body)
    }

    /// Split a header and a body that matches its declared length.
    pub fn from_parts(header: FrameHeader, body: Bytes) -> Result<Self, FrameError> {
        if body.len() != header.length as usize {
            return Err(FrameError::LengthMismatch {
                expected: header.length as usize,
                actual: body.len(),
            });
        }
        Ok(Self {
            frame_type: header.frame_type,
            nonce: header.nonce,
            sender: header.sender,
            body,
        })
    }

    /// Known frame type, if the type byte is one.
    pub fn kind(&self) -> Option<FrameType> {
        FrameType::from_byte(self.frame_type)
    }

    /// The header describing this frame.
    pub fn header(&self) -> FrameHeader {
        FrameHeader {
            frame_type: self.frame_type,
            nonce: self.nonce,
            length: self.body.len() as u16,
            sender: self.sender,
        }
    }

    /// Total encoded size.
    pub fn encoded_len(&self) -> usize {
        HEADER_SIZE + self.body.len()
    }

    /// Append the wire encoding to `dst`.
    pub fn encode_into(&self, dst: &mut BytesMut) {
        debug_assert!(
            self.body.len() <= MAX_BODY_LEN,
            "frame body of {} bytes exceeds the u16 length field",
            self.body.len()
        );
        dst.reserve(self.encoded_len());
        dst.put_slice(&self.header().to_bytes());
        dst.put_slice(&self.body);
    }

    /// Wire encoding of this frame.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode_into(&mut buf);
        buf.freeze()
    }

    /// Parse exactly one frame from the start of `data`.
    ///
    /// Trailing bytes beyond the declared length are ignored.
    pub fn from_bytes(data: &[u8]) -> Result<Self, FrameError> {
        let header = FrameHeader::from_bytes(data)?;
        let end = header.frame_len();
        if data.len() < end {
            return Err(FrameError::TooShort {
                expected: end,
                actual: data.len(),
            });
        }
        Self::from_parts(header, Bytes::copy_from_slice(&data[HEADER_SIZE..end]))
    }
}

/// Errors that can occur during frame encoding or parsing.
#[derive(Debug, Error)]
pub enum FrameError {
    /// Not enough bytes for the header or declared body.
    #[error("frame too short: expected at least {expected} bytes, got {actual}")]
    TooShort {
        /// Minimum expected size.
        expected: usize,
        /// Actual size available.
        actual: usize,
    },

    /// Body does not fit the 16-bit length field.
    #[error("frame body too long: {len} bytes (max {max})")]
    BodyTooLong {
        /// Body length.
        len: usize,
        /// Largest encodable body.
        max: usize,
    },

    /// Body length differs from the header's declared length.
    #[error("body length mismatch: header says {expected}, but {actual} bytes given")]
    LengthMismatch {
        /// Length declared by the header.
        expected: usize,
        /// Actual body length.
        actual: usize,
    },

    /// I/O error surfaced through the codec.
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
}
