//! Streaming frame reassembly.
//!
//! A byte stream delivers frames in arbitrary chunks: a read may stop in the
//! middle of a header, or carry the tail of one frame and the start of the
//! next. [`FrameCodec`] implements the `tokio_util` codec traits over a
//! `BytesMut` accumulation buffer; [`FrameReassembler`] owns such a buffer
//! for one connection.
//!
//! A frame is complete once the buffer holds `6 + declared length` bytes.
//! Exactly that many bytes are split off; anything after them stays in the
//! buffer as the start of the next frame.

use bytes::{Buf, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use super::frame::{Frame, FrameError, FrameHeader};
use crate::core::{HEADER_SIZE, MAX_BODY_LEN};

/// Codec for the 6-byte-header frame format.
#[derive(Debug, Clone, Copy, Default)]
pub struct FrameCodec;

impl FrameCodec {
    /// Create a new codec.
    pub fn new() -> Self {
        Self
    }
}

impl Decoder for FrameCodec {
    type Item = Frame;
    type Error = FrameError;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Frame>, FrameError> {
        // Header not yet available
        if src.len() < HEADER_SIZE {
            return Ok(None);
        }

        let header = FrameHeader::from_bytes(&src[..HEADER_SIZE])?;
        let needed = header.frame_len();

        if src.len() < needed {
            src.reserve(needed - src.len());
            return Ok(None);
        }

        // Split off exactly this frame; pipelined bytes stay in `src`
        let mut raw = src.split_to(needed);
        raw.advance(HEADER_SIZE);

        Frame::from_parts(header, raw.freeze()).map(Some)
    }
}

impl Encoder<Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        <Self as Encoder<&Frame>>::encode(self, &item, dst)
    }
}

impl<'a> Encoder<&'a Frame> for FrameCodec {
    type Error = FrameError;

    fn encode(&mut self, item: &'a Frame, dst: &mut BytesMut) -> Result<(), FrameError> {
        if item.body.len() > MAX_BODY_LEN {
            return Err(FrameError::BodyTooLong {
                len: item.body.len(),
                max: MAX_BODY_LEN,
            });
        }
        item.encode_into(dst);
        Ok(())
    }
}

/// Per-connection accumulation buffer plus decoder.
#[derive(Debug, Default)]
pub struct FrameReassembler {
    buffer: BytesMut,
    codec: FrameCodec,
}

impl FrameReassembler {
    /// Create an empty reassembler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a received chunk.
    pub fn push(&mut self, chunk: &[u8]) {
        self.buffer.extend_from_slice(chunk);
    }

    /// Buffer to read into directly, with at least `additional` spare capacity.
    pub fn read_buf(&mut self, additional: usize) -> &mut BytesMut {
        self.buffer.reserve(additional);
        &mut self.buffer
    }

    /// Take the next complete frame, if one is buffered.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, FrameError> {
        self.codec.decode(&mut self.buffer)
    }

    /// Take every complete frame currently buffered, in arrival order.
    pub fn drain_frames(&mut self) -> Result<Vec<Frame>, FrameError> {
        let mut frames = Vec::new();
        while let Some(frame) = self.next_frame()? {
            frames.push(frame);
        }
        Ok(frames)
    }

    /// Bytes still missing before the buffered frame is complete.
    ///
    /// While the header is incomplete this counts only the header bytes.
    pub fn needed(&self) -> usize {
        if self.buffer.len() < HEADER_SIZE {
            return HEADER_SIZE - self.buffer.len();
        }
        match FrameHeader::from_bytes(&self.buffer[..HEADER_SIZE]) {
            Ok(header) => header.frame_len().saturating_sub(self.buffer.len()),
            Err(_) => 0,
        }
    }

    /// Number of buffered bytes not yet consumed as frames.
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Whether a partial frame is waiting for more bytes.
    pub fn has_partial(&self) -> bool {
        !self.buffer.is_empty()
    }
}
