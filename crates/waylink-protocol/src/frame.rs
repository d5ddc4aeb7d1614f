//! Frame layout: the 8-byte message header and a splitter for byte streams.
//!
//! ```text
//! ┌──────────────┬──────────────────────────┬──────────────────┐
//! │ object id    │ size << 16 | opcode      │ argument payload │
//! │ (4 bytes)    │ (4 bytes)                │ (size - 8 bytes) │
//! └──────────────┴──────────────────────────┴──────────────────┘
//! ```
//!
//! `size` is the *total* frame length, header included, so the smallest
//! legal frame is 8 bytes and the largest is 65535.

use crate::{ByteOrder, ObjectId, ProtocolError};

/// Length of the fixed header.
pub const HEADER_LEN: usize = 8;

/// Largest frame the 16-bit size field can describe.
pub const MAX_FRAME_LEN: usize = u16::MAX as usize;

/// The two header words of a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MessageHeader {
    pub object_id: ObjectId,
    pub opcode: u16,
    /// Total frame length including the header.
    pub size: u16,
}

impl MessageHeader {
    /// Header for a message carrying `payload_len` bytes of arguments.
    ///
    /// # Errors
    /// [`ProtocolError::FrameTooLarge`] if the frame wouldn't fit in the
    /// 16-bit size field.
    pub fn for_payload(
        object_id: ObjectId,
        opcode: u16,
        payload_len: usize,
    ) -> Result<Self, ProtocolError> {
        let total = payload_len + HEADER_LEN;
        let size = u16::try_from(total).map_err(|_| ProtocolError::FrameTooLarge(total))?;
        Ok(Self {
            object_id,
            opcode,
            size,
        })
    }

    pub fn encode(&self, order: ByteOrder) -> [u8; HEADER_LEN] {
        let mut out = [0u8; HEADER_LEN];
        out[..4].copy_from_slice(&order.u32_bytes(self.object_id.0));
        let word = (u32::from(self.size) << 16) | u32::from(self.opcode);
        out[4..].copy_from_slice(&order.u32_bytes(word));
        out
    }

    /// Reads a header from the first 8 bytes of `bytes`.
    ///
    /// Returns `Ok(None)` if fewer than 8 bytes are available.
    pub fn decode(order: ByteOrder, bytes: &[u8]) -> Result<Option<Self>, ProtocolError> {
        if bytes.len() < HEADER_LEN {
            return Ok(None);
        }
        let object_id = order.u32_from([bytes[0], bytes[1], bytes[2], bytes[3]]);
        let word = order.u32_from([bytes[4], bytes[5], bytes[6], bytes[7]]);
        let size = (word >> 16) as u16;
        if usize::from(size) < HEADER_LEN {
            return Err(ProtocolError::InvalidFrameSize(size));
        }
        Ok(Some(Self {
            object_id: ObjectId(object_id),
            opcode: (word & 0xFFFF) as u16,
            size,
        }))
    }
}

/// Builds one complete outbound frame: header followed by `payload`.
pub fn encode_frame(
    order: ByteOrder,
    object_id: ObjectId,
    opcode: u16,
    payload: &[u8],
) -> Result<Vec<u8>, ProtocolError> {
    let header = MessageHeader::for_payload(object_id, opcode, payload.len())?;
    let mut frame = Vec::with_capacity(usize::from(header.size));
    frame.extend_from_slice(&header.encode(order));
    frame.extend_from_slice(payload);
    Ok(frame)
}

/// One complete inbound message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub object_id: ObjectId,
    pub opcode: u16,
    pub payload: Vec<u8>,
}

/// Splits a byte stream into frames.
///
/// A single read may carry several frames back to back, or stop in the
/// middle of one. Bytes are buffered until a whole frame (as declared by
/// its header) is available.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    order: ByteOrder,
}

impl FrameDecoder {
    pub fn new(order: ByteOrder) -> Self {
        Self {
            buf: Vec::new(),
            order,
        }
    }

    /// Appends freshly read bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pops the next complete frame, if one is buffered.
    ///
    /// # Errors
    /// [`ProtocolError::InvalidFrameSize`] if a header declares fewer than
    /// 8 bytes. The stream can't be resynchronised after that, so the
    /// caller should drop the connection.
    pub fn next_frame(&mut self) -> Result<Option<Frame>, ProtocolError> {
        let Some(header) = MessageHeader::decode(self.order, &self.buf)? else {
            return Ok(None);
        };
        let size = usize::from(header.size);
        if self.buf.len() < size {
            return Ok(None);
        }
        let payload = self.buf[HEADER_LEN..size].to_vec();
        self.buf.drain(..size);
        Ok(Some(Frame {
            object_id: header.object_id,
            opcode: header.opcode,
            payload,
        }))
    }

    /// Number of buffered bytes not yet returned as a frame.
    pub fn pending(&self) -> usize {
        self.buf.len()
    }
}
