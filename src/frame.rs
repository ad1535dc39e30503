//! Byte-stream framing for the Velbus wire format.
//!
//! Every frame is `STX | priority | address | RTR+length | data[0..8] |
//! checksum | ETX`. The checksum is the two's complement of the sum of all
//! preceding bytes, mod 256. The first data byte, when present, is the
//! command byte.

use crate::consts::*;
use crate::error::FrameError;
use bytes::{BufMut, Bytes, BytesMut};
use std::fmt;

/// A single decoded bus frame.
#[derive(Clone, PartialEq, Eq)]
pub struct RawMessage {
    pub priority: u8,
    pub address: u8,
    pub rtr: bool,
    pub data: Vec<u8>,
}

impl RawMessage {
    pub fn new(priority: u8, address: u8, rtr: bool, data: Vec<u8>) -> Self {
        debug_assert!(data.len() <= MAX_DATA_SIZE);
        Self {
            priority,
            address,
            rtr,
            data,
        }
    }

    /// The command byte, i.e. the first data byte.
    pub fn command(&self) -> Option<u8> {
        self.data.first().copied()
    }

    /// The data bytes after the command byte.
    pub fn data_only(&self) -> &[u8] {
        if self.data.len() > 1 {
            &self.data[1..]
        } else {
            &[]
        }
    }

    /// Encode to wire bytes. Total and infallible for any valid message.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(MIN_FRAME_SIZE + self.data.len());
        buf.put_u8(START_BYTE);
        buf.put_u8(self.priority);
        buf.put_u8(self.address);
        let rtr = if self.rtr { RTR } else { 0x00 };
        buf.put_u8(rtr | (self.data.len() as u8));
        buf.put_slice(&self.data);
        buf.put_u8(checksum(&buf));
        buf.put_u8(END_BYTE);
        buf.freeze()
    }
}

impl fmt::Debug for RawMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RawMessage(priority={:02x}, address={:02x}, rtr={}, data={})",
            self.priority,
            self.address,
            self.rtr,
            hex::encode(&self.data)
        )
    }
}

/// Two's complement of the byte sum, mod 256.
pub fn checksum(data: &[u8]) -> u8 {
    let sum: u32 = data.iter().map(|b| *b as u32).sum();
    (((sum ^ 0xFF) + 1) & 0xFF) as u8
}

/// Pull the next complete frame out of `buf`.
///
/// Leading garbage is discarded until a start byte lines up at position 0.
/// A frame that looks complete but fails priority, end-byte or checksum
/// validation costs one byte of buffer and the scan restarts, so a
/// corrupted stream re-synchronizes on the next genuine start byte.
/// Returns `None` when the buffer does not yet hold a full frame.
pub fn next_frame(buf: &mut BytesMut) -> Option<RawMessage> {
    loop {
        trim_garbage(buf);
        if buf.len() < MIN_FRAME_SIZE {
            return None;
        }
        match parse_front(buf) {
            Ok(Some((msg, consumed))) => {
                let _ = buf.split_to(consumed);
                return Some(msg);
            }
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(
                    "could not parse frame {}: {err}, truncating invalid data",
                    hex::encode(&buf[..])
                );
                let _ = buf.split_to(1);
            }
        }
    }
}

/// Try to parse one frame at the front of the buffer. `Ok(None)` means the
/// frame is not fully buffered yet.
fn parse_front(buf: &[u8]) -> Result<Option<(RawMessage, usize)>, FrameError> {
    debug_assert_eq!(buf[0], START_BYTE);

    let priority = buf[1];
    if !PRIORITIES.contains(&priority) {
        return Err(FrameError::BadPriority(priority));
    }

    let address = buf[2];
    let rtr = buf[3] & RTR == RTR;
    let data_size = (buf[3] & LENGTH_MASK) as usize;

    let total = HEADER_LENGTH + data_size + TAIL_LENGTH;
    if buf.len() < total {
        return Ok(None);
    }

    let end = buf[total - 1];
    if end != END_BYTE {
        return Err(FrameError::BadEnd(end));
    }

    let expected = checksum(&buf[..HEADER_LENGTH + data_size]);
    let actual = buf[HEADER_LENGTH + data_size];
    if expected != actual {
        return Err(FrameError::BadChecksum { expected, actual });
    }

    let data = buf[HEADER_LENGTH..HEADER_LENGTH + data_size].to_vec();
    Ok(Some((RawMessage::new(priority, address, rtr, data), total)))
}

fn trim_garbage(buf: &mut BytesMut) {
    if buf.first() == Some(&START_BYTE) {
        return;
    }
    match buf.iter().position(|b| *b == START_BYTE) {
        Some(pos) => {
            let _ = buf.split_to(pos);
        }
        None => buf.clear(),
    }
}
