//! Frame codec: splits a [`Message`] into fixed-size transport packets and
//! reassembles packets coming back from the device.
//!
//! Outgoing frame layout, chunked 63 bytes at a time behind a `?` marker:
//!
//! ```text
//! [#][#][kind: u16 BE][len: u32 BE][\n][payload[1..]]
//! ```
//!
//! `len` is the full payload length while the newline takes the place of the
//! payload's first byte. For protobuf bodies starting with field 1
//! (length-delimited) that byte is the 0x0a tag itself. Replies from the
//! device carry `[#][#][kind][len][payload]` with no such substitution.

use std::mem;

use log::{debug, trace};

use crate::error::ProtocolError;
use crate::messages::Message;

pub const PACKET_SIZE: usize = 64;
/// Usable bytes per packet once the continuation marker is in place.
pub const PACKET_PAYLOAD: usize = PACKET_SIZE - 1;
pub const MARKER: u8 = b'?';
pub const MAGIC: [u8; 2] = *b"##";
/// Magic, kind and length as seen by the decoder.
pub const HEADER_LEN: usize = 8;
/// Outgoing header, including the trailing newline.
pub const ENCODED_HEADER_LEN: usize = HEADER_LEN + 1;

pub type Packet = [u8; PACKET_SIZE];

/// Serialize `kind` and `payload` into zero-padded 64-byte packets.
///
/// An empty payload still yields one packet carrying only the header.
pub fn encode(kind: u16, payload: &[u8]) -> Vec<Packet> {
    let mut frame = Vec::with_capacity(ENCODED_HEADER_LEN + payload.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&kind.to_be_bytes());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.push(b'\n');
    if let Some(rest) = payload.get(1..) {
        frame.extend_from_slice(rest);
    }

    let packets: Vec<Packet> = frame
        .chunks(PACKET_PAYLOAD)
        .map(|chunk| {
            let mut packet = [0u8; PACKET_SIZE];
            packet[0] = MARKER;
            packet[1..=chunk.len()].copy_from_slice(chunk);
            packet
        })
        .collect();

    trace!(
        "encode: kind {} payload {} bytes -> {} packet(s)",
        kind,
        payload.len(),
        packets.len()
    );
    packets
}

pub fn encode_message(msg: &Message) -> Vec<Packet> {
    encode(msg.kind, &msg.data)
}

/// Incremental reassembly of one message from a packet stream.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: Vec<u8>,
    header: Option<(u16, usize)>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed the next packet. Returns the message once `len` payload bytes
    /// have been collected; trailing padding is discarded.
    pub fn push(&mut self, packet: &[u8]) -> Result<Option<Message>, ProtocolError> {
        let Some((&marker, body)) = packet.split_first() else {
            return Ok(None);
        };
        if marker != MARKER {
            return Err(ProtocolError::BadMarker(marker));
        }
        self.buf.extend_from_slice(body);

        if self.header.is_none() && self.buf.len() >= HEADER_LEN {
            if self.buf[..2] != MAGIC {
                return Err(ProtocolError::BadMagic([self.buf[0], self.buf[1]]));
            }
            let kind = u16::from_be_bytes([self.buf[2], self.buf[3]]);
            let len =
                u32::from_be_bytes([self.buf[4], self.buf[5], self.buf[6], self.buf[7]]) as usize;
            debug!("decode: header kind {} length {}", kind, len);
            self.buf.drain(..HEADER_LEN);
            self.header = Some((kind, len));
        }

        match self.header {
            Some((kind, len)) if self.buf.len() >= len => {
                let mut data = mem::take(&mut self.buf);
                data.truncate(len);
                self.header = None;
                Ok(Some(Message { kind, data }))
            }
            _ => Ok(None),
        }
    }

    /// The error to report when the stream ends before the frame is complete.
    pub fn truncated(&self) -> ProtocolError {
        match self.header {
            Some((_, len)) => ProtocolError::Truncated {
                expected: len,
                received: self.buf.len(),
            },
            None => ProtocolError::Truncated {
                expected: HEADER_LEN,
                received: self.buf.len(),
            },
        }
    }
}

/// Decode exactly one message from an in-order packet stream.
pub fn decode<I, P>(packets: I) -> Result<Message, ProtocolError>
where
    I: IntoIterator<Item = P>,
    P: AsRef<[u8]>,
{
    let mut decoder = FrameDecoder::new();
    for packet in packets {
        if let Some(msg) = decoder.push(packet.as_ref())? {
            return Ok(msg);
        }
    }
    Err(decoder.truncated())
}
