//! Scripted device doubles for unit tests.

use std::collections::VecDeque;
use std::time::Duration;

use crate::codec::{FrameDecoder, Packet, MAGIC, MARKER, PACKET_PAYLOAD, PACKET_SIZE};
use crate::error::TransportError;
use crate::messages::{Message, MessageType};
use crate::transport::Transport;

/// Frame a reply the way the device does: header followed by the full payload.
pub(crate) fn reply_packets(kind: u16, data: &[u8]) -> Vec<Packet> {
    let mut frame = Vec::with_capacity(8 + data.len());
    frame.extend_from_slice(&MAGIC);
    frame.extend_from_slice(&kind.to_be_bytes());
    frame.extend_from_slice(&(data.len() as u32).to_be_bytes());
    frame.extend_from_slice(data);
    frame
        .chunks(PACKET_PAYLOAD)
        .map(|chunk| {
            let mut packet = [0u8; PACKET_SIZE];
            packet[0] = MARKER;
            packet[1..=chunk.len()].copy_from_slice(chunk);
            packet
        })
        .collect()
}

/// Plays back queued reply packets and records everything written.
#[derive(Debug, Default)]
pub(crate) struct ScriptedTransport {
    replies: VecDeque<Packet>,
    pub(crate) written: Vec<Packet>,
    /// Timeout passed to each `read_into` call.
    pub(crate) read_timeouts: Vec<Duration>,
    fail_write_at: Option<usize>,
}

impl ScriptedTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn reply<M: prost::Message>(self, kind: MessageType, payload: &M) -> Self {
        self.reply_raw(kind as u16, &payload.encode_to_vec())
    }

    pub(crate) fn reply_raw(mut self, kind: u16, data: &[u8]) -> Self {
        self.replies.extend(reply_packets(kind, data));
        self
    }

    /// Fail the write of the packet with this zero-based index.
    pub(crate) fn fail_write_at(mut self, index: usize) -> Self {
        self.fail_write_at = Some(index);
        self
    }

    /// Messages reassembled from the written packets, in order.
    pub(crate) fn sent(&self) -> Vec<Message> {
        let mut decoder = FrameDecoder::new();
        self.written
            .iter()
            .filter_map(|p| decoder.push(p).ok().flatten())
            .collect()
    }

    pub(crate) fn sent_kinds(&self) -> Vec<MessageType> {
        self.sent()
            .iter()
            .filter_map(|m| m.message_type())
            .collect()
    }
}

impl Transport for ScriptedTransport {
    fn write(&mut self, packet: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        if self.fail_write_at == Some(self.written.len()) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "unplugged",
            )));
        }
        let mut p = [0u8; PACKET_SIZE];
        p[..packet.len()].copy_from_slice(packet);
        self.written.push(p);
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.read_timeouts.push(timeout);
        match self.replies.pop_front() {
            Some(packet) => {
                buf[..PACKET_SIZE].copy_from_slice(&packet);
                Ok(PACKET_SIZE)
            }
            None => Ok(0),
        }
    }
}
