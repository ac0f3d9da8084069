use std::time::Duration;

use thiserror::Error;

use crate::messages::kind_name;

/// Failures obtaining or using a connection to the device.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("no hardware wallet device found")]
    NoDeviceFound,
    #[error("could not connect to device after {attempts} attempt(s): {reason}")]
    ConnectFailed { attempts: u32, reason: String },
    #[error("device did not answer within {0:?}")]
    Timeout(Duration),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("USB error: {0}")]
    Usb(#[from] rusb::Error),
    #[error("HID error: {0}")]
    Hid(#[from] hidapi::HidError),
}

/// Framing and exchange-level protocol violations.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("bad frame magic: expected \"##\", got {0:02x?}")]
    BadMagic([u8; 2]),
    #[error("packet does not start with the continuation marker (got 0x{0:02x})")]
    BadMarker(u8),
    #[error("frame truncated: expected {expected} payload bytes, got {received}")]
    Truncated { expected: usize, received: usize },
    #[error("unexpected message kind {}", kind_name(*.0))]
    UnexpectedMessageKind(u16),
    #[error("write aborted after {written} of {total} packet(s): {source}")]
    PartialWrite {
        written: usize,
        total: usize,
        #[source]
        source: TransportError,
    },
    #[error("read failed: {0}")]
    Io(#[source] TransportError),
}

/// A response decoder was handed a message it cannot decode.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("calling {decoder} with wrong message type: {}", kind_name(*.actual))]
    WrongKind { decoder: &'static str, actual: u16 },
    #[error("malformed payload: {0}")]
    MalformedPayload(#[from] prost::DecodeError),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error(transparent)]
    Protocol(#[from] ProtocolError),
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error("session is {state}, cannot {action}")]
    InvalidState { state: String, action: &'static str },
    #[error("invalid parameters: {0}")]
    InvalidParams(String),
    #[error("operation cancelled by the user")]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
