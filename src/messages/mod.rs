//! Protocol messages: a numeric kind plus an opaque protobuf payload.

mod protos;
mod timeouts;

pub use protos::*;

use core::fmt;

/// The unit of exchange with the device.
///
/// `data` is only meaningful together with `kind`; use the decoders in
/// [`crate::decode`] to turn a reply into a domain value.
#[derive(Clone, PartialEq, Eq, Default)]
pub struct Message {
    pub kind: u16,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(kind: u16, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Serialize `payload` as the body of a message of the given type.
    pub fn from_proto<M: prost::Message>(kind: MessageType, payload: &M) -> Self {
        Self {
            kind: kind as u16,
            data: payload.encode_to_vec(),
        }
    }

    /// The known message type for this kind, if any.
    pub fn message_type(&self) -> Option<MessageType> {
        MessageType::from_i32(i32::from(self.kind))
    }

    pub fn is(&self, kind: MessageType) -> bool {
        self.kind == kind as u16
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("kind", &kind_name(self.kind))
            .field("len", &self.data.len())
            .finish()
    }
}

/// Human readable name of a message kind, e.g. `ButtonRequest` or `Unknown(999)`.
pub fn kind_name(kind: u16) -> String {
    match MessageType::from_i32(i32::from(kind)) {
        Some(t) => t
            .as_str_name()
            .trim_start_matches("MessageType_")
            .to_string(),
        None => format!("Unknown({kind})"),
    }
}
