//! Message-level exchange over a [`Transport`]: one request out, one reply back.

use std::time::Duration;

use tracing::{debug, info, instrument};

use crate::codec::{self, FrameDecoder, PACKET_SIZE};
use crate::config::TransportConfig;
use crate::error::{ProtocolError, TransportError};
use crate::messages::{kind_name, Message};
use crate::transport::{open_transport, DeviceHandle, DeviceType, Transport};

/// Knows which device variant to talk to and how to open it.
#[derive(Debug, Clone, Default)]
pub struct Driver {
    config: TransportConfig,
}

impl Driver {
    pub fn new(device_type: DeviceType) -> Self {
        Self::with_config(TransportConfig {
            device_type,
            ..TransportConfig::default()
        })
    }

    pub fn with_config(config: TransportConfig) -> Self {
        Self { config }
    }

    pub fn device_type(&self) -> DeviceType {
        self.config.device_type
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// Open a fresh connection. Each call yields an independent handle.
    pub fn get_device(&self) -> Result<DeviceHandle, TransportError> {
        open_transport(&self.config)
    }
}

fn write_message<T: Transport + ?Sized>(dev: &mut T, msg: &Message) -> Result<(), ProtocolError> {
    let packets = codec::encode_message(msg);
    let total = packets.len();
    let timeout = msg.write_timeout();
    for (written, packet) in packets.iter().enumerate() {
        dev.write(packet, timeout)
            .map_err(|source| ProtocolError::PartialWrite {
                written,
                total,
                source,
            })?;
    }
    debug!("Sent {} in {} packet(s)", kind_name(msg.kind), total);
    Ok(())
}

/// Write `msg` without waiting for an answer.
#[instrument(level = "debug", skip_all, fields(kind = %kind_name(msg.kind)))]
pub fn send_no_reply<T: Transport + ?Sized>(
    dev: &mut T,
    msg: &Message,
) -> Result<(), ProtocolError> {
    info!("Sending without reply");
    write_message(dev, msg)
}

/// Write `msg` and read exactly one reply, waiting as long as `msg` needs.
pub fn send<T: Transport + ?Sized>(dev: &mut T, msg: &Message) -> Result<Message, ProtocolError> {
    send_with_timeout(dev, msg, msg.read_timeout())
}

/// Write `msg` and read exactly one reply within `read_timeout`.
#[instrument(
    level = "debug",
    skip_all,
    fields(kind = %kind_name(msg.kind), timeout = ?read_timeout)
)]
pub fn send_with_timeout<T: Transport + ?Sized>(
    dev: &mut T,
    msg: &Message,
    read_timeout: Duration,
) -> Result<Message, ProtocolError> {
    write_message(dev, msg)?;
    let reply = read_message(dev, read_timeout)?;
    info!("Received {} ({} bytes)", kind_name(reply.kind), reply.data.len());
    Ok(reply)
}

/// Read packets until one full message has been reassembled.
pub fn read_message<T: Transport + ?Sized>(
    dev: &mut T,
    timeout: Duration,
) -> Result<Message, ProtocolError> {
    let mut decoder = FrameDecoder::new();
    let mut buf = [0u8; PACKET_SIZE];
    loop {
        let n = dev.read_into(&mut buf, timeout).map_err(ProtocolError::Io)?;
        if n == 0 {
            return Err(decoder.truncated());
        }
        if let Some(msg) = decoder.push(&buf[..n])? {
            return Ok(msg);
        }
    }
}
