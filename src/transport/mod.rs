pub mod emulator;
pub mod hid;
pub mod retry;
pub mod usb;
pub mod webusb;

pub use emulator::*;
pub use hid::*;
pub use retry::*;
pub use usb::*;
pub use webusb::*;

use core::fmt;
use core::str::FromStr;
use core::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::TransportConfig;
use crate::error::TransportError;

/// Raw packet I/O against an open device connection.
///
/// Implementations move whole 64-byte packets; framing is the codec's job.
pub trait Transport {
    fn write(&mut self, packet: &[u8], timeout: Duration) -> Result<(), TransportError>;

    /// Read one packet into `buf` and return how many bytes arrived.
    /// `Ok(0)` means the link closed.
    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn write(&mut self, packet: &[u8], timeout: Duration) -> Result<(), TransportError> {
        (**self).write(packet, timeout)
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read_into(buf, timeout)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn write(&mut self, packet: &[u8], timeout: Duration) -> Result<(), TransportError> {
        (**self).write(packet, timeout)
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        (**self).read_into(buf, timeout)
    }
}

/// Which kind of device a driver talks to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceType {
    #[default]
    Usb,
    Emulator,
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceType::Usb => f.write_str("USB"),
            DeviceType::Emulator => f.write_str("EMULATOR"),
        }
    }
}

#[derive(Debug, Error)]
#[error("invalid device type {0:?}, expected USB or EMULATOR")]
pub struct ParseDeviceTypeError(pub String);

impl FromStr for DeviceType {
    type Err = ParseDeviceTypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "USB" => Ok(DeviceType::Usb),
            "EMULATOR" => Ok(DeviceType::Emulator),
            _ => Err(ParseDeviceTypeError(s.to_string())),
        }
    }
}

/// An open, exclusively owned connection to either device variant.
pub enum DeviceHandle {
    Usb(UsbTransport),
    Emulator(EmulatorTransport),
}

impl DeviceHandle {
    pub fn device_type(&self) -> DeviceType {
        match self {
            DeviceHandle::Usb(_) => DeviceType::Usb,
            DeviceHandle::Emulator(_) => DeviceType::Emulator,
        }
    }
}

impl fmt::Debug for DeviceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceHandle::Usb(t) => f.debug_tuple("Usb").field(&t.backend()).finish(),
            DeviceHandle::Emulator(t) => f.debug_tuple("Emulator").field(&t.peer()).finish(),
        }
    }
}

impl Transport for DeviceHandle {
    fn write(&mut self, packet: &[u8], timeout: Duration) -> Result<(), TransportError> {
        match self {
            DeviceHandle::Usb(t) => t.write(packet, timeout),
            DeviceHandle::Emulator(t) => t.write(packet, timeout),
        }
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        match self {
            DeviceHandle::Usb(t) => t.read_into(buf, timeout),
            DeviceHandle::Emulator(t) => t.read_into(buf, timeout),
        }
    }
}

impl From<UsbTransport> for DeviceHandle {
    fn from(t: UsbTransport) -> Self {
        Self::Usb(t)
    }
}

impl From<EmulatorTransport> for DeviceHandle {
    fn from(t: EmulatorTransport) -> Self {
        Self::Emulator(t)
    }
}

/// Open a connection for the configured device variant.
pub fn open_transport(config: &TransportConfig) -> Result<DeviceHandle, TransportError> {
    info!("Opening {} transport", config.device_type);
    match config.device_type {
        DeviceType::Usb => Ok(open_usb(&config.retry)?.into()),
        DeviceType::Emulator => Ok(EmulatorTransport::connect(config.emulator_addr)?.into()),
    }
}
