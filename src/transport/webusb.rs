use core::time::Duration;

use log::{debug, info, warn};
use rusb::{Context, Device, DeviceHandle, Direction, TransferType, UsbContext};

use super::usb::{is_skywallet, UsbBackendKind, UsbDeviceInfo};
use super::Transport;
use crate::error::TransportError;

const VENDOR_CLASS: u8 = 0xff;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Endpoints {
    interface: u8,
    input: u8,
    output: u8,
}

/// Finds the vendor-class interface carrying the wallet's interrupt endpoints.
fn vendor_endpoints<T: UsbContext>(device: &Device<T>) -> Option<Endpoints> {
    let config = device.active_config_descriptor().ok()?;
    for interface in config.interfaces() {
        for alt in interface.descriptors() {
            if alt.class_code() != VENDOR_CLASS {
                continue;
            }
            let mut input = None;
            let mut output = None;
            for ep in alt.endpoint_descriptors() {
                if ep.transfer_type() != TransferType::Interrupt {
                    continue;
                }
                match ep.direction() {
                    Direction::In => input = input.or(Some(ep.address())),
                    Direction::Out => output = output.or(Some(ep.address())),
                }
            }
            if let (Some(input), Some(output)) = (input, output) {
                return Some(Endpoints {
                    interface: interface.number(),
                    input,
                    output,
                });
            }
        }
    }
    None
}

fn device_path<T: UsbContext>(device: &Device<T>) -> String {
    format!("webusb:{:03}:{:03}", device.bus_number(), device.address())
}

/// libusb enumeration of devices exposing the WebUSB vendor interface.
pub struct WebUsbBus {
    context: Context,
}

impl WebUsbBus {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self {
            context: Context::new()?,
        })
    }

    pub fn enumerate(&self) -> Result<Vec<UsbDeviceInfo>, TransportError> {
        let mut found = Vec::new();
        for device in self.context.devices()?.iter() {
            let desc = match device.device_descriptor() {
                Ok(desc) => desc,
                Err(e) => {
                    debug!("Skipping device {}: {}", device_path(&device), e);
                    continue;
                }
            };
            if !is_skywallet(desc.vendor_id(), desc.product_id()) {
                continue;
            }
            if vendor_endpoints(&device).is_none() {
                debug!("{} has no vendor interface, leaving it to HID", device_path(&device));
                continue;
            }

            let (manufacturer, product, serial) = match device.open() {
                Ok(handle) => (
                    handle.read_manufacturer_string_ascii(&desc).ok(),
                    handle.read_product_string_ascii(&desc).ok(),
                    handle.read_serial_number_string_ascii(&desc).ok(),
                ),
                Err(e) => {
                    warn!("Cannot read descriptors of {}: {}", device_path(&device), e);
                    (None, None, None)
                }
            };

            found.push(UsbDeviceInfo::new(
                device_path(&device),
                UsbBackendKind::WebUsb,
                desc.vendor_id(),
                desc.product_id(),
                manufacturer,
                product,
                serial,
            ));
        }
        Ok(found)
    }

    pub fn connect(&self, path: &str) -> Result<WebUsbTransport, TransportError> {
        let device = self
            .context
            .devices()?
            .iter()
            .find(|device| device_path(device) == path)
            .ok_or(TransportError::NoDeviceFound)?;
        WebUsbTransport::open(&device)
    }
}

/// Interrupt-endpoint transport over the vendor interface. The interface is
/// claimed for the lifetime of the value.
pub struct WebUsbTransport {
    handle: DeviceHandle<Context>,
    endpoints: Endpoints,
}

impl WebUsbTransport {
    fn open(device: &Device<Context>) -> Result<Self, TransportError> {
        let endpoints = vendor_endpoints(device).ok_or(rusb::Error::NotFound)?;
        let mut handle = device.open()?;

        match handle.set_auto_detach_kernel_driver(true) {
            Err(rusb::Error::NotSupported) => Ok(()),
            x => x,
        }?;
        handle.claim_interface(endpoints.interface)?;

        info!(
            "Claimed WebUSB interface {} (in 0x{:02x}, out 0x{:02x})",
            endpoints.interface, endpoints.input, endpoints.output
        );
        Ok(Self { handle, endpoints })
    }
}

impl Drop for WebUsbTransport {
    fn drop(&mut self) {
        if let Err(e) = self.handle.release_interface(self.endpoints.interface) {
            debug!("Releasing WebUSB interface failed: {}", e);
        }
    }
}

impl Transport for WebUsbTransport {
    fn write(&mut self, packet: &[u8], timeout: Duration) -> Result<(), TransportError> {
        let written = self
            .handle
            .write_interrupt(self.endpoints.output, packet, timeout)?;
        if written != packet.len() {
            return Err(rusb::Error::Other.into());
        }
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        match self
            .handle
            .read_interrupt(self.endpoints.input, buf, timeout)
        {
            Ok(n) => Ok(n),
            Err(rusb::Error::Timeout) => Err(TransportError::Timeout(timeout)),
            Err(e) => Err(e.into()),
        }
    }
}
