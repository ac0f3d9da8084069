use std::ffi::CString;
use std::io;
use std::time::Duration;

use hidapi::{HidApi, HidDevice};
use log::{debug, info};

use super::usb::{is_skywallet, UsbBackendKind, UsbDeviceInfo};
use super::Transport;
use crate::error::TransportError;

const HID_REPORT_SIZE: usize = 64;
const REPORT_ID: u8 = 0;
// Interface 1 is the firmware's debug link.
const DEBUG_INTERFACE: i32 = 1;

/// HID enumeration and connection for older firmware without a vendor interface.
pub struct HidBus {
    api: HidApi,
}

impl HidBus {
    pub fn new() -> Result<Self, TransportError> {
        Ok(Self { api: HidApi::new()? })
    }

    pub fn enumerate(&self) -> Vec<UsbDeviceInfo> {
        self.api
            .device_list()
            .filter(|info| is_skywallet(info.vendor_id(), info.product_id()))
            .filter(|info| info.interface_number() != DEBUG_INTERFACE)
            .map(|info| {
                UsbDeviceInfo::new(
                    info.path().to_string_lossy().into_owned(),
                    UsbBackendKind::Hid,
                    info.vendor_id(),
                    info.product_id(),
                    info.manufacturer_string().map(str::to_owned),
                    info.product_string().map(str::to_owned),
                    info.serial_number().map(str::to_owned),
                )
            })
            .collect()
    }

    pub fn connect(&self, path: &str) -> Result<HidTransport, TransportError> {
        let path = CString::new(path).map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;
        let device = self.api.open_path(&path)?;
        info!("Opened HID device at {:?}", path);
        Ok(HidTransport { device })
    }
}

pub struct HidTransport {
    device: HidDevice,
}

impl Transport for HidTransport {
    fn write(&mut self, packet: &[u8], _timeout: Duration) -> Result<(), TransportError> {
        let len = packet.len().min(HID_REPORT_SIZE);
        let mut report = [0u8; HID_REPORT_SIZE + 1];
        report[0] = REPORT_ID;
        report[1..=len].copy_from_slice(&packet[..len]);

        let written = self.device.write(&report)?;
        debug!("HID write: {} bytes", written);
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        let timeout_ms = i32::try_from(timeout.as_millis()).unwrap_or(i32::MAX);
        let n = self.device.read_timeout(buf, timeout_ms)?;
        if n == 0 {
            return Err(TransportError::Timeout(timeout));
        }
        debug!("HID read: {} bytes", n);
        Ok(n)
    }
}
