use std::time::Duration;

use log::{info, warn};
use serde::{Deserialize, Serialize};

use super::hid::{HidBus, HidTransport};
use super::retry::RetryPolicy;
use super::webusb::{WebUsbBus, WebUsbTransport};
use super::Transport;
use crate::error::TransportError;

pub const SKYWALLET_VID: u16 = 0x313a;
pub const SKYWALLET_PID: u16 = 0x0001;

pub fn is_skywallet(vid: u16, pid: u16) -> bool {
    vid == SKYWALLET_VID && pid == SKYWALLET_PID
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsbBackendKind {
    WebUsb,
    Hid,
}

/// A wallet found on the bus, before any connection is made.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsbDeviceInfo {
    pub path: String,
    pub backend: UsbBackendKind,
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub manufacturer: Option<String>,
    pub product: Option<String>,
    pub serial_number: Option<String>,
}

impl UsbDeviceInfo {
    pub fn new(
        path: String,
        backend: UsbBackendKind,
        vendor_id: u16,
        product_id: u16,
        manufacturer: Option<String>,
        product: Option<String>,
        serial_number: Option<String>,
    ) -> Self {
        let name = match (&product, &manufacturer) {
            (Some(p), Some(m)) => format!("{} - {}", m, p),
            (Some(p), None) => p.clone(),
            (None, Some(m)) => m.clone(),
            (None, None) => format!("Skywallet (VID: {:04x}, PID: {:04x})", vendor_id, product_id),
        };
        Self {
            path,
            backend,
            name,
            vendor_id,
            product_id,
            manufacturer,
            product,
            serial_number,
        }
    }
}

/// Something that can list wallets and open one of them.
pub trait UsbBackend {
    type Device;

    fn enumerate(&self) -> Result<Vec<UsbDeviceInfo>, TransportError>;
    fn connect(&self, info: &UsbDeviceInfo) -> Result<Self::Device, TransportError>;
}

/// Open the first enumerated wallet, retrying the connection per `policy`.
pub fn connect_first<B, S>(
    backend: &B,
    policy: &RetryPolicy,
    sleep: S,
) -> Result<B::Device, TransportError>
where
    B: UsbBackend,
    S: FnMut(Duration),
{
    let devices = backend.enumerate()?;
    let first = devices.first().ok_or(TransportError::NoDeviceFound)?;
    info!(
        "Connecting to {} at {} ({} candidate(s))",
        first.name,
        first.path,
        devices.len()
    );
    policy.retry(|_| backend.connect(first), sleep)
}

/// Both USB stacks, WebUSB listed ahead of HID.
pub struct UsbBus {
    webusb: Option<WebUsbBus>,
    hid: Option<HidBus>,
}

impl UsbBus {
    pub fn init() -> Result<Self, TransportError> {
        let webusb = WebUsbBus::new();
        let hid = HidBus::new();
        match (webusb, hid) {
            (Err(e), Err(hid_err)) => {
                warn!("HID unavailable: {}", hid_err);
                Err(e)
            }
            (webusb, hid) => Ok(Self {
                webusb: webusb.map_err(|e| warn!("WebUSB unavailable: {}", e)).ok(),
                hid: hid.map_err(|e| warn!("HID unavailable: {}", e)).ok(),
            }),
        }
    }
}

impl UsbBackend for UsbBus {
    type Device = UsbTransport;

    fn enumerate(&self) -> Result<Vec<UsbDeviceInfo>, TransportError> {
        let mut devices = Vec::new();
        if let Some(webusb) = &self.webusb {
            devices.extend(webusb.enumerate()?);
        }
        if let Some(hid) = &self.hid {
            devices.extend(hid.enumerate());
        }
        Ok(devices)
    }

    fn connect(&self, info: &UsbDeviceInfo) -> Result<UsbTransport, TransportError> {
        match info.backend {
            UsbBackendKind::WebUsb => self
                .webusb
                .as_ref()
                .ok_or(TransportError::NoDeviceFound)?
                .connect(&info.path)
                .map(UsbTransport::WebUsb),
            UsbBackendKind::Hid => self
                .hid
                .as_ref()
                .ok_or(TransportError::NoDeviceFound)?
                .connect(&info.path)
                .map(UsbTransport::Hid),
        }
    }
}

/// Enumerate and open the first attached wallet.
pub fn open_usb(policy: &RetryPolicy) -> Result<UsbTransport, TransportError> {
    let bus = UsbBus::init()?;
    connect_first(&bus, policy, std::thread::sleep)
}

pub enum UsbTransport {
    WebUsb(WebUsbTransport),
    Hid(HidTransport),
}

impl UsbTransport {
    pub fn backend(&self) -> UsbBackendKind {
        match self {
            UsbTransport::WebUsb(_) => UsbBackendKind::WebUsb,
            UsbTransport::Hid(_) => UsbBackendKind::Hid,
        }
    }
}

impl Transport for UsbTransport {
    fn write(&mut self, packet: &[u8], timeout: Duration) -> Result<(), TransportError> {
        match self {
            UsbTransport::WebUsb(t) => t.write(packet, timeout),
            UsbTransport::Hid(t) => t.write(packet, timeout),
        }
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        match self {
            UsbTransport::WebUsb(t) => t.read_into(buf, timeout),
            UsbTransport::Hid(t) => t.read_into(buf, timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;
    use std::io;

    struct FakeBus {
        devices: Vec<UsbDeviceInfo>,
        failures_before_success: u32,
        connects: Cell<u32>,
    }

    impl FakeBus {
        fn with_devices(n: usize, failures_before_success: u32) -> Self {
            let devices = (0..n)
                .map(|i| {
                    UsbDeviceInfo::new(
                        format!("fake:{i}"),
                        UsbBackendKind::Hid,
                        SKYWALLET_VID,
                        SKYWALLET_PID,
                        None,
                        None,
                        Some(format!("SERIAL{i}")),
                    )
                })
                .collect();
            Self {
                devices,
                failures_before_success,
                connects: Cell::new(0),
            }
        }
    }

    impl UsbBackend for FakeBus {
        type Device = String;

        fn enumerate(&self) -> Result<Vec<UsbDeviceInfo>, TransportError> {
            Ok(self.devices.clone())
        }

        fn connect(&self, info: &UsbDeviceInfo) -> Result<String, TransportError> {
            let n = self.connects.get() + 1;
            self.connects.set(n);
            if n <= self.failures_before_success {
                return Err(io::Error::new(io::ErrorKind::Other, "claimed").into());
            }
            Ok(info.path.clone())
        }
    }

    #[test]
    fn test_no_device_found() {
        let bus = FakeBus::with_devices(0, 0);
        let err = connect_first(&bus, &RetryPolicy::default(), |_| {}).unwrap_err();
        assert!(matches!(err, TransportError::NoDeviceFound));
        assert_eq!(bus.connects.get(), 0);
    }

    #[test]
    fn test_connects_to_first_device() {
        let bus = FakeBus::with_devices(2, 0);
        let mut sleeps = 0;
        let path = connect_first(&bus, &RetryPolicy::default(), |_| sleeps += 1).unwrap();
        assert_eq!(path, "fake:0");
        assert_eq!(sleeps, 0);
    }

    #[test]
    fn test_succeeds_on_third_attempt() {
        let bus = FakeBus::with_devices(1, 2);
        let mut sleeps = Vec::new();
        let path = connect_first(&bus, &RetryPolicy::default(), |d| sleeps.push(d)).unwrap();
        assert_eq!(path, "fake:0");
        assert_eq!(bus.connects.get(), 3);
        assert_eq!(sleeps, vec![Duration::from_millis(100); 2]);
    }

    #[test]
    fn test_gives_up_after_three_attempts() {
        let bus = FakeBus::with_devices(1, 10);
        let mut sleeps = 0;
        let err = connect_first(&bus, &RetryPolicy::default(), |_| sleeps += 1).unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed { attempts: 3, .. }));
        assert_eq!(bus.connects.get(), 3);
        assert_eq!(sleeps, 2);
    }

    #[test]
    fn test_device_info_name() {
        let info = UsbDeviceInfo::new(
            "p".into(),
            UsbBackendKind::WebUsb,
            SKYWALLET_VID,
            SKYWALLET_PID,
            Some("SatoshiLabs".into()),
            Some("Skywallet".into()),
            None,
        );
        assert_eq!(info.name, "SatoshiLabs - Skywallet");
        let json = serde_json::to_value(&info).unwrap();
        assert_eq!(json["backend"], "webusb");
        assert_eq!(json["vendorId"], SKYWALLET_VID);
    }
}
