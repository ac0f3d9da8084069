use serde::{Deserialize, Serialize};
use tracing::info;

use crate::decode::decode_features;
use crate::driver;
use crate::error::Result;
use crate::messages::Features;
use crate::requests;
use crate::transport::Transport;

/// Device features in a form meant for display.
/// The raw [`Features`] record stays available through [`decode_features`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceFeatures {
    /// Device label or name
    pub label: Option<String>,
    pub vendor: Option<String>,
    pub model: Option<String>,
    /// Unique device identifier
    pub device_id: Option<String>,
    pub language: Option<String>,
    /// Whether the device is in bootloader mode
    pub bootloader_mode: bool,
    /// Protocol version, `major.minor.patch`
    pub version: String,
    /// Firmware version, when the device reports it separately
    pub firmware_version: Option<String>,
    pub firmware_vendor: Option<String>,
    /// Bootloader hash (hex encoded)
    pub bootloader_hash: Option<String>,
    pub firmware_present: Option<bool>,
    /// Whether a seed has been set up
    pub initialized: bool,
    pub needs_backup: bool,
    pub unfinished_backup: bool,
    pub pin_protection: bool,
    /// Whether the device is currently unlocked
    pub pin_cached: bool,
    pub passphrase_protection: bool,
    pub passphrase_cached: bool,
}

impl From<&Features> for DeviceFeatures {
    fn from(features: &Features) -> Self {
        let firmware_version = match (features.fw_major, features.fw_minor, features.fw_patch) {
            (None, None, None) => None,
            (major, minor, patch) => Some(format!(
                "{}.{}.{}",
                major.unwrap_or(0),
                minor.unwrap_or(0),
                patch.unwrap_or(0)
            )),
        };
        Self {
            label: features.label.clone(),
            vendor: features.vendor.clone(),
            model: features.model.clone(),
            device_id: features.device_id.clone(),
            language: features.language.clone(),
            bootloader_mode: features.bootloader_mode.unwrap_or(false),
            version: format!(
                "{}.{}.{}",
                features.major_version.unwrap_or(0),
                features.minor_version.unwrap_or(0),
                features.patch_version.unwrap_or(0)
            ),
            firmware_version,
            firmware_vendor: features.fw_vendor.clone(),
            bootloader_hash: features.bootloader_hash.as_ref().map(hex::encode),
            firmware_present: features.firmware_present,
            initialized: features.initialized.unwrap_or(false),
            needs_backup: features.needs_backup.unwrap_or(false),
            unfinished_backup: features.unfinished_backup.unwrap_or(false),
            pin_protection: features.pin_protection.unwrap_or(false),
            pin_cached: features.pin_cached.unwrap_or(false),
            passphrase_protection: features.passphrase_protection.unwrap_or(false),
            passphrase_cached: features.passphrase_cached.unwrap_or(false),
        }
    }
}

impl DeviceFeatures {
    /// Label/value pairs in display order.
    pub fn rows(&self) -> Vec<(&'static str, String)> {
        fn opt(value: &Option<String>) -> String {
            value.clone().unwrap_or_else(|| "-".to_string())
        }
        vec![
            ("Label", opt(&self.label)),
            ("Vendor", opt(&self.vendor)),
            ("Model", opt(&self.model)),
            ("Device ID", opt(&self.device_id)),
            ("Version", self.version.clone()),
            ("Firmware", opt(&self.firmware_version)),
            ("Bootloader mode", self.bootloader_mode.to_string()),
            ("Bootloader hash", opt(&self.bootloader_hash)),
            ("Initialized", self.initialized.to_string()),
            ("Needs backup", self.needs_backup.to_string()),
            ("PIN protection", self.pin_protection.to_string()),
            ("PIN cached", self.pin_cached.to_string()),
            ("Passphrase protection", self.passphrase_protection.to_string()),
            ("Language", opt(&self.language)),
        ]
    }
}

/// Ask an open device for its features. `GetFeatures` never prompts, so a
/// single exchange is enough.
pub fn get_device_features<T: Transport + ?Sized>(handle: &mut T) -> Result<DeviceFeatures> {
    let reply = driver::send(handle, &requests::get_features())?;
    let features = decode_features(&reply)?;
    let summary = DeviceFeatures::from(&features);
    info!("Device reports protocol v{} (initialized: {})", summary.version, summary.initialized);
    Ok(summary)
}
