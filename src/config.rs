use std::net::SocketAddr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::{DeviceType, RetryPolicy, EMULATOR_ADDR};

pub const DEVICE_TYPE_ENV: &str = "DEVICE_TYPE";
pub const EMULATOR_ADDR_ENV: &str = "SKYWALLET_EMULATOR_ADDR";

/// How to reach the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    pub device_type: DeviceType,
    pub emulator_addr: SocketAddr,
    pub retry: RetryPolicy,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            device_type: DeviceType::Usb,
            emulator_addr: EMULATOR_ADDR,
            retry: RetryPolicy::default(),
        }
    }
}

impl TransportConfig {
    pub fn emulator(addr: SocketAddr) -> Self {
        Self {
            device_type: DeviceType::Emulator,
            emulator_addr: addr,
            ..Self::default()
        }
    }

    /// Defaults overridden by `DEVICE_TYPE` and `SKYWALLET_EMULATOR_ADDR`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(value) = lookup(DEVICE_TYPE_ENV).filter(|v| !v.trim().is_empty()) {
            config.device_type = value
                .parse()
                .map_err(|e| Error::InvalidParams(format!("{}: {}", DEVICE_TYPE_ENV, e)))?;
        }
        if let Some(value) = lookup(EMULATOR_ADDR_ENV).filter(|v| !v.trim().is_empty()) {
            config.emulator_addr = value.trim().parse().map_err(|e| {
                Error::InvalidParams(format!(
                    "{}: invalid address {:?}: {}",
                    EMULATOR_ADDR_ENV, value, e
                ))
            })?;
        }
        Ok(config)
    }
}
