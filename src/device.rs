//! High-level entry points: open a device and run an operation on it.

use tracing::{info, instrument};

use crate::config::TransportConfig;
use crate::driver::Driver;
use crate::error::Result;
use crate::features::{get_device_features, DeviceFeatures};
use crate::operations::Operation;
use crate::session::{InputProvider, Outcome, Session, Step};
use crate::transport::{DeviceHandle, DeviceType, Transport};

/// Run `op` to completion on `handle`, answering prompts through `provider`.
#[instrument(level = "info", skip_all, fields(op = %op))]
pub fn run_operation<T, P>(handle: T, op: &Operation, provider: &mut P) -> Result<Outcome>
where
    T: Transport,
    P: InputProvider + ?Sized,
{
    let request = op.request()?;
    let mut session = Session::new(handle);
    let outcome = session.run(&request, provider)?;
    info!("{} finished after {} exchange(s)", op, session.sends());
    Ok(outcome)
}

/// A configured wallet, opened afresh for every operation.
#[derive(Debug, Clone, Default)]
pub struct Device {
    driver: Driver,
}

impl Device {
    pub fn new(config: TransportConfig) -> Self {
        Self {
            driver: Driver::with_config(config),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self::new(TransportConfig::from_env()?))
    }

    pub fn device_type(&self) -> DeviceType {
        self.driver.device_type()
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    /// Whether a connection can currently be opened.
    pub fn connected(&self) -> bool {
        self.driver.get_device().is_ok()
    }

    /// Open a session without sending anything yet.
    pub fn session(&self) -> Result<Session<DeviceHandle>> {
        Ok(Session::new(self.driver.get_device()?))
    }

    /// Send the opening request of `op` and return the session at its first stop.
    #[instrument(level = "info", skip_all, fields(op = %op))]
    pub fn begin(&self, op: &Operation) -> Result<(Session<DeviceHandle>, Step)> {
        let request = op.request()?;
        let mut session = self.session()?;
        let step = session.start(&request)?;
        Ok((session, step))
    }

    /// Open a handle and run `op` on it. Invalid parameters fail before anything is opened.
    #[instrument(level = "info", skip_all, fields(op = %op))]
    pub fn run<P>(&self, op: &Operation, provider: &mut P) -> Result<Outcome>
    where
        P: InputProvider + ?Sized,
    {
        let request = op.request()?;
        let mut session = self.session()?;
        session.run(&request, provider)
    }

    pub fn features(&self) -> Result<DeviceFeatures> {
        let mut handle = self.driver.get_device()?;
        get_device_features(&mut handle)
    }
}
