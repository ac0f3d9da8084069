//! Headless Skycoin hardware wallet client: wire codec, USB and emulator
//! transports, and the interactive request/reply session.

pub mod codec;
pub mod config;
pub mod decode;
pub mod device;
pub mod driver;
pub mod error;
pub mod features;
pub mod messages;
pub mod operations;
pub mod requests;
pub mod session;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::TransportConfig;
pub use device::{run_operation, Device};
pub use driver::Driver;
pub use error::{DecodeError, Error, ProtocolError, Result, TransportError};
pub use messages::Message;
pub use operations::{Operation, TxInput, TxOutput};
pub use session::{
    DomainValue, Input, InputProvider, InputRequest, Outcome, Session, SessionState, Step,
};
pub use transport::{open_transport, DeviceHandle, DeviceType, RetryPolicy, Transport};
