//! Vivaldi S1 BLE peripheral
//!
//! Ties the GATT core to the outside world: the device-control backend
//! behind the product characteristics, the host-stack boundary, the profiles
//! and the dispatch loop that serves them.

pub mod backend;
pub mod config;
pub mod host;
mod peripheral;
pub mod profile;

pub use backend::{BackendError, DeviceBackend, DeviceState, HttpBackend, Timeout};
pub use config::{ConfigError, PeripheralConfig, ProfileKind, vivaldi_home};
pub use host::{HostError, HostEvent, HostStack};
pub use peripheral::{Peripheral, PeripheralError};
