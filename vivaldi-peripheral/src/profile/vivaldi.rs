//! Vivaldi S1 product characteristics
//!
//! Power and volume are read from the device-control backend on every read.
//! A backend that cannot be reached reads as the "unknown" value rather than
//! a protocol error, and a write the backend refuses still updates the
//! cached value.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use vivaldi_gatt::{Capabilities, ValueHandler, ValueOptions};
use vivaldi_proto::GattError;
use vivaldi_proto::ble::{power, volume};

use crate::backend::{DeviceBackend, Request};

pub struct PowerCharacteristic {
    backend: Arc<dyn DeviceBackend>,
    cached: String,
}

impl PowerCharacteristic {
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self { backend, cached: power::UNKNOWN.to_string() }
    }
}

#[async_trait]
impl ValueHandler for PowerCharacteristic {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_WRITE_NOTIFY
    }

    async fn read_value(&mut self, _options: &ValueOptions) -> Result<Vec<u8>, GattError> {
        let value = match self.backend.device_state().await {
            Ok(state) => match state.power {
                Some(p) if power::LEGAL.contains(&p.as_str()) => {
                    self.cached = p.clone();
                    p
                }
                other => {
                    tracing::warn!("backend reported unusable power state {other:?}");
                    power::UNKNOWN.to_string()
                }
            },
            Err(e) => {
                tracing::warn!("power read failed: {e}");
                power::UNKNOWN.to_string()
            }
        };
        tracing::info!("power read: {value}");
        Ok(value.into_bytes())
    }

    async fn write_value(
        &mut self,
        value: Vec<u8>,
        _options: &ValueOptions,
    ) -> Result<(), GattError> {
        let requested = String::from_utf8_lossy(&value).into_owned();
        if !power::LEGAL.contains(&requested.as_str()) {
            tracing::warn!("refusing power write {requested:?}");
            return Err(GattError::NotPermitted);
        }

        tracing::info!("power write: {requested}");
        if let Err(e) = self
            .backend
            .send_command(Request::with_args("power", json!({ "state": requested })))
            .await
        {
            tracing::warn!("backend did not apply power {requested}: {e}");
        }
        self.cached = requested;
        Ok(())
    }

    fn cached_value(&self) -> Option<Vec<u8>> {
        Some(self.cached.as_bytes().to_vec())
    }
}

pub struct VolumeCharacteristic {
    backend: Arc<dyn DeviceBackend>,
    cached: u8,
}

impl VolumeCharacteristic {
    pub fn new(backend: Arc<dyn DeviceBackend>) -> Self {
        Self { backend, cached: volume::UNKNOWN }
    }
}

#[async_trait]
impl ValueHandler for VolumeCharacteristic {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_WRITE
    }

    async fn read_value(&mut self, _options: &ValueOptions) -> Result<Vec<u8>, GattError> {
        let level = match self.backend.device_state().await {
            Ok(state) => match state.volume {
                Some(v) if v <= volume::MAX => {
                    self.cached = v;
                    v
                }
                other => {
                    tracing::warn!("backend reported unusable volume {other:?}");
                    volume::UNKNOWN
                }
            },
            Err(e) => {
                tracing::warn!("volume read failed: {e}");
                volume::UNKNOWN
            }
        };
        tracing::info!("volume read: {level}");
        Ok(vec![level])
    }

    async fn write_value(
        &mut self,
        value: Vec<u8>,
        _options: &ValueOptions,
    ) -> Result<(), GattError> {
        let &[level] = value.as_slice() else {
            return Err(GattError::InvalidValueLength);
        };
        if level > volume::MAX {
            tracing::warn!("refusing volume write {level}");
            return Err(GattError::NotPermitted);
        }

        tracing::info!("volume write: {level}");
        if let Err(e) = self
            .backend
            .send_command(Request::with_args("volume", json!({ "level": level })))
            .await
        {
            tracing::warn!("backend did not apply volume {level}: {e}");
        }
        self.cached = level;
        Ok(())
    }

    fn cached_value(&self) -> Option<Vec<u8>> {
        Some(vec![self.cached])
    }
}
