//! Read/write/notify contract for characteristics and descriptors
//!
//! A [`ValueHandler`] declares which value operations it supports through
//! [`Capabilities`]. The dispatcher consults that table before calling into
//! the handler, so an operation missing from the table answers
//! `NotSupported` without the handler ever seeing it.

use async_trait::async_trait;
use vivaldi_proto::{GattError, ObjectPath, PropertyMap};

/// Which value operations a handler implements
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub read: bool,
    pub write: bool,
    pub notify: bool,
}

impl Capabilities {
    pub const NONE: Self = Self { read: false, write: false, notify: false };
    pub const READ: Self = Self { read: true, write: false, notify: false };
    pub const READ_WRITE: Self = Self { read: true, write: true, notify: false };
    pub const READ_WRITE_NOTIFY: Self = Self { read: true, write: true, notify: true };
}

/// Options passed by the host stack with `ReadValue` / `WriteValue`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueOptions {
    pub offset: u16,
    pub mtu: Option<u16>,
    pub device: Option<ObjectPath>,
    pub link: Option<String>,
    /// `command`, `request` or `reliable` for writes
    pub write_type: Option<String>,
    pub prepare_authorize: bool,
}

impl ValueOptions {
    /// Decode an `a{sv}` options map; unknown keys and mistyped values are ignored
    pub fn from_dict(dict: &PropertyMap) -> Self {
        let mut options = Self::default();
        if let Some(v) = dict.get("offset").and_then(|v| v.as_u32()) {
            options.offset = v.min(u16::MAX as u32) as u16;
        }
        options.mtu = dict
            .get("mtu")
            .and_then(|v| v.as_u32())
            .map(|v| v.min(u16::MAX as u32) as u16);
        options.device = dict.get("device").and_then(|v| v.as_path()).cloned();
        options.link = dict.get("link").and_then(|v| v.as_str()).map(str::to_string);
        options.write_type = dict.get("type").and_then(|v| v.as_str()).map(str::to_string);
        options.prepare_authorize = dict
            .get("prepare-authorize")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        options
    }
}

/// Value logic behind a characteristic or descriptor
///
/// Only the operations listed in [`ValueHandler::capabilities`] are ever
/// called; the provided bodies exist so handlers need not spell out the ones
/// they leave out.
#[async_trait]
pub trait ValueHandler: Send + Sync {
    fn capabilities(&self) -> Capabilities;

    /// Full current value; the dispatcher applies the read offset
    async fn read_value(&mut self, _options: &ValueOptions) -> Result<Vec<u8>, GattError> {
        Err(GattError::NotSupported)
    }

    async fn write_value(
        &mut self,
        _value: Vec<u8>,
        _options: &ValueOptions,
    ) -> Result<(), GattError> {
        Err(GattError::NotSupported)
    }

    /// Last known value, used as the payload of change notifications
    fn cached_value(&self) -> Option<Vec<u8>> {
        None
    }
}

/// Handler with no value operations at all
pub struct Unimplemented;

#[async_trait]
impl ValueHandler for Unimplemented {
    fn capabilities(&self) -> Capabilities {
        Capabilities::NONE
    }
}

/// Bytes stored in memory, written and read back verbatim
pub struct StoredValue {
    value: Vec<u8>,
    notify: bool,
    max_len: Option<usize>,
    label: String,
}

impl StoredValue {
    pub fn new(label: &str, initial: Vec<u8>) -> Self {
        Self {
            value: initial,
            notify: false,
            max_len: None,
            label: label.to_string(),
        }
    }

    pub fn with_notify(mut self) -> Self {
        self.notify = true;
        self
    }

    /// Reject writes that would grow the value beyond `max_len` bytes
    pub fn with_max_len(mut self, max_len: usize) -> Self {
        self.max_len = Some(max_len);
        self
    }
}

#[async_trait]
impl ValueHandler for StoredValue {
    fn capabilities(&self) -> Capabilities {
        Capabilities { read: true, write: true, notify: self.notify }
    }

    async fn read_value(&mut self, _options: &ValueOptions) -> Result<Vec<u8>, GattError> {
        tracing::info!("{} read: {:?}", self.label, self.value);
        Ok(self.value.clone())
    }

    async fn write_value(
        &mut self,
        value: Vec<u8>,
        options: &ValueOptions,
    ) -> Result<(), GattError> {
        tracing::info!("{} write: {:?}", self.label, value);
        let offset = options.offset as usize;
        if offset > self.value.len() {
            return Err(GattError::InvalidOffset);
        }
        let mut next = self.value[..offset].to_vec();
        next.extend_from_slice(&value);
        if self.max_len.is_some_and(|max| next.len() > max) {
            return Err(GattError::InvalidValueLength);
        }
        self.value = next;
        Ok(())
    }

    fn cached_value(&self) -> Option<Vec<u8>> {
        Some(self.value.clone())
    }
}

/// Read-only constant value
pub struct StaticValue(Vec<u8>);

impl StaticValue {
    pub fn new(value: impl Into<Vec<u8>>) -> Self {
        Self(value.into())
    }
}

#[async_trait]
impl ValueHandler for StaticValue {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ
    }

    async fn read_value(&mut self, _options: &ValueOptions) -> Result<Vec<u8>, GattError> {
        Ok(self.0.clone())
    }
}

/// Characteristic User Description (`2901`)
///
/// Readable always. Writes reach it only when the owning characteristic
/// carries `writable-auxiliaries`; the dispatcher refuses them otherwise.
pub struct UserDescription(Vec<u8>);

impl UserDescription {
    pub fn new(text: &str) -> Self {
        Self(text.as_bytes().to_vec())
    }
}

#[async_trait]
impl ValueHandler for UserDescription {
    fn capabilities(&self) -> Capabilities {
        Capabilities::READ_WRITE
    }

    async fn read_value(&mut self, _options: &ValueOptions) -> Result<Vec<u8>, GattError> {
        Ok(self.0.clone())
    }

    async fn write_value(
        &mut self,
        value: Vec<u8>,
        _options: &ValueOptions,
    ) -> Result<(), GattError> {
        self.0 = value;
        Ok(())
    }

    fn cached_value(&self) -> Option<Vec<u8>> {
        Some(self.0.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vivaldi_proto::Variant;

    #[test]
    fn options_from_dict() {
        let mut dict = PropertyMap::new();
        dict.insert("offset".to_string(), Variant::U16(4));
        dict.insert("mtu".to_string(), Variant::U16(185));
        dict.insert("type".to_string(), Variant::from("request"));
        dict.insert(
            "device".to_string(),
            Variant::Path(ObjectPath::new("/org/bluez/hci0/dev_00_11").unwrap()),
        );
        dict.insert("unrelated".to_string(), Variant::Bool(true));
        dict.insert("link".to_string(), Variant::U32(3));

        let options = ValueOptions::from_dict(&dict);
        assert_eq!(options.offset, 4);
        assert_eq!(options.mtu, Some(185));
        assert_eq!(options.write_type.as_deref(), Some("request"));
        assert_eq!(options.device.unwrap(), "/org/bluez/hci0/dev_00_11");
        assert_eq!(options.link, None);
        assert!(!options.prepare_authorize);
    }

    #[tokio::test]
    async fn stored_value_offset_writes() {
        let mut v = StoredValue::new("test", b"hello".to_vec()).with_max_len(8);
        let at = |offset| ValueOptions { offset, ..Default::default() };

        v.write_value(b"p!".to_vec(), &at(3)).await.unwrap();
        assert_eq!(v.read_value(&at(0)).await.unwrap(), b"help!");

        assert_eq!(v.write_value(b"x".to_vec(), &at(6)).await, Err(GattError::InvalidOffset));
        assert_eq!(
            v.write_value(b"too long".to_vec(), &at(3)).await,
            Err(GattError::InvalidValueLength)
        );
        assert_eq!(v.cached_value().unwrap(), b"help!");
    }

    #[tokio::test]
    async fn unimplemented_defaults_to_not_supported() {
        let mut h = Unimplemented;
        let options = ValueOptions::default();
        assert_eq!(h.capabilities(), Capabilities::NONE);
        assert_eq!(h.read_value(&options).await, Err(GattError::NotSupported));
        assert_eq!(h.write_value(vec![1], &options).await, Err(GattError::NotSupported));
    }
}
