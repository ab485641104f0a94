//! Per-object property and method dispatch
//!
//! A [`MethodCall`] is routed by object path to one entity, then checked
//! against the interfaces that entity actually implements. Value operations
//! go through the entity's capability table before reaching its handler.

use vivaldi_proto::{
    DBUS_OM_IFACE, DBUS_PROP_IFACE, Flag, GATT_CHRC_IFACE, GATT_DESC_IFACE, GattError,
    ManagedObjects, ObjectPath, PropertyMap, Variant,
};

use crate::tree::{Application, CharacteristicId, DescriptorId, EntityId};
use crate::value::ValueOptions;

/// A call addressed to one of our objects
#[derive(Debug, Clone, PartialEq)]
pub struct MethodCall {
    pub path: ObjectPath,
    pub interface: String,
    pub member: String,
    pub args: Vec<Variant>,
}

impl MethodCall {
    pub fn new(path: ObjectPath, interface: &str, member: &str, args: Vec<Variant>) -> Self {
        Self {
            path,
            interface: interface.to_string(),
            member: member.to_string(),
            args,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Empty,
    Value(Vec<u8>),
    Properties(PropertyMap),
    Objects(ManagedObjects),
    /// `RequestPinCode` answer
    Text(String),
    /// `RequestPasskey` answer
    Passkey(u32),
}

/// `org.freedesktop.DBus.Properties.PropertiesChanged`
#[derive(Debug, Clone, PartialEq)]
pub struct PropertiesChanged {
    pub path: ObjectPath,
    pub interface: String,
    pub changed: PropertyMap,
    /// Always empty; every change carries its new value
    pub invalidated: Vec<String>,
}

fn arg_str<'a>(args: &'a [Variant], i: usize) -> Result<&'a str, GattError> {
    args.get(i).and_then(|v| v.as_str()).ok_or(GattError::InvalidArgs)
}

fn arg_bytes(args: &[Variant], i: usize) -> Result<Vec<u8>, GattError> {
    args.get(i)
        .and_then(|v| v.as_bytes())
        .map(<[u8]>::to_vec)
        .ok_or(GattError::InvalidArgs)
}

fn arg_options(args: &[Variant], i: usize) -> Result<ValueOptions, GattError> {
    match args.get(i) {
        None => Ok(ValueOptions::default()),
        Some(v) => v.as_dict().map(ValueOptions::from_dict).ok_or(GattError::InvalidArgs),
    }
}

impl Application {
    /// Route one inbound call to the object it names
    pub async fn dispatch(&mut self, call: MethodCall) -> Result<Reply, GattError> {
        let MethodCall { path, interface, member, args } = call;

        if &path == self.path() {
            return match (interface.as_str(), member.as_str()) {
                (DBUS_OM_IFACE, "GetManagedObjects") => Ok(Reply::Objects(self.managed_objects())),
                _ => Err(GattError::unknown_method(&interface, &member)),
            };
        }

        let id = self
            .lookup(&path)
            .ok_or_else(|| GattError::UnknownObject(path.to_string()))?;

        match (id, interface.as_str(), member.as_str()) {
            (_, DBUS_PROP_IFACE, "GetAll") => {
                let requested = arg_str(&args, 0)?;
                self.get_all(&path, requested).map(Reply::Properties)
            }
            (EntityId::Characteristic(c), GATT_CHRC_IFACE, "ReadValue") => {
                let options = arg_options(&args, 0)?;
                self.read_characteristic(c, &options).await.map(Reply::Value)
            }
            (EntityId::Characteristic(c), GATT_CHRC_IFACE, "WriteValue") => {
                let value = arg_bytes(&args, 0)?;
                let options = arg_options(&args, 1)?;
                self.write_characteristic(c, value, &options).await.map(|_| Reply::Empty)
            }
            (EntityId::Characteristic(c), GATT_CHRC_IFACE, "StartNotify") => {
                self.start_notify(c).map(|_| Reply::Empty)
            }
            (EntityId::Characteristic(c), GATT_CHRC_IFACE, "StopNotify") => {
                self.stop_notify(c).map(|_| Reply::Empty)
            }
            (EntityId::Descriptor(d), GATT_DESC_IFACE, "ReadValue") => {
                let options = arg_options(&args, 0)?;
                self.read_descriptor(d, &options).await.map(Reply::Value)
            }
            (EntityId::Descriptor(d), GATT_DESC_IFACE, "WriteValue") => {
                let value = arg_bytes(&args, 0)?;
                let options = arg_options(&args, 1)?;
                self.write_descriptor(d, value, &options).await.map(|_| Reply::Empty)
            }
            _ => Err(GattError::unknown_method(&interface, &member)),
        }
    }

    /// `GetAll(interface)` on one entity
    pub fn get_all(&self, path: &ObjectPath, interface: &str) -> Result<PropertyMap, GattError> {
        let id = self
            .lookup(path)
            .ok_or_else(|| GattError::UnknownObject(path.to_string()))?;
        if interface != id.interface() {
            tracing::debug!("GetAll({interface}) on {path}: interface mismatch");
            return Err(GattError::InvalidArgs);
        }
        Ok(self.properties(id))
    }

    pub async fn read_characteristic(
        &mut self,
        id: CharacteristicId,
        options: &ValueOptions,
    ) -> Result<Vec<u8>, GattError> {
        let chrc = &mut self.characteristics[id.0];
        if !chrc.handler.capabilities().read {
            tracing::info!("{}: ReadValue not supported", chrc.path);
            return Err(GattError::NotSupported);
        }
        let before = chrc.handler.cached_value();
        let value = chrc.handler.read_value(options).await?;
        let changed = changed_value(before, chrc.handler.cached_value());
        if let Some(current) = changed {
            self.notify_value(id, current);
        }
        apply_offset(value, options.offset)
    }

    pub async fn write_characteristic(
        &mut self,
        id: CharacteristicId,
        value: Vec<u8>,
        options: &ValueOptions,
    ) -> Result<(), GattError> {
        let chrc = &mut self.characteristics[id.0];
        if !chrc.handler.capabilities().write {
            tracing::info!("{}: WriteValue not supported", chrc.path);
            return Err(GattError::NotSupported);
        }
        let before = chrc.handler.cached_value();
        chrc.handler.write_value(value, options).await?;
        let changed = changed_value(before, chrc.handler.cached_value());
        if let Some(current) = changed {
            self.notify_value(id, current);
        }
        Ok(())
    }

    pub fn start_notify(&mut self, id: CharacteristicId) -> Result<(), GattError> {
        let chrc = &mut self.characteristics[id.0];
        if !chrc.handler.capabilities().notify {
            tracing::info!("{}: StartNotify not supported", chrc.path);
            return Err(GattError::NotSupported);
        }
        if chrc.notifying {
            tracing::info!("{}: already notifying", chrc.path);
            return Ok(());
        }
        chrc.notifying = true;
        Ok(())
    }

    pub fn stop_notify(&mut self, id: CharacteristicId) -> Result<(), GattError> {
        let chrc = &mut self.characteristics[id.0];
        if !chrc.handler.capabilities().notify {
            tracing::info!("{}: StopNotify not supported", chrc.path);
            return Err(GattError::NotSupported);
        }
        if !chrc.notifying {
            tracing::info!("{}: not notifying", chrc.path);
            return Ok(());
        }
        chrc.notifying = false;
        Ok(())
    }

    /// Announce a new value for a characteristic
    ///
    /// Emits `PropertiesChanged` only while the characteristic is notifying
    /// and someone subscribed; returns whether a signal went out.
    pub fn notify_value(&mut self, id: CharacteristicId, value: Vec<u8>) -> bool {
        let chrc = &self.characteristics[id.0];
        if !chrc.notifying {
            return false;
        }
        let Some(signals) = &self.signals else {
            return false;
        };
        let mut changed = PropertyMap::new();
        changed.insert("Value".to_string(), Variant::Bytes(value));
        let signal = PropertiesChanged {
            path: chrc.path.clone(),
            interface: GATT_CHRC_IFACE.to_string(),
            changed,
            invalidated: Vec::new(),
        };
        if signals.send(signal).is_err() {
            tracing::warn!("{}: signal receiver dropped", chrc.path);
            self.signals = None;
            return false;
        }
        true
    }

    pub async fn read_descriptor(
        &mut self,
        id: DescriptorId,
        options: &ValueOptions,
    ) -> Result<Vec<u8>, GattError> {
        let desc = &mut self.descriptors[id.0];
        if !desc.handler.capabilities().read {
            tracing::info!("{}: ReadValue not supported", desc.path);
            return Err(GattError::NotSupported);
        }
        let value = desc.handler.read_value(options).await?;
        apply_offset(value, options.offset)
    }

    pub async fn write_descriptor(
        &mut self,
        id: DescriptorId,
        value: Vec<u8>,
        options: &ValueOptions,
    ) -> Result<(), GattError> {
        let writable = self.characteristics[self.descriptors[id.0].characteristic.0]
            .flags
            .contains(Flag::WritableAuxiliaries);
        let desc = &mut self.descriptors[id.0];
        if !desc.handler.capabilities().write {
            tracing::info!("{}: WriteValue not supported", desc.path);
            return Err(GattError::NotSupported);
        }
        if !writable {
            tracing::info!("{}: characteristic lacks writable-auxiliaries", desc.path);
            return Err(GattError::NotPermitted);
        }
        desc.handler.write_value(value, options).await
    }
}

/// The new cached value, if an operation changed it
fn changed_value(before: Option<Vec<u8>>, after: Option<Vec<u8>>) -> Option<Vec<u8>> {
    after.filter(|after| before.as_ref() != Some(after))
}

fn apply_offset(value: Vec<u8>, offset: u16) -> Result<Vec<u8>, GattError> {
    let offset = offset as usize;
    if offset == 0 {
        return Ok(value);
    }
    if offset > value.len() {
        return Err(GattError::InvalidOffset);
    }
    Ok(value[offset..].to_vec())
}
