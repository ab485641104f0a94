//! Application -> Service -> Characteristic -> Descriptor
//!
//! Entities live in per-kind arenas owned by the [`Application`] and refer to
//! their parents by id. Child paths are derived from the parent path and the
//! child's construction index (`char0`, `char1`, `desc0`, ...), so they are
//! unique among siblings and never reused. The tree only grows.

use std::collections::HashMap;

use tokio::sync::mpsc;
use vivaldi_proto::{
    Flags, GATT_CHRC_IFACE, GATT_DESC_IFACE, GATT_SERVICE_IFACE, GattUuid, InterfaceMap,
    ManagedObjects, ObjectPath, PathError, PropertyMap, SERVICE_PATH_BASE, Variant,
};

use crate::PropertiesChanged;
use crate::value::ValueHandler;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CharacteristicId(pub(crate) usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DescriptorId(pub(crate) usize);

/// Any entity in the tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityId {
    Service(ServiceId),
    Characteristic(CharacteristicId),
    Descriptor(DescriptorId),
}

impl EntityId {
    /// The one interface this kind of entity exposes
    pub fn interface(&self) -> &'static str {
        match self {
            EntityId::Service(_) => GATT_SERVICE_IFACE,
            EntityId::Characteristic(_) => GATT_CHRC_IFACE,
            EntityId::Descriptor(_) => GATT_DESC_IFACE,
        }
    }
}

pub struct Service {
    pub(crate) path: ObjectPath,
    pub(crate) uuid: GattUuid,
    pub(crate) primary: bool,
    pub(crate) characteristics: Vec<CharacteristicId>,
}

pub struct Characteristic {
    pub(crate) path: ObjectPath,
    pub(crate) uuid: GattUuid,
    pub(crate) flags: Flags,
    pub(crate) service: ServiceId,
    pub(crate) descriptors: Vec<DescriptorId>,
    pub(crate) notifying: bool,
    pub(crate) handler: Box<dyn ValueHandler>,
}

pub struct Descriptor {
    pub(crate) path: ObjectPath,
    pub(crate) uuid: GattUuid,
    pub(crate) flags: Flags,
    pub(crate) characteristic: CharacteristicId,
    pub(crate) handler: Box<dyn ValueHandler>,
}

impl Service {
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn uuid(&self) -> GattUuid {
        self.uuid
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    pub fn characteristics(&self) -> &[CharacteristicId] {
        &self.characteristics
    }
}

impl Characteristic {
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn uuid(&self) -> GattUuid {
        self.uuid
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn service(&self) -> ServiceId {
        self.service
    }

    pub fn descriptors(&self) -> &[DescriptorId] {
        &self.descriptors
    }

    pub fn is_notifying(&self) -> bool {
        self.notifying
    }
}

impl Descriptor {
    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn uuid(&self) -> GattUuid {
        self.uuid
    }

    pub fn flags(&self) -> &Flags {
        &self.flags
    }

    pub fn characteristic(&self) -> CharacteristicId {
        self.characteristic
    }
}

/// Root of the GATT object tree, exported at `/`
pub struct Application {
    path: ObjectPath,
    service_base: String,
    pub(crate) services: Vec<Service>,
    pub(crate) characteristics: Vec<Characteristic>,
    pub(crate) descriptors: Vec<Descriptor>,
    by_path: HashMap<ObjectPath, EntityId>,
    pub(crate) signals: Option<mpsc::UnboundedSender<PropertiesChanged>>,
}

impl Default for Application {
    fn default() -> Self {
        Self::new()
    }
}

impl Application {
    pub fn new() -> Self {
        Self {
            path: ObjectPath::root(),
            service_base: SERVICE_PATH_BASE.to_string(),
            services: Vec::new(),
            characteristics: Vec::new(),
            descriptors: Vec::new(),
            by_path: HashMap::new(),
            signals: None,
        }
    }

    /// Use a different prefix for service paths (the index is appended)
    pub fn with_service_base(mut self, base: &str) -> Result<Self, PathError> {
        // the base must itself be a valid path once an index is appended
        ObjectPath::new(format!("{base}0"))?;
        self.service_base = base.to_string();
        Ok(self)
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    /// Receive `PropertiesChanged` signals from notifying characteristics
    ///
    /// Only the most recent subscriber receives signals.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<PropertiesChanged> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.signals = Some(tx);
        rx
    }

    /// Append a service at `<service base><index>`
    ///
    /// Duplicate indices are not detected; the caller picks unique ones.
    pub fn add_service(
        &mut self,
        index: u32,
        uuid: GattUuid,
        primary: bool,
    ) -> Result<ServiceId, PathError> {
        let path = ObjectPath::new(format!("{}{index}", self.service_base))?;
        let id = ServiceId(self.services.len());
        self.by_path.insert(path.clone(), EntityId::Service(id));
        self.services.push(Service {
            path,
            uuid,
            primary,
            characteristics: Vec::new(),
        });
        Ok(id)
    }

    /// Append a characteristic at `<service path>/char<N>`
    pub fn add_characteristic(
        &mut self,
        service: ServiceId,
        uuid: GattUuid,
        flags: impl Into<Flags>,
        handler: impl ValueHandler + 'static,
    ) -> Result<CharacteristicId, PathError> {
        let parent = &self.services[service.0];
        let path = parent.path.child(&format!("char{}", parent.characteristics.len()))?;
        let id = CharacteristicId(self.characteristics.len());
        self.by_path.insert(path.clone(), EntityId::Characteristic(id));
        self.characteristics.push(Characteristic {
            path,
            uuid,
            flags: flags.into(),
            service,
            descriptors: Vec::new(),
            notifying: false,
            handler: Box::new(handler),
        });
        self.services[service.0].characteristics.push(id);
        Ok(id)
    }

    /// Append a descriptor at `<characteristic path>/desc<N>`
    pub fn add_descriptor(
        &mut self,
        characteristic: CharacteristicId,
        uuid: GattUuid,
        flags: impl Into<Flags>,
        handler: impl ValueHandler + 'static,
    ) -> Result<DescriptorId, PathError> {
        let parent = &self.characteristics[characteristic.0];
        let path = parent.path.child(&format!("desc{}", parent.descriptors.len()))?;
        let id = DescriptorId(self.descriptors.len());
        self.by_path.insert(path.clone(), EntityId::Descriptor(id));
        self.descriptors.push(Descriptor {
            path,
            uuid,
            flags: flags.into(),
            characteristic,
            handler: Box::new(handler),
        });
        self.characteristics[characteristic.0].descriptors.push(id);
        Ok(id)
    }

    pub fn services(&self) -> impl Iterator<Item = (ServiceId, &Service)> {
        self.services.iter().enumerate().map(|(i, s)| (ServiceId(i), s))
    }

    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    pub fn characteristic(&self, id: CharacteristicId) -> &Characteristic {
        &self.characteristics[id.0]
    }

    pub fn descriptor(&self, id: DescriptorId) -> &Descriptor {
        &self.descriptors[id.0]
    }

    pub fn lookup(&self, path: &ObjectPath) -> Option<EntityId> {
        self.by_path.get(path).copied()
    }

    /// Number of live entities (services, characteristics and descriptors)
    pub fn len(&self) -> usize {
        self.services.len() + self.characteristics.len() + self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Properties of one entity under its own interface
    pub fn properties(&self, id: EntityId) -> PropertyMap {
        let mut props = PropertyMap::new();
        match id {
            EntityId::Service(id) => {
                let s = &self.services[id.0];
                props.insert("UUID".into(), Variant::Str(s.uuid.to_string()));
                props.insert("Primary".into(), Variant::Bool(s.primary));
                props.insert(
                    "Characteristics".into(),
                    Variant::PathList(
                        s.characteristics
                            .iter()
                            .map(|c| self.characteristics[c.0].path.clone())
                            .collect(),
                    ),
                );
            }
            EntityId::Characteristic(id) => {
                let c = &self.characteristics[id.0];
                let service = self.services[c.service.0].path.clone();
                props.insert("Service".into(), Variant::Path(service));
                props.insert("UUID".into(), Variant::Str(c.uuid.to_string()));
                props.insert("Flags".into(), Variant::StrList(c.flags.to_strings()));
                props.insert(
                    "Descriptors".into(),
                    Variant::PathList(
                        c.descriptors
                            .iter()
                            .map(|d| self.descriptors[d.0].path.clone())
                            .collect(),
                    ),
                );
                if c.handler.capabilities().notify {
                    props.insert("Notifying".into(), Variant::Bool(c.notifying));
                }
            }
            EntityId::Descriptor(id) => {
                let d = &self.descriptors[id.0];
                props.insert(
                    "Characteristic".into(),
                    Variant::Path(self.characteristics[d.characteristic.0].path.clone()),
                );
                props.insert("UUID".into(), Variant::Str(d.uuid.to_string()));
                props.insert("Flags".into(), Variant::StrList(d.flags.to_strings()));
            }
        }
        props
    }

    fn entry(&self, id: EntityId) -> InterfaceMap {
        let mut interfaces = InterfaceMap::new();
        interfaces.insert(id.interface().to_string(), self.properties(id));
        interfaces
    }

    /// The aggregated snapshot answered to `GetManagedObjects`
    ///
    /// Each service is followed by its characteristics, each characteristic
    /// by its descriptors, all in insertion order.
    pub fn managed_objects(&self) -> ManagedObjects {
        let mut objects = ManagedObjects::new();
        for (i, service) in self.services.iter().enumerate() {
            objects.insert(service.path.clone(), self.entry(EntityId::Service(ServiceId(i))));
            for c in &service.characteristics {
                let chrc = &self.characteristics[c.0];
                objects.insert(chrc.path.clone(), self.entry(EntityId::Characteristic(*c)));
                for d in &chrc.descriptors {
                    let desc = &self.descriptors[d.0];
                    objects.insert(desc.path.clone(), self.entry(EntityId::Descriptor(*d)));
                }
            }
        }
        tracing::debug!("managed objects: {} entries", objects.len());
        objects
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::{StaticValue, StoredValue, Unimplemented, UserDescription};
    use vivaldi_proto::Flag;

    fn uuid(s: &str) -> GattUuid {
        s.parse().unwrap()
    }

    fn sample() -> (Application, ServiceId, CharacteristicId, CharacteristicId) {
        let mut app = Application::new();
        let svc = app
            .add_service(2, uuid("12634d89-d598-4874-8e86-7d042ee07ba7"), true)
            .unwrap();
        let plain = app
            .add_characteristic(
                svc,
                uuid("12345678-1234-5678-1234-56789abcdef1"),
                [Flag::Read, Flag::Write, Flag::WritableAuxiliaries],
                StoredValue::new("plain", vec![]),
            )
            .unwrap();
        let static_uuid = uuid("12345678-1234-5678-1234-56789abcdef2");
        app.add_descriptor(plain, static_uuid, [Flag::Read], StaticValue::new(*b"s1"))
            .unwrap();
        let cud = UserDescription::new("plain");
        app.add_descriptor(plain, uuid("2901"), [Flag::Read, Flag::Write], cud).unwrap();
        let bare_uuid = uuid("12345678-1234-5678-1234-56789abcdef3");
        let bare = app
            .add_characteristic(svc, bare_uuid, [Flag::EncryptRead], Unimplemented)
            .unwrap();
        (app, svc, plain, bare)
    }

    #[test]
    fn child_paths_follow_construction_order() {
        let (app, svc, plain, bare) = sample();
        assert_eq!(app.service(svc).path(), "/org/bluez/example/service2");
        assert_eq!(app.characteristic(plain).path(), "/org/bluez/example/service2/char0");
        assert_eq!(app.characteristic(bare).path(), "/org/bluez/example/service2/char1");
        let descs: Vec<_> = app
            .characteristic(plain)
            .descriptors()
            .iter()
            .map(|d| app.descriptor(*d).path().to_string())
            .collect();
        assert_eq!(
            descs,
            vec![
                "/org/bluez/example/service2/char0/desc0",
                "/org/bluez/example/service2/char0/desc1",
            ]
        );
        assert_eq!(app.characteristic(plain).service(), svc);
    }

    #[test]
    fn snapshot_has_one_entry_per_entity() {
        let (app, ..) = sample();
        let objects = app.managed_objects();
        assert_eq!(objects.len(), app.len());
        assert_eq!(objects.len(), 5);

        let order: Vec<_> = objects.paths().map(|p| p.to_string()).collect();
        assert_eq!(
            order,
            vec![
                "/org/bluez/example/service2",
                "/org/bluez/example/service2/char0",
                "/org/bluez/example/service2/char0/desc0",
                "/org/bluez/example/service2/char0/desc1",
                "/org/bluez/example/service2/char1",
            ]
        );

        for (path, interfaces) in objects.iter() {
            let id = app.lookup(path).unwrap();
            assert_eq!(interfaces.len(), 1);
            assert_eq!(interfaces.get(id.interface()), Some(&app.properties(id)));
        }
    }

    #[test]
    fn characteristic_properties() {
        let (app, svc, plain, _) = sample();
        let props = app.properties(EntityId::Characteristic(plain));
        assert_eq!(props["Service"], Variant::Path(app.service(svc).path().clone()));
        assert_eq!(
            props["Flags"],
            Variant::StrList(vec!["read".into(), "write".into(), "writable-auxiliaries".into()])
        );
        assert_eq!(props["UUID"], Variant::from("12345678-1234-5678-1234-56789abcdef1"));
        assert!(!props.contains_key("Notifying"));

        let svc_props = app.properties(EntityId::Service(svc));
        assert_eq!(svc_props["Primary"], Variant::Bool(true));
        assert_eq!(svc_props.len(), 3);
    }

    #[test]
    fn custom_service_base() {
        let mut app = Application::new().with_service_base("/com/vivaldi/svc").unwrap();
        let svc = app.add_service(0, GattUuid::Short(0x180f), true).unwrap();
        assert_eq!(app.service(svc).path(), "/com/vivaldi/svc0");
        assert!(Application::new().with_service_base("relative").is_err());
    }
}
