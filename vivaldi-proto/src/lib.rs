//! Vivaldi object-tree vocabulary
//!
//! Everything the GATT core and the host-stack adapter have to agree on:
//! well-known bus, interface and path names, the typed property values that
//! travel inside `a{sv}` maps, object paths, UUIDs, access flags and the
//! error taxonomy returned to the host stack.

pub mod ble;
mod error;
mod flags;
mod gatt_uuid;
mod path;
mod variant;

pub use error::GattError;
pub use flags::{Flag, Flags, ParseFlagError};
pub use gatt_uuid::{GattUuid, UuidError};
pub use path::{ObjectPath, PathError};
pub use variant::{InterfaceMap, ManagedObjects, PropertyMap, Variant};

/// Well-known bus name of the host Bluetooth stack
pub const BLUEZ_SERVICE_NAME: &str = "org.bluez";

// Interfaces implemented by this process
pub const DBUS_OM_IFACE: &str = "org.freedesktop.DBus.ObjectManager";
pub const DBUS_PROP_IFACE: &str = "org.freedesktop.DBus.Properties";
pub const GATT_SERVICE_IFACE: &str = "org.bluez.GattService1";
pub const GATT_CHRC_IFACE: &str = "org.bluez.GattCharacteristic1";
pub const GATT_DESC_IFACE: &str = "org.bluez.GattDescriptor1";
pub const LE_ADVERTISEMENT_IFACE: &str = "org.bluez.LEAdvertisement1";
pub const AGENT_IFACE: &str = "org.bluez.Agent1";

// Interfaces implemented by the host stack
pub const GATT_MANAGER_IFACE: &str = "org.bluez.GattManager1";
pub const LE_ADVERTISING_MANAGER_IFACE: &str = "org.bluez.LEAdvertisingManager1";
pub const AGENT_MANAGER_IFACE: &str = "org.bluez.AgentManager1";
pub const ADAPTER_IFACE: &str = "org.bluez.Adapter1";
pub const DEVICE_IFACE: &str = "org.bluez.Device1";

/// Base path for services; the service index is appended verbatim
pub const SERVICE_PATH_BASE: &str = "/org/bluez/example/service";

/// Base path for advertisements; the advertisement index is appended verbatim
pub const ADVERTISEMENT_PATH_BASE: &str = "/org/bluez/example/advertisement";

/// Object path the pairing agent is exported on
pub const AGENT_PATH: &str = "/test/agent";

/// IO capability announced when registering the agent
pub const AGENT_CAPABILITY: &str = "NoInputNoOutput";
