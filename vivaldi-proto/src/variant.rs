//! Property values
//!
//! The host stack consumes `a{sv}` maps whose values have fixed container
//! shapes per property (e.g. `ManufacturerData` is `a{qv}` of byte arrays).
//! [`Variant`] names each shape the object tree emits so an IPC adapter can
//! marshal them without guessing.

use std::collections::BTreeMap;

use serde::ser::SerializeMap;

use crate::ObjectPath;

/// Property name -> value, the `a{sv}` of one interface
pub type PropertyMap = BTreeMap<String, Variant>;

/// Interface name -> properties, the `a{sa{sv}}` of one object
pub type InterfaceMap = BTreeMap<String, PropertyMap>;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(untagged)]
pub enum Variant {
    Bool(bool),
    Byte(u8),
    U16(u16),
    U32(u32),
    Str(String),
    Path(ObjectPath),
    Bytes(Vec<u8>),
    StrList(Vec<String>),
    PathList(Vec<ObjectPath>),
    /// `a{qv}`, each value a byte array
    U16Bytes(BTreeMap<u16, Vec<u8>>),
    /// `a{sv}`, each value a byte array
    StrBytes(BTreeMap<String, Vec<u8>>),
    /// `a{yv}`, each value a byte array
    ByteBytes(BTreeMap<u8, Vec<u8>>),
    /// Nested `a{sv}`, used for method options
    Dict(PropertyMap),
}

impl Variant {
    /// D-Bus type signature of the value inside the variant
    pub fn signature(&self) -> &'static str {
        match self {
            Variant::Bool(_) => "b",
            Variant::Byte(_) => "y",
            Variant::U16(_) => "q",
            Variant::U32(_) => "u",
            Variant::Str(_) => "s",
            Variant::Path(_) => "o",
            Variant::Bytes(_) => "ay",
            Variant::StrList(_) => "as",
            Variant::PathList(_) => "ao",
            Variant::U16Bytes(_) => "a{qv}",
            Variant::StrBytes(_) => "a{sv}",
            Variant::ByteBytes(_) => "a{yv}",
            Variant::Dict(_) => "a{sv}",
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Variant::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Variant::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_path(&self) -> Option<&ObjectPath> {
        match self {
            Variant::Path(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Variant::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Numeric view of any unsigned integer variant
    pub fn as_u32(&self) -> Option<u32> {
        match self {
            Variant::Byte(v) => Some(*v as u32),
            Variant::U16(v) => Some(*v as u32),
            Variant::U32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_dict(&self) -> Option<&PropertyMap> {
        match self {
            Variant::Dict(d) => Some(d),
            _ => None,
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Variant::Bool(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Variant::Str(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Variant::Str(v)
    }
}

impl From<ObjectPath> for Variant {
    fn from(v: ObjectPath) -> Self {
        Variant::Path(v)
    }
}

impl From<Vec<u8>> for Variant {
    fn from(v: Vec<u8>) -> Self {
        Variant::Bytes(v)
    }
}

/// Result of `GetManagedObjects`: every exported object with its interfaces
///
/// Kept in insertion order so enumeration is reproducible; the host stack
/// itself does not care about order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManagedObjects {
    entries: Vec<(ObjectPath, InterfaceMap)>,
}

impl ManagedObjects {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: ObjectPath, interfaces: InterfaceMap) {
        self.entries.push((path, interfaces));
    }

    pub fn get(&self, path: &ObjectPath) -> Option<&InterfaceMap> {
        self.entries.iter().find(|(p, _)| p == path).map(|(_, i)| i)
    }

    pub fn paths(&self) -> impl Iterator<Item = &ObjectPath> {
        self.entries.iter().map(|(p, _)| p)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ObjectPath, &InterfaceMap)> {
        self.entries.iter().map(|(p, i)| (p, i))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl serde::Serialize for ManagedObjects {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (path, interfaces) in &self.entries {
            map.serialize_entry(path, interfaces)?;
        }
        map.end()
    }
}
