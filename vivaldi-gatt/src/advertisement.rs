//! LE advertisement
//!
//! The host stack builds the over-the-air payload from the properties of an
//! `org.bluez.LEAdvertisement1` object. Unset fields must be left out of the
//! property map entirely; the stack treats an empty container as a value.

use std::collections::BTreeMap;

use vivaldi_proto::{GattError, GattUuid, ObjectPath, PathError, PropertyMap, Variant};
use vivaldi_proto::{ADVERTISEMENT_PATH_BASE, DBUS_PROP_IFACE, LE_ADVERTISEMENT_IFACE};

use crate::dispatch::{MethodCall, Reply};

/// Legacy advertising PDUs carry at most this many bytes of AD structures
pub const LEGACY_PAYLOAD_MAX: usize = 31;

// AD type codes (Bluetooth Assigned Numbers, 2.3)
const AD_FLAGS: u8 = 0x01;
const AD_UUID16_ALL: u8 = 0x03;
const AD_UUID128_ALL: u8 = 0x07;
const AD_NAME_COMPLETE: u8 = 0x09;
const AD_TX_POWER: u8 = 0x0a;
const AD_SOLICIT16: u8 = 0x14;
const AD_SOLICIT128: u8 = 0x15;
const AD_SERVICE_DATA16: u8 = 0x16;
const AD_SERVICE_DATA128: u8 = 0x21;
const AD_MANUFACTURER: u8 = 0xff;

// LE General Discoverable, BR/EDR not supported
const FLAGS_PERIPHERAL: u8 = 0x06;
// BR/EDR not supported
const FLAGS_BROADCASTER: u8 = 0x04;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdvertisementType {
    Peripheral,
    Broadcaster,
}

impl AdvertisementType {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdvertisementType::Peripheral => "peripheral",
            AdvertisementType::Broadcaster => "broadcaster",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayloadError {
    #[error("AD structure 0x{ad_type:02x} too long: {len} bytes")]
    FieldTooLong { ad_type: u8, len: usize },
    #[error("payload is {0} bytes, legacy advertising allows 31")]
    TooLong(usize),
}

/// One length-type-value entry of the advertising payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdStructure {
    pub ad_type: u8,
    pub data: Vec<u8>,
}

impl AdStructure {
    fn new(ad_type: u8, data: Vec<u8>) -> Self {
        Self { ad_type, data }
    }

    /// `[len][type][data..]`, len covering type and data
    pub fn encode(&self, buf: &mut Vec<u8>) -> Result<(), PayloadError> {
        let len = self.data.len() + 1;
        if len > u8::MAX as usize {
            return Err(PayloadError::FieldTooLong { ad_type: self.ad_type, len });
        }
        buf.push(len as u8);
        buf.push(self.ad_type);
        buf.extend_from_slice(&self.data);
        Ok(())
    }
}

#[derive(Debug, Clone)]
pub struct Advertisement {
    path: ObjectPath,
    ad_type: AdvertisementType,
    service_uuids: Option<Vec<GattUuid>>,
    solicit_uuids: Option<Vec<GattUuid>>,
    manufacturer_data: Option<BTreeMap<u16, Vec<u8>>>,
    service_data: Option<BTreeMap<GattUuid, Vec<u8>>>,
    local_name: Option<String>,
    include_tx_power: Option<bool>,
    data: Option<BTreeMap<u8, Vec<u8>>>,
}

impl Advertisement {
    /// Advertisement exported at `<advertisement base><index>`
    pub fn new(index: u32, ad_type: AdvertisementType) -> Result<Self, PathError> {
        Ok(Self {
            path: ObjectPath::new(format!("{ADVERTISEMENT_PATH_BASE}{index}"))?,
            ad_type,
            service_uuids: None,
            solicit_uuids: None,
            manufacturer_data: None,
            service_data: None,
            local_name: None,
            include_tx_power: None,
            data: None,
        })
    }

    pub fn path(&self) -> &ObjectPath {
        &self.path
    }

    pub fn ad_type(&self) -> AdvertisementType {
        self.ad_type
    }

    pub fn add_service_uuid(&mut self, uuid: GattUuid) {
        self.service_uuids.get_or_insert_with(Vec::new).push(uuid);
    }

    pub fn add_solicit_uuid(&mut self, uuid: GattUuid) {
        self.solicit_uuids.get_or_insert_with(Vec::new).push(uuid);
    }

    /// Insert (or replace) the payload for one company identifier
    pub fn add_manufacturer_data(&mut self, company: u16, data: Vec<u8>) {
        self.manufacturer_data
            .get_or_insert_with(BTreeMap::new)
            .insert(company, data);
    }

    /// Insert (or replace) the payload for one service UUID
    pub fn add_service_data(&mut self, uuid: GattUuid, data: Vec<u8>) {
        self.service_data
            .get_or_insert_with(BTreeMap::new)
            .insert(uuid, data);
    }

    pub fn add_local_name(&mut self, name: &str) {
        self.local_name = Some(name.to_string());
    }

    pub fn set_include_tx_power(&mut self, include: bool) {
        self.include_tx_power = Some(include);
    }

    /// Insert (or replace) a raw AD structure by type
    pub fn add_data(&mut self, ad_type: u8, data: Vec<u8>) {
        self.data.get_or_insert_with(BTreeMap::new).insert(ad_type, data);
    }

    /// `org.bluez.LEAdvertisement1` properties; `Type` always, the rest only if set
    pub fn properties(&self) -> PropertyMap {
        let mut props = PropertyMap::new();
        props.insert("Type".into(), Variant::from(self.ad_type.as_str()));
        if let Some(uuids) = &self.service_uuids {
            props.insert(
                "ServiceUUIDs".into(),
                Variant::StrList(uuids.iter().map(|u| u.to_string()).collect()),
            );
        }
        if let Some(uuids) = &self.solicit_uuids {
            props.insert(
                "SolicitUUIDs".into(),
                Variant::StrList(uuids.iter().map(|u| u.to_string()).collect()),
            );
        }
        if let Some(data) = &self.manufacturer_data {
            props.insert("ManufacturerData".into(), Variant::U16Bytes(data.clone()));
        }
        if let Some(data) = &self.service_data {
            props.insert(
                "ServiceData".into(),
                Variant::StrBytes(data.iter().map(|(u, d)| (u.to_string(), d.clone())).collect()),
            );
        }
        if let Some(name) = &self.local_name {
            props.insert("LocalName".into(), Variant::from(name.as_str()));
        }
        if let Some(include) = self.include_tx_power {
            props.insert("IncludeTxPower".into(), Variant::Bool(include));
        }
        if let Some(data) = &self.data {
            props.insert("Data".into(), Variant::ByteBytes(data.clone()));
        }
        props
    }

    pub fn get_all(&self, interface: &str) -> Result<PropertyMap, GattError> {
        if interface != LE_ADVERTISEMENT_IFACE {
            return Err(GattError::InvalidArgs);
        }
        Ok(self.properties())
    }

    /// Called by the host stack when it stops advertising us
    pub fn release(&self) {
        tracing::info!("{}: released", self.path);
    }

    /// Answer a call addressed to the advertisement object
    pub fn dispatch(&self, call: &MethodCall) -> Result<Reply, GattError> {
        match (call.interface.as_str(), call.member.as_str()) {
            (DBUS_PROP_IFACE, "GetAll") => {
                let interface = call
                    .args
                    .first()
                    .and_then(|v| v.as_str())
                    .ok_or(GattError::InvalidArgs)?;
                self.get_all(interface).map(Reply::Properties)
            }
            (LE_ADVERTISEMENT_IFACE, "Release") => {
                self.release();
                Ok(Reply::Empty)
            }
            (interface, member) => Err(GattError::unknown_method(interface, member)),
        }
    }

    /// AD structures roughly as the host stack will lay them out
    ///
    /// The TX power entry carries a zero placeholder; the controller fills in
    /// the real level.
    pub fn to_ad_structures(&self) -> Vec<AdStructure> {
        let mut out = Vec::new();
        let flags = match self.ad_type {
            AdvertisementType::Peripheral => FLAGS_PERIPHERAL,
            AdvertisementType::Broadcaster => FLAGS_BROADCASTER,
        };
        out.push(AdStructure::new(AD_FLAGS, vec![flags]));

        if let Some(uuids) = &self.service_uuids {
            push_uuid_lists(&mut out, uuids, AD_UUID16_ALL, AD_UUID128_ALL);
        }
        if let Some(uuids) = &self.solicit_uuids {
            push_uuid_lists(&mut out, uuids, AD_SOLICIT16, AD_SOLICIT128);
        }
        if let Some(data) = &self.manufacturer_data {
            for (company, payload) in data {
                let mut d = company.to_le_bytes().to_vec();
                d.extend_from_slice(payload);
                out.push(AdStructure::new(AD_MANUFACTURER, d));
            }
        }
        if let Some(data) = &self.service_data {
            for (uuid, payload) in data {
                let ad_type = if uuid.is_short() { AD_SERVICE_DATA16 } else { AD_SERVICE_DATA128 };
                let mut d = uuid.to_le_bytes();
                d.extend_from_slice(payload);
                out.push(AdStructure::new(ad_type, d));
            }
        }
        if let Some(name) = &self.local_name {
            out.push(AdStructure::new(AD_NAME_COMPLETE, name.as_bytes().to_vec()));
        }
        if self.include_tx_power == Some(true) {
            out.push(AdStructure::new(AD_TX_POWER, vec![0]));
        }
        if let Some(data) = &self.data {
            for (ad_type, payload) in data {
                out.push(AdStructure::new(*ad_type, payload.clone()));
            }
        }
        out
    }

    /// Encoded AD structures, regardless of length
    pub fn encode(&self) -> Result<Vec<u8>, PayloadError> {
        let mut buf = Vec::new();
        for s in self.to_ad_structures() {
            s.encode(&mut buf)?;
        }
        Ok(buf)
    }

    /// Encoded AD structures, refusing payloads that need extended advertising
    pub fn encode_legacy(&self) -> Result<Vec<u8>, PayloadError> {
        let buf = self.encode()?;
        if buf.len() > LEGACY_PAYLOAD_MAX {
            return Err(PayloadError::TooLong(buf.len()));
        }
        Ok(buf)
    }
}

fn push_uuid_lists(out: &mut Vec<AdStructure>, uuids: &[GattUuid], short_type: u8, full_type: u8) {
    let (short, full): (Vec<&GattUuid>, Vec<&GattUuid>) = uuids.iter().partition(|u| u.is_short());
    let short: Vec<u8> = short.into_iter().flat_map(|u| u.to_le_bytes()).collect();
    let full: Vec<u8> = full.into_iter().flat_map(|u| u.to_le_bytes()).collect();
    if !short.is_empty() {
        out.push(AdStructure::new(short_type, short));
    }
    if !full.is_empty() {
        out.push(AdStructure::new(full_type, full));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(props: &PropertyMap) -> Vec<&str> {
        props.keys().map(|k| k.as_str()).collect()
    }

    #[test]
    fn only_set_fields_are_emitted() {
        let mut ad = Advertisement::new(0, AdvertisementType::Peripheral).unwrap();
        assert_eq!(keys(&ad.properties()), vec!["Type"]);

        ad.add_local_name("Vivaldi");
        ad.set_include_tx_power(true);
        let props = ad.properties();
        assert_eq!(keys(&props), vec!["IncludeTxPower", "LocalName", "Type"]);
        assert_eq!(props["Type"], Variant::from("peripheral"));
        assert_eq!(props["LocalName"], Variant::from("Vivaldi"));
        assert_eq!(props["IncludeTxPower"], Variant::Bool(true));
        assert_eq!(ad.path(), "/org/bluez/example/advertisement0");
    }

    #[test]
    fn service_data_accumulates_per_key() {
        let mut ad = Advertisement::new(0, AdvertisementType::Broadcaster).unwrap();
        ad.add_service_data(GattUuid::Short(0x9999), vec![0, 1, 2]);
        ad.add_service_data(GattUuid::Short(0x180f), vec![9]);

        let props = ad.properties();
        let mut expected = BTreeMap::new();
        expected.insert("9999".to_string(), vec![0, 1, 2]);
        expected.insert("180f".to_string(), vec![9]);
        assert_eq!(props["ServiceData"], Variant::StrBytes(expected));
        assert_eq!(props["ServiceData"].signature(), "a{sv}");
    }

    #[test]
    fn container_shapes() {
        let mut ad = Advertisement::new(1, AdvertisementType::Peripheral).unwrap();
        ad.add_service_uuid("12634d89-d598-4874-8e86-7d042ee07ba7".parse().unwrap());
        ad.add_service_uuid(GattUuid::Short(0x180d));
        ad.add_solicit_uuid(GattUuid::Short(0x1812));
        ad.add_manufacturer_data(0xffff, vec![0, 1, 2, 3, 4]);
        ad.add_manufacturer_data(0x004c, vec![7]);
        ad.add_data(0x26, vec![1, 1, 0]);

        let props = ad.properties();
        assert_eq!(
            props["ServiceUUIDs"],
            Variant::StrList(vec!["12634d89-d598-4874-8e86-7d042ee07ba7".into(), "180d".into()])
        );
        assert_eq!(props["SolicitUUIDs"].signature(), "as");
        match &props["ManufacturerData"] {
            Variant::U16Bytes(m) => {
                assert_eq!(m[&0xffff], vec![0, 1, 2, 3, 4]);
                assert_eq!(m[&0x004c], vec![7]);
            }
            other => panic!("unexpected shape: {other:?}"),
        }
        assert_eq!(props["Data"].signature(), "a{yv}");
        assert!(!props.contains_key("LocalName"));
        assert!(!props.contains_key("IncludeTxPower"));
    }

    #[test]
    fn get_all_checks_interface() {
        let ad = Advertisement::new(0, AdvertisementType::Peripheral).unwrap();
        assert_eq!(ad.get_all("org.bluez.GattService1"), Err(GattError::InvalidArgs));
        assert_eq!(ad.get_all(LE_ADVERTISEMENT_IFACE).unwrap(), ad.properties());
    }

    #[test]
    fn dispatch_get_all_and_release() {
        let mut ad = Advertisement::new(0, AdvertisementType::Peripheral).unwrap();
        ad.add_local_name("Vivaldi");
        let get_all = MethodCall::new(
            ad.path().clone(),
            DBUS_PROP_IFACE,
            "GetAll",
            vec![Variant::from(LE_ADVERTISEMENT_IFACE)],
        );
        assert_eq!(ad.dispatch(&get_all).unwrap(), Reply::Properties(ad.properties()));

        let release = MethodCall::new(ad.path().clone(), LE_ADVERTISEMENT_IFACE, "Release", vec![]);
        assert_eq!(ad.dispatch(&release).unwrap(), Reply::Empty);

        let bogus = MethodCall::new(ad.path().clone(), LE_ADVERTISEMENT_IFACE, "Bogus", vec![]);
        assert!(matches!(ad.dispatch(&bogus), Err(GattError::UnknownMethod { .. })));
    }

    #[test]
    fn legacy_payload_layout() {
        let mut ad = Advertisement::new(0, AdvertisementType::Peripheral).unwrap();
        ad.add_manufacturer_data(0xffff, vec![0, 1]);
        ad.add_local_name("Viv");
        ad.set_include_tx_power(true);
        assert_eq!(
            ad.encode_legacy().unwrap(),
            vec![
                0x02, 0x01, 0x06, // flags
                0x05, 0xff, 0xff, 0xff, 0x00, 0x01, // manufacturer
                0x04, 0x09, b'V', b'i', b'v', // name
                0x02, 0x0a, 0x00, // tx power
            ]
        );

        ad.add_service_uuid("12634d89-d598-4874-8e86-7d042ee07ba7".parse().unwrap());
        assert!(matches!(ad.encode_legacy(), Err(PayloadError::TooLong(_))));
        assert!(ad.encode().unwrap().len() > LEGACY_PAYLOAD_MAX);
    }
}
