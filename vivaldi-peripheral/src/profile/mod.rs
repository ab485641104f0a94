//! GATT profiles served by the peripheral
//!
//! Both profiles live in the Vivaldi S1 service at index 2. The test profile
//! exercises plain, encrypted and secure access with in-memory values; the
//! Vivaldi profile fronts the device-control backend.

pub mod test_profile;
pub mod vivaldi;

use std::sync::Arc;

use vivaldi_gatt::Application;
use vivaldi_gatt::UserDescription;
use vivaldi_gatt::advertisement::{Advertisement, AdvertisementType};
use vivaldi_proto::ble;
use vivaldi_proto::{Flag, GattUuid, PathError, UuidError};

use crate::backend::DeviceBackend;
use crate::config::ProfileKind;

pub use vivaldi::{PowerCharacteristic, VolumeCharacteristic};

/// User description of the test characteristics
pub const CUD_TEXT: &str = "This is a characteristic for testing";

pub const POWER_DESCRIPTION: &str = "Power state (ON/OFF)";

pub const VOLUME_DESCRIPTION: &str = "Volume level (0-100)";

#[derive(thiserror::Error, Debug)]
pub enum ProfileError {
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Uuid(#[from] UuidError),
}

pub(crate) fn uuid(s: &str) -> Result<GattUuid, ProfileError> {
    Ok(s.parse()?)
}

/// The Vivaldi S1 service with the characteristics of `kind`
pub fn build_application(
    kind: ProfileKind,
    backend: Arc<dyn DeviceBackend>,
) -> Result<Application, ProfileError> {
    let mut app = Application::new();
    let service = app.add_service(ble::SERVICE_INDEX, uuid(ble::SERVICE_UUID)?, true)?;

    match kind {
        ProfileKind::Test => test_profile::add_test_characteristics(&mut app, service)?,
        ProfileKind::Vivaldi => {
            let cud = uuid(ble::CUD_UUID)?;

            let power = app.add_characteristic(
                service,
                uuid(ble::POWER_CHRC_UUID)?,
                [Flag::Read, Flag::Write, Flag::Notify],
                PowerCharacteristic::new(backend.clone()),
            )?;
            let description = UserDescription::new(POWER_DESCRIPTION);
            app.add_descriptor(power, cud, [Flag::Read], description)?;

            let volume = app.add_characteristic(
                service,
                uuid(ble::VOLUME_CHRC_UUID)?,
                [Flag::Read, Flag::Write],
                VolumeCharacteristic::new(backend),
            )?;
            let description = UserDescription::new(VOLUME_DESCRIPTION);
            app.add_descriptor(volume, cud, [Flag::Read], description)?;
        }
    }

    tracing::debug!("built {kind:?} profile with {} objects", app.len());
    Ok(app)
}

/// Connectable advertisement carrying the test manufacturer and service data
pub fn test_advertisement(index: u32, local_name: &str) -> Result<Advertisement, ProfileError> {
    let mut ad = Advertisement::new(index, AdvertisementType::Peripheral)?;
    ad.add_manufacturer_data(ble::TEST_COMPANY_ID, vec![0x00, 0x01, 0x02, 0x03, 0x04]);
    ad.add_service_data(GattUuid::from(0x9999u16), vec![0x00, 0x01, 0x02, 0x03, 0x04]);
    ad.add_local_name(local_name);
    ad.set_include_tx_power(true);
    ad.add_data(0x26, vec![0x01, 0x01, 0x00]);
    Ok(ad)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{BackendError, DeviceState, Request};
    use async_trait::async_trait;
    use serde_json::Value as JsonValue;
    use vivaldi_gatt::MethodCall;
    use vivaldi_proto::{
        GATT_CHRC_IFACE, GATT_DESC_IFACE, GattError, LE_ADVERTISEMENT_IFACE, ObjectPath, Variant,
    };

    struct Offline;

    #[async_trait]
    impl DeviceBackend for Offline {
        async fn device_state(&self) -> Result<DeviceState, BackendError> {
            Err(BackendError::Device("offline".to_string()))
        }

        async fn send_command(&self, _request: Request) -> Result<JsonValue, BackendError> {
            Err(BackendError::Device("offline".to_string()))
        }
    }

    fn path(s: &str) -> ObjectPath {
        ObjectPath::new(s).unwrap()
    }

    #[test]
    fn test_profile_layout() {
        let app = build_application(ProfileKind::Test, Arc::new(Offline)).unwrap();
        let paths: Vec<String> = app
            .managed_objects()
            .paths()
            .map(|p| p.to_string())
            .collect();
        assert_eq!(
            paths,
            [
                "/org/bluez/example/service2",
                "/org/bluez/example/service2/char0",
                "/org/bluez/example/service2/char0/desc0",
                "/org/bluez/example/service2/char0/desc1",
                "/org/bluez/example/service2/char1",
                "/org/bluez/example/service2/char1/desc0",
                "/org/bluez/example/service2/char1/desc1",
                "/org/bluez/example/service2/char2",
                "/org/bluez/example/service2/char2/desc0",
                "/org/bluez/example/service2/char2/desc1",
            ]
        );
    }

    #[tokio::test]
    async fn test_profile_descriptor_rules() {
        let mut app = build_application(ProfileKind::Test, Arc::new(Offline)).unwrap();

        // the plain characteristic allows CUD writes, the encrypted one does not
        let write = |p: &str| {
            MethodCall::new(
                path(p),
                GATT_DESC_IFACE,
                "WriteValue",
                vec![Variant::Bytes(b"renamed".to_vec()), Variant::Dict(Default::default())],
            )
        };
        app.dispatch(write("/org/bluez/example/service2/char0/desc1")).await.unwrap();
        assert_eq!(
            app.dispatch(write("/org/bluez/example/service2/char1/desc1")).await,
            Err(GattError::NotPermitted)
        );

        let read = MethodCall::new(
            path("/org/bluez/example/service2/char1/desc0"),
            GATT_DESC_IFACE,
            "ReadValue",
            vec![Variant::Dict(Default::default())],
        );
        assert_eq!(
            app.dispatch(read).await,
            Ok(vivaldi_gatt::Reply::Value(test_profile::SECURED_DESC_VALUE.to_vec()))
        );
    }

    #[tokio::test]
    async fn vivaldi_profile_reads_unknown_when_offline() {
        let mut app = build_application(ProfileKind::Vivaldi, Arc::new(Offline)).unwrap();
        assert_eq!(app.len(), 5);

        let read = |p: &str| {
            let no_options = vec![Variant::Dict(Default::default())];
            MethodCall::new(path(p), GATT_CHRC_IFACE, "ReadValue", no_options)
        };
        assert_eq!(
            app.dispatch(read("/org/bluez/example/service2/char0")).await,
            Ok(vivaldi_gatt::Reply::Value(b"UNKNOWN".to_vec()))
        );
        assert_eq!(
            app.dispatch(read("/org/bluez/example/service2/char1")).await,
            Ok(vivaldi_gatt::Reply::Value(vec![0xFF]))
        );
    }

    #[test]
    fn test_advertisement_properties() {
        let ad = test_advertisement(0, "Vivaldi").unwrap();
        assert_eq!(ad.path(), "/org/bluez/example/advertisement0");

        let props = ad.get_all(LE_ADVERTISEMENT_IFACE).unwrap();
        let keys: Vec<&str> = props.keys().map(String::as_str).collect();
        assert_eq!(
            keys,
            ["Data", "IncludeTxPower", "LocalName", "ManufacturerData", "ServiceData", "Type"]
        );
        assert_eq!(props["LocalName"], Variant::from("Vivaldi"));
        assert_eq!(props["Type"], Variant::from("peripheral"));
    }
}
