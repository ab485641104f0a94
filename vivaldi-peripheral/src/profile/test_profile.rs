use vivaldi_gatt::{Application, ServiceId, StaticValue, StoredValue, UserDescription};
use vivaldi_proto::ble;
use vivaldi_proto::{Flag, GattUuid};

use super::{ProfileError, uuid};

/// Static value of the plain characteristic's test descriptor
pub const TEST_DESC_VALUE: &[u8] = b"This is here it s1";

/// Static value of the encrypted and secure test descriptors
pub const SECURED_DESC_VALUE: &[u8] = b"Test";

/// Plain, encrypted and secure read/write characteristics, each with a
/// static descriptor and a user description
pub fn add_test_characteristics(
    app: &mut Application,
    service: ServiceId,
) -> Result<(), ProfileError> {
    let cud: GattUuid = uuid(ble::CUD_UUID)?;

    let plain = app.add_characteristic(
        service,
        uuid(ble::TEST_CHRC_UUID)?,
        [Flag::Read, Flag::Write, Flag::WritableAuxiliaries],
        StoredValue::new("TestCharacteristic", Vec::new()),
    )?;
    app.add_descriptor(
        plain,
        uuid(ble::TEST_DESC_UUID)?,
        [Flag::Read, Flag::Write],
        StaticValue::new(TEST_DESC_VALUE),
    )?;
    let description = UserDescription::new(super::CUD_TEXT);
    app.add_descriptor(plain, cud, [Flag::Read, Flag::Write], description)?;

    let encrypted = app.add_characteristic(
        service,
        uuid(ble::TEST_ENCRYPT_CHRC_UUID)?,
        [Flag::EncryptRead, Flag::EncryptWrite],
        StoredValue::new("TestEncryptCharacteristic", Vec::new()),
    )?;
    app.add_descriptor(
        encrypted,
        uuid(ble::TEST_ENCRYPT_DESC_UUID)?,
        [Flag::EncryptRead, Flag::EncryptWrite],
        StaticValue::new(SECURED_DESC_VALUE),
    )?;
    let description = UserDescription::new(super::CUD_TEXT);
    app.add_descriptor(encrypted, cud, [Flag::Read, Flag::Write], description)?;

    let secure = app.add_characteristic(
        service,
        uuid(ble::TEST_SECURE_CHRC_UUID)?,
        [Flag::SecureRead, Flag::SecureWrite],
        StoredValue::new("TestSecureCharacteristic", Vec::new()),
    )?;
    app.add_descriptor(
        secure,
        uuid(ble::TEST_SECURE_DESC_UUID)?,
        [Flag::SecureRead, Flag::SecureWrite],
        StaticValue::new(SECURED_DESC_VALUE),
    )?;
    let description = UserDescription::new(super::CUD_TEXT);
    app.add_descriptor(secure, cud, [Flag::Read, Flag::Write], description)?;

    Ok(())
}
