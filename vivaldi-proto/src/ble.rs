//! GATT profile constants for the Vivaldi S1 peripheral
//!
//! UUIDs shared by the peripheral and anything that talks to it. The test
//! characteristics exercise plain, encrypted and secure access; the product
//! characteristics front the device-control backend.

/// Vivaldi S1 service UUID: 12634d89-d598-4874-8e86-7d042ee07ba7
pub const SERVICE_UUID: &str = "12634d89-d598-4874-8e86-7d042ee07ba7";

/// Index appended to the service base path
pub const SERVICE_INDEX: u32 = 2;

/// Plain read/write test characteristic
pub const TEST_CHRC_UUID: &str = "12345678-1234-5678-1234-56789abcdef1";

/// Static test descriptor of the plain characteristic
pub const TEST_DESC_UUID: &str = "12345678-1234-5678-1234-56789abcdef2";

/// Test characteristic requiring an encrypted link
pub const TEST_ENCRYPT_CHRC_UUID: &str = "12345678-1234-5678-1234-56789abcdef3";

/// Static descriptor requiring an encrypted link
pub const TEST_ENCRYPT_DESC_UUID: &str = "12345678-1234-5678-1234-56789abcdef4";

/// Test characteristic requiring a secure connection
pub const TEST_SECURE_CHRC_UUID: &str = "12345678-1234-5678-1234-56789abcdef5";

/// Static descriptor requiring a secure connection
pub const TEST_SECURE_DESC_UUID: &str = "12345678-1234-5678-1234-56789abcdef6";

/// Power state characteristic (read/write/notify)
pub const POWER_CHRC_UUID: &str = "12634d89-d598-4874-8e86-7d042ee07ba8";

/// Volume characteristic (read/write), one byte 0..=100
pub const VOLUME_CHRC_UUID: &str = "12634d89-d598-4874-8e86-7d042ee07ba9";

/// Characteristic User Description descriptor (16-bit SIG UUID)
pub const CUD_UUID: &str = "2901";

/// Company identifier used for the test manufacturer data (reserved for testing)
pub const TEST_COMPANY_ID: u16 = 0xFFFF;

/// Power values
pub mod power {
    pub const ON: &str = "ON";
    pub const OFF: &str = "OFF";

    /// Reported when the backend state is not known
    pub const UNKNOWN: &str = "UNKNOWN";

    /// Values a client may write
    pub const LEGAL: [&str; 2] = [ON, OFF];
}

/// Volume values
pub mod volume {
    pub const MAX: u8 = 100;

    /// Reported when the backend state is not known
    pub const UNKNOWN: u8 = 0xFF;
}
