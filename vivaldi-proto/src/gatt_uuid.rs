use std::fmt;

/// Bluetooth base UUID, 16-bit shorthands expand into bits 96..112
const BASE_UUID: u128 = 0x0000_0000_0000_1000_8000_0080_5f9b_34fb;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UuidError {
    #[error("invalid UUID {0:?}: {1}")]
    Invalid(String, String),
}

/// A GATT attribute UUID, either a 16-bit SIG shorthand or a full 128-bit UUID
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum GattUuid {
    Short(u16),
    Full(::uuid::Uuid),
}

impl GattUuid {
    pub const fn from_u128(v: u128) -> Self {
        Self::Full(::uuid::Uuid::from_u128(v))
    }

    /// The 128-bit form, expanding shorthands against the base UUID
    pub fn to_uuid(&self) -> ::uuid::Uuid {
        match self {
            Self::Short(v) => ::uuid::Uuid::from_u128(BASE_UUID | ((*v as u128) << 96)),
            Self::Full(u) => *u,
        }
    }

    /// Over-the-air byte order (little endian), 2 or 16 bytes
    pub fn to_le_bytes(&self) -> Vec<u8> {
        match self {
            Self::Short(v) => v.to_le_bytes().to_vec(),
            Self::Full(u) => u.as_u128().to_le_bytes().to_vec(),
        }
    }

    pub fn is_short(&self) -> bool {
        matches!(self, Self::Short(_))
    }
}

impl std::str::FromStr for GattUuid {
    type Err = UuidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.len() == 4 {
            return u16::from_str_radix(s, 16)
                .map(Self::Short)
                .map_err(|e| UuidError::Invalid(s.to_string(), e.to_string()));
        }
        ::uuid::Uuid::parse_str(s)
            .map(Self::Full)
            .map_err(|e| UuidError::Invalid(s.to_string(), e.to_string()))
    }
}

impl fmt::Display for GattUuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Short(v) => write!(f, "{v:04x}"),
            Self::Full(u) => write!(f, "{}", u.hyphenated()),
        }
    }
}

impl From<u16> for GattUuid {
    fn from(v: u16) -> Self {
        Self::Short(v)
    }
}

impl From<::uuid::Uuid> for GattUuid {
    fn from(u: ::uuid::Uuid) -> Self {
        Self::Full(u)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let cud: GattUuid = "2901".parse().unwrap();
        assert_eq!(cud, GattUuid::Short(0x2901));
        assert_eq!(cud.to_string(), "2901");

        let full: GattUuid = "12634D89-D598-4874-8E86-7D042EE07BA7".parse().unwrap();
        assert_eq!(full.to_string(), "12634d89-d598-4874-8e86-7d042ee07ba7");
        assert!(!full.is_short());

        assert!("29x1".parse::<GattUuid>().is_err());
        assert!("not-a-uuid".parse::<GattUuid>().is_err());
    }

    #[test]
    fn short_expands_against_base() {
        assert_eq!(
            GattUuid::Short(0x2901).to_uuid().to_string(),
            "00002901-0000-1000-8000-00805f9b34fb"
        );
        assert_eq!(GattUuid::Short(0x9999).to_le_bytes(), vec![0x99, 0x99]);
        assert_eq!(GattUuid::Short(0x180f).to_le_bytes(), vec![0x0f, 0x18]);
    }

    #[test]
    fn full_bytes_are_little_endian() {
        let u = GattUuid::from_u128(0x0102_0304_0506_0708_090a_0b0c_0d0e_0f10);
        let bytes = u.to_le_bytes();
        assert_eq!(bytes.len(), 16);
        assert_eq!(bytes[0], 0x10);
        assert_eq!(bytes[15], 0x01);
    }
}
