/// Errors returned to the host stack from property queries, value operations
/// and agent requests. All are terminal for the call that produced them.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GattError {
    #[error("invalid arguments")]
    InvalidArgs,
    #[error("operation not supported")]
    NotSupported,
    #[error("operation not permitted")]
    NotPermitted,
    #[error("invalid value length")]
    InvalidValueLength,
    #[error("invalid offset")]
    InvalidOffset,
    #[error("operation failed: {0}")]
    Failed(String),
    #[error("rejected: {0}")]
    Rejected(String),
    #[error("request canceled")]
    Canceled,
    #[error("no such object: {0}")]
    UnknownObject(String),
    #[error("unknown method {interface}.{member}")]
    UnknownMethod { interface: String, member: String },
}

impl GattError {
    /// Error name the host stack sees on the bus
    pub fn dbus_name(&self) -> &'static str {
        match self {
            GattError::InvalidArgs => "org.freedesktop.DBus.Error.InvalidArgs",
            GattError::NotSupported => "org.bluez.Error.NotSupported",
            GattError::NotPermitted => "org.bluez.Error.NotPermitted",
            GattError::InvalidValueLength => "org.bluez.Error.InvalidValueLength",
            GattError::InvalidOffset => "org.bluez.Error.InvalidOffset",
            GattError::Failed(_) => "org.bluez.Error.Failed",
            GattError::Rejected(_) => "org.bluez.Error.Rejected",
            GattError::Canceled => "org.bluez.Error.Canceled",
            GattError::UnknownObject(_) => "org.freedesktop.DBus.Error.UnknownObject",
            GattError::UnknownMethod { .. } => "org.freedesktop.DBus.Error.UnknownMethod",
        }
    }

    pub fn unknown_method(interface: &str, member: &str) -> Self {
        GattError::UnknownMethod {
            interface: interface.to_string(),
            member: member.to_string(),
        }
    }
}
