//! Characteristic and descriptor access flags
//!
//! The host stack reads these from the `Flags` property and enforces the
//! security prerequisites (encryption, secure connections, authorization)
//! before it ever forwards a read or write to us.

use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Broadcast,
    Read,
    WriteWithoutResponse,
    Write,
    Notify,
    Indicate,
    AuthenticatedSignedWrites,
    ExtendedProperties,
    ReliableWrite,
    WritableAuxiliaries,
    EncryptRead,
    EncryptWrite,
    EncryptAuthenticatedRead,
    EncryptAuthenticatedWrite,
    SecureRead,
    SecureWrite,
    Authorize,
}

const ALL: [Flag; 17] = [
    Flag::Broadcast,
    Flag::Read,
    Flag::WriteWithoutResponse,
    Flag::Write,
    Flag::Notify,
    Flag::Indicate,
    Flag::AuthenticatedSignedWrites,
    Flag::ExtendedProperties,
    Flag::ReliableWrite,
    Flag::WritableAuxiliaries,
    Flag::EncryptRead,
    Flag::EncryptWrite,
    Flag::EncryptAuthenticatedRead,
    Flag::EncryptAuthenticatedWrite,
    Flag::SecureRead,
    Flag::SecureWrite,
    Flag::Authorize,
];

impl Flag {
    pub fn as_str(&self) -> &'static str {
        match self {
            Flag::Broadcast => "broadcast",
            Flag::Read => "read",
            Flag::WriteWithoutResponse => "write-without-response",
            Flag::Write => "write",
            Flag::Notify => "notify",
            Flag::Indicate => "indicate",
            Flag::AuthenticatedSignedWrites => "authenticated-signed-writes",
            Flag::ExtendedProperties => "extended-properties",
            Flag::ReliableWrite => "reliable-write",
            Flag::WritableAuxiliaries => "writable-auxiliaries",
            Flag::EncryptRead => "encrypt-read",
            Flag::EncryptWrite => "encrypt-write",
            Flag::EncryptAuthenticatedRead => "encrypt-authenticated-read",
            Flag::EncryptAuthenticatedWrite => "encrypt-authenticated-write",
            Flag::SecureRead => "secure-read",
            Flag::SecureWrite => "secure-write",
            Flag::Authorize => "authorize",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown access flag: {0:?}")]
pub struct ParseFlagError(pub String);

impl std::str::FromStr for Flag {
    type Err = ParseFlagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ALL.iter()
            .find(|f| f.as_str() == s)
            .copied()
            .ok_or_else(|| ParseFlagError(s.to_string()))
    }
}

impl fmt::Display for Flag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered flag list as exposed in the `Flags` property
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Flags(Vec<Flag>);

impl Flags {
    pub fn new(flags: &[Flag]) -> Self {
        let mut out = Vec::with_capacity(flags.len());
        for f in flags {
            if !out.contains(f) {
                out.push(*f);
            }
        }
        Self(out)
    }

    pub fn contains(&self, flag: Flag) -> bool {
        self.0.contains(&flag)
    }

    pub fn iter(&self) -> impl Iterator<Item = Flag> + '_ {
        self.0.iter().copied()
    }

    pub fn to_strings(&self) -> Vec<String> {
        self.0.iter().map(|f| f.as_str().to_string()).collect()
    }
}

impl<const N: usize> From<[Flag; N]> for Flags {
    fn from(flags: [Flag; N]) -> Self {
        Self::new(&flags)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_round_trip_through_from_str() {
        for flag in ALL {
            assert_eq!(flag.as_str().parse::<Flag>().unwrap(), flag);
        }
        assert!("encrypt".parse::<Flag>().is_err());
    }

    #[test]
    fn flags_keep_order_and_drop_duplicates() {
        let flags = Flags::from([Flag::Read, Flag::Write, Flag::Read, Flag::WritableAuxiliaries]);
        assert_eq!(flags.to_strings(), vec!["read", "write", "writable-auxiliaries"]);
        assert!(flags.contains(Flag::WritableAuxiliaries));
        assert!(!flags.contains(Flag::Notify));
    }
}
