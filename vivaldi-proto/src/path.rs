//! Object paths
//!
//! `/` followed by `/`-separated elements of `[A-Za-z0-9_]`, no empty
//! elements and no trailing slash (except the root path itself).

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PathError {
    #[error("object path must start with '/': {0:?}")]
    NotAbsolute(String),
    #[error("object path has an empty element: {0:?}")]
    EmptyElement(String),
    #[error("object path has an invalid character {1:?}: {0:?}")]
    InvalidChar(String, char),
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectPath(String);

impl ObjectPath {
    pub fn new(path: impl Into<String>) -> Result<Self, PathError> {
        let path = path.into();
        validate(&path)?;
        Ok(Self(path))
    }

    pub fn root() -> Self {
        Self("/".to_string())
    }

    /// Append one element, e.g. `/a` + `char0` = `/a/char0`
    pub fn child(&self, element: &str) -> Result<Self, PathError> {
        if self.0 == "/" {
            Self::new(format!("/{element}"))
        } else {
            Self::new(format!("{}/{element}", self.0))
        }
    }

    /// Path of the enclosing object, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.0 == "/" {
            return None;
        }
        match self.0.rfind('/') {
            Some(0) => Some(Self::root()),
            Some(i) => Some(Self(self.0[..i].to_string())),
            None => None,
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn validate(path: &str) -> Result<(), PathError> {
    if !path.starts_with('/') {
        return Err(PathError::NotAbsolute(path.to_string()));
    }
    if path == "/" {
        return Ok(());
    }
    for element in path[1..].split('/') {
        if element.is_empty() {
            return Err(PathError::EmptyElement(path.to_string()));
        }
        if let Some(c) = element.chars().find(|c| !(c.is_ascii_alphanumeric() || *c == '_')) {
            return Err(PathError::InvalidChar(path.to_string(), c));
        }
    }
    Ok(())
}

impl fmt::Display for ObjectPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ObjectPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for ObjectPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl PartialEq<str> for ObjectPath {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ObjectPath {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl serde::Serialize for ObjectPath {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn child_and_parent() {
        let service = ObjectPath::new("/org/bluez/example/service2").unwrap();
        let chrc = service.child("char0").unwrap();
        assert_eq!(chrc, "/org/bluez/example/service2/char0");
        assert_eq!(chrc.parent(), Some(service));
        assert_eq!(ObjectPath::root().child("a").unwrap(), "/a");
        assert_eq!(ObjectPath::new("/a").unwrap().parent(), Some(ObjectPath::root()));
        assert_eq!(ObjectPath::root().parent(), None);
    }

    #[test]
    fn rejects_malformed() {
        assert!(matches!(ObjectPath::new("a/b"), Err(PathError::NotAbsolute(_))));
        assert!(matches!(ObjectPath::new("/a//b"), Err(PathError::EmptyElement(_))));
        assert!(matches!(ObjectPath::new("/a/"), Err(PathError::EmptyElement(_))));
        assert!(matches!(ObjectPath::new("/a-b"), Err(PathError::InvalidChar(_, '-'))));
    }
}
