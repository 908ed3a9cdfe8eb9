//! Display names claimed at login.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{DomainError, DomainResult};

/// A validated, non-empty display name.
///
/// Names are compared byte-for-byte: no trimming and no case folding, so
/// `"alice"` and `"Alice"` are distinct and `" "` is a valid name.
/// Deserialization goes through [`DisplayName::parse`], so an empty name can
/// never enter the system from the wire.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DisplayName(String);

impl DisplayName {
    /// Validates and wraps a display name.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::EmptyName` for the empty string.
    pub fn parse(name: impl Into<String>) -> DomainResult<Self> {
        let name = name.into();
        if name.is_empty() {
            return Err(DomainError::EmptyName);
        }
        Ok(Self(name))
    }

    /// Validates the optional `username` field of a login record.
    ///
    /// # Errors
    ///
    /// Returns `DomainError::MissingName` when absent and
    /// `DomainError::EmptyName` when empty.
    pub fn from_login(username: Option<String>) -> DomainResult<Self> {
        username.ok_or(DomainError::MissingName).and_then(Self::parse)
    }

    /// Returns the underlying string reference.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for DisplayName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl TryFrom<&str> for DisplayName {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<DisplayName> for String {
    fn from(name: DisplayName) -> Self {
        name.0
    }
}

impl AsRef<str> for DisplayName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
