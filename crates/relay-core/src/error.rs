//! Domain-specific error types following panic-free policy.

use thiserror::Error;

/// Errors that can occur in domain operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Display name was empty
    #[error("display name must not be empty")]
    EmptyName,

    /// Display name was absent from a login record
    #[error("display name is missing")]
    MissingName,
}

/// Result type for domain operations.
pub type DomainResult<T> = Result<T, DomainError>;
