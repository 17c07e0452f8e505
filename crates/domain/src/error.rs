//! Unified error types for the domain layer
//!
//! Identifier parsing, registry lookups and document conversion all report
//! through [`DomainError`], so adapters never have to fall back to `String`.

use thiserror::Error;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// Validation failed (e.g., a document field has the wrong shape)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Invalid ID format
    #[error("Invalid ID format: {0}")]
    InvalidId(String),

    /// No registry entry exists for the requested type tag
    #[error("Unknown object type: {0}")]
    UnknownType(String),
}

impl DomainError {
    /// Creates a validation error for malformed input.
    ///
    /// Use this when a value is structurally wrong:
    /// - Required fields are missing
    /// - A field has the wrong JSON kind
    /// - An identifier belongs to a different type than expected
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Create an invalid ID error
    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    /// Create an unknown type error
    pub fn unknown_type(prefix: impl Into<String>) -> Self {
        Self::UnknownType(prefix.into())
    }
}

impl From<serde_json::Error> for DomainError {
    fn from(err: serde_json::Error) -> Self {
        Self::Validation(err.to_string())
    }
}
