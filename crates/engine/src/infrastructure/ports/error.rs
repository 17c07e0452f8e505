//! Error types for port operations.

use taleweaver_domain::{DomainError, OwnerId};

/// Repository operation errors with context for debugging.
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    /// No row visible to the requesting owner. Also used for rows that exist
    /// under another owner.
    #[error("{entity_type} not found: {id}")]
    NotFound {
        entity_type: &'static str,
        id: String,
    },

    /// Malformed identifier, wrong document shape or a rejected operation.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// A link names an identifier with no row in the same scope.
    #[error("Dangling reference in {field}: {target} does not exist")]
    DanglingReference { field: String, target: String },

    /// The numeric sequence for a `(prefix, owner)` reached its limit.
    #[error("Identifier space exhausted for {prefix} (owner {owner}, limit {limit})")]
    AllocatorExhausted {
        prefix: String,
        owner: OwnerId,
        limit: u64,
    },

    /// The unit of work failed and was rolled back - includes operation name for tracing.
    #[error("Transaction failed in {operation}: {message}")]
    Transaction {
        operation: &'static str,
        message: String,
    },

    /// A stored value could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl RepoError {
    /// Create a NotFound error with entity type and ID context.
    pub fn not_found(entity_type: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity_type,
            id: id.to_string(),
        }
    }

    pub fn validation(message: impl ToString) -> Self {
        Self::Validation(message.to_string())
    }

    pub fn dangling(field: impl ToString, target: impl ToString) -> Self {
        Self::DanglingReference {
            field: field.to_string(),
            target: target.to_string(),
        }
    }

    /// Create a Transaction error with operation context.
    pub fn transaction(operation: &'static str, message: impl ToString) -> Self {
        Self::Transaction {
            operation,
            message: message.to_string(),
        }
    }

    pub fn serialization(message: impl ToString) -> Self {
        Self::Serialization(message.to_string())
    }

    /// Check if this is a NotFound error.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// True for conditions caused by the caller's input rather than the store.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_) | Self::DanglingReference { .. } | Self::AllocatorExhausted { .. }
        )
    }
}

impl From<DomainError> for RepoError {
    fn from(err: DomainError) -> Self {
        Self::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_names_type_and_id() {
        let err = RepoError::not_found("Rule", "R-0001");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Rule not found: R-0001");
    }

    #[test]
    fn domain_errors_become_validation() {
        let err: RepoError = DomainError::invalid_id("R-").into();
        assert!(matches!(err, RepoError::Validation(_)));
        assert!(err.is_client_error());
    }

    #[test]
    fn transaction_errors_are_not_client_errors() {
        let err = RepoError::transaction("persist", "disk I/O error");
        assert!(!err.is_client_error());
        assert!(err.to_string().contains("persist"));
    }
}
