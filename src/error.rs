//! Error types for balancebook
//!
//! Library errors use thiserror. Validator findings are not errors: they are
//! returned as [`Violation`](crate::services::validator::Violation) data so a
//! caller sees every problem in one pass.

use thiserror::Error;

use crate::models::StructuralError;
use crate::services::import::ReviewId;
use crate::services::validator::Violation;

/// The main error type for balancebook operations
#[derive(Error, Debug)]
pub enum BookError {
    /// A single entity was malformed
    #[error("Structural error: {0}")]
    Structural(#[from] StructuralError),

    /// Entity not found errors
    #[error("{entity_type} not found: {identifier}")]
    NotFound {
        entity_type: &'static str,
        identifier: String,
    },

    /// Duplicate entity errors
    #[error("{entity_type} already exists: {identifier}")]
    Duplicate {
        entity_type: &'static str,
        identifier: String,
    },

    /// The merged ledger failed validation and the import was rolled back
    #[error(transparent)]
    MergeConflict(#[from] MergeConflictError),

    /// An import proposal was resolved against a ledger it was not built from
    #[error("Import proposal is stale: the ledger changed since it was proposed")]
    StaleProposal,

    /// Review items still waiting for a decision
    #[error("{} review item(s) have no decision", .0.len())]
    UnresolvedReview(Vec<ReviewId>),

    /// A decision referenced a review item the proposal does not contain
    #[error("Unknown review item: {0}")]
    UnknownReviewItem(ReviewId),

    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// File I/O errors
    #[error("I/O error: {0}")]
    Io(String),

    /// CSV reading/writing errors
    #[error("CSV error: {0}")]
    Csv(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(String),

    /// YAML serialization/deserialization errors
    #[error("YAML error: {0}")]
    Yaml(String),

    /// Storage errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Import errors
    #[error("Import error: {0}")]
    Import(String),

    /// An invariant the public API cannot break was broken anyway
    #[error("Internal error (this is a bug): {0}")]
    Internal(String),
}

/// Post-merge validation failure; the ledger is left as it was
#[derive(Error, Debug, Clone, PartialEq)]
#[error("Merge rejected: {} violation(s) after merge", violations.len())]
pub struct MergeConflictError {
    pub violations: Vec<Violation>,
}

impl BookError {
    /// Create a "not found" error for accounts
    pub fn account_not_found(identifier: impl Into<String>) -> Self {
        Self::NotFound {
            entity_type: "Account",
            identifier: identifier.into(),
        }
    }

    /// Create a "not found" error for transactions
    pub fn transaction_not_found(position: usize) -> Self {
        Self::NotFound {
            entity_type: "Transaction",
            identifier: format!("#{}", position),
        }
    }

    /// Create a "duplicate" error for accounts
    pub fn duplicate_account(identifier: impl Into<String>) -> Self {
        Self::Duplicate {
            entity_type: "Account",
            identifier: identifier.into(),
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Check if this is a structural error
    pub fn is_structural(&self) -> bool {
        matches!(self, Self::Structural(_))
    }
}

impl From<std::io::Error> for BookError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<csv::Error> for BookError {
    fn from(err: csv::Error) -> Self {
        Self::Csv(err.to_string())
    }
}

impl From<serde_json::Error> for BookError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}

impl From<serde_yaml::Error> for BookError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::Yaml(err.to_string())
    }
}

/// Result type alias for balancebook operations
pub type BookResult<T> = Result<T, BookError>;
