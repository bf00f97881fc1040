//! Error types for metadata construction and lookup

use crate::validation::ValidationError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SchemaError {
    #[error("table '{0}' is undefined")]
    UnknownTable(String),

    #[error("table '{0}' is defined more than once")]
    DuplicateTable(String),

    #[error("super table '{parent}' of '{table}' is undefined")]
    UnknownParent { table: String, parent: String },

    #[error("inheritance cycle detected at table '{0}'")]
    InheritanceCycle(String),

    #[error("association target '{target}' of '{table}' is undefined")]
    UnknownAssociationTarget { table: String, target: String },

    #[error("association from '{table}' to '{target}' is not found")]
    AssociationNotFound { table: String, target: String },

    #[error("association from '{table}' to '{target}' is ambiguous, {count} candidates")]
    AmbiguousAssociation {
        table: String,
        target: String,
        count: usize,
    },

    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] ValidationError),
}
