//! Error types for the relstore crate

use thiserror::Error;

#[derive(Error, Debug)]
pub enum RelstoreError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Schema error: {0}")]
    Schema(#[from] table_schema::SchemaError),

    #[error(transparent)]
    Store(#[from] store_object::DataStoreError),
}

impl RelstoreError {
    /// HTTP-style status of the underlying failure
    pub fn status_code(&self) -> u16 {
        match self {
            RelstoreError::Config(_) | RelstoreError::Schema(_) => 500,
            RelstoreError::Store(e) => e.status_code(),
        }
    }
}
