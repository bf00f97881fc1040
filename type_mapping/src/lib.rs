//! Unified type mapping between attribute maps and SQL values
//! This crate provides the conversion logic used across the relstore ecosystem

pub mod dialect;
pub mod errors;
pub mod sql;
pub mod types;
pub mod validate;

pub use dialect::Dialect;
pub use errors::TypeError;
pub use sql::{Collection, ColumnType};
pub use types::SqlValue;
