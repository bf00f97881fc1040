//! Table and association metadata
//!
//! The registry is built once at startup through [`TableDefinitionsBuilder`]
//! and is read-only afterwards. It answers the inheritance and association
//! questions the drivers ask and carries the column type conversions.

pub mod association;
pub mod builder;
pub mod column;
pub mod definitions;
pub mod errors;
pub mod validation;

pub use association::{Association, AssociationKind};
pub use builder::{TableBuilder, TableDefinitionsBuilder};
pub use column::ColumnDefinition;
pub use definitions::{TableDefinition, TableDefinitions};
pub use errors::SchemaError;
pub use type_mapping::{Collection, ColumnType};
