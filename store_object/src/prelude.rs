//! Convenience re-exports for common store-object usage

// Sessions and their results
pub use crate::driver::{Attributes, RecordVersion};
pub use crate::session::{SaveAction, Session};

// Error types
pub use crate::errors::DataStoreError;

// Query building
pub use crate::criteria::{OperatorRegistry, QueryParams};

// Connections
pub use crate::executor::{connect, Executor};

// Metadata the session is built over
pub use table_schema::{Association, ColumnDefinition, TableBuilder, TableDefinitions, TableDefinitionsBuilder};
pub use type_mapping::{ColumnType, Dialect};
