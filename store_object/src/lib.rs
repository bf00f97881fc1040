//! Store Object - relational data access for relstore
//!
//! This crate compiles query parameters into SQL, runs statements over one
//! connection per [`Session`], maps table inheritance onto physical tables
//! and cascades inserts and deletes through associations.

/// Conditional debug logging macros
/// These macros only compile in code when the `debug-logging` feature is enabled
#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {
        tracing::debug!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! debug_log {
    ($($arg:tt)*) => {};
}

#[cfg(feature = "debug-logging")]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {
        tracing::trace!($($arg)*)
    };
}

#[cfg(not(feature = "debug-logging"))]
#[macro_export]
macro_rules! trace_log {
    ($($arg:tt)*) => {};
}

pub mod criteria;
pub mod driver;
pub mod errors;
pub mod executor;
pub mod prelude;
pub mod session;

pub use criteria::{CriteriaBuilder, OperatorRegistry, QueryParams, Statement};
pub use driver::{Attributes, Driver, InheritanceDriver, RecordVersion, SimpleDriver};
pub use errors::DataStoreError;
pub use executor::{connect, Executor, PgExecutor, SqliteExecutor};
pub use session::{SaveAction, Session};
