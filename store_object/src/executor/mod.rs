//! Connection executors
//!
//! An [`Executor`] owns one physical connection. Statements come in as SQL
//! text plus [`SqlValue`] arguments; rows come back decoded by the column
//! types the caller expects, with SQL `NULL` as `None`.

use crate::criteria::Statement;
use crate::errors::DataStoreError;
use async_trait::async_trait;
use std::time::Duration;
use type_mapping::{ColumnType, Dialect, SqlValue};

/// Bind every statement argument in order
macro_rules! bind_all {
    ($query:expr, $params:expr) => {{
        let mut query = $query;
        for value in $params {
            query = match value {
                SqlValue::Null => query.bind(None::<String>),
                SqlValue::Boolean(b) => query.bind(*b),
                SqlValue::Integer(i) => query.bind(*i),
                SqlValue::Decimal(d) => query.bind(*d),
                SqlValue::Text(s) => query.bind(s.as_str()),
                SqlValue::Timestamp(t) => query.bind(*t),
            };
        }
        query
    }};
}

pub mod postgres;
pub mod sqlite;

pub use postgres::PgExecutor;
pub use sqlite::SqliteExecutor;

/// One decoded row, positionally aligned with the requested column types
pub type Row = Vec<Option<SqlValue>>;

#[async_trait]
pub trait Executor: Send {
    fn dialect(&self) -> Dialect;

    async fn fetch_rows(
        &mut self,
        stmt: &Statement,
        columns: &[ColumnType],
    ) -> Result<Vec<Row>, DataStoreError>;

    async fn fetch_count(&mut self, stmt: &Statement) -> Result<i64, DataStoreError>;

    /// Rows affected
    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DataStoreError>;

    /// Run an INSERT and return the generated id
    async fn insert(&mut self, stmt: &Statement) -> Result<i64, DataStoreError>;

    async fn close(self: Box<Self>) -> Result<(), DataStoreError>;
}

/// Open one connection for the given dialect
pub async fn connect(
    dialect: Dialect,
    url: &str,
    timeout: Duration,
) -> Result<Box<dyn Executor>, DataStoreError> {
    let connecting = async {
        match dialect {
            Dialect::Postgres => Ok(Box::new(PgExecutor::connect(url).await?) as Box<dyn Executor>),
            Dialect::Sqlite => Ok(Box::new(SqliteExecutor::connect(url).await?) as Box<dyn Executor>),
            other => Err(DataStoreError::Unavailable(format!(
                "no executor is available for the '{}' dialect",
                other
            ))),
        }
    };

    tokio::time::timeout(timeout, connecting)
        .await
        .map_err(|_| {
            DataStoreError::Timeout(format!(
                "connect to {} database timed out after {:?}",
                dialect, timeout
            ))
        })?
}
