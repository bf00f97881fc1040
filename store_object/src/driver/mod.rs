//! Table drivers
//!
//! A [`Driver`] runs one operation against one table definition over a
//! borrowed [`Executor`]. [`SimpleDriver`] handles flat and single-table
//! hierarchies; class-table hierarchies go through a policy picked once by
//! [`InheritanceDriver`].

pub mod cti;
pub mod inheritance;
pub mod simple;

use crate::criteria::QueryParams;
use crate::errors::DataStoreError;
use crate::executor::Executor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use table_schema::TableDefinition;

pub use cti::{DefaultCtiPolicy, PostgresInheritPolicy};
pub use inheritance::InheritanceDriver;
pub use simple::SimpleDriver;

/// Untyped attribute map of one entity
pub type Attributes = Map<String, Value>;

/// Staleness marker of one row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordVersion {
    pub id: i64,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Receives `(concrete table, id)` for every matched row
pub type RowCallback<'a> =
    dyn FnMut(&Arc<TableDefinition>, i64) -> Result<(), DataStoreError> + Send + 'a;

#[async_trait]
pub trait Driver: Send + Sync {
    async fn insert(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        attributes: &Attributes,
    ) -> Result<i64, DataStoreError>;

    async fn count(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<i64, DataStoreError>;

    async fn snapshot(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<RecordVersion>, DataStoreError>;

    async fn find_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<Attributes, DataStoreError>;

    async fn find(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<Attributes>, DataStoreError>;

    async fn update(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        attributes: &Attributes,
    ) -> Result<u64, DataStoreError>;

    async fn update_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
        attributes: &Attributes,
    ) -> Result<(), DataStoreError>;

    async fn delete(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<u64, DataStoreError>;

    async fn delete_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<(), DataStoreError>;

    async fn for_each(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        callback: &mut RowCallback<'_>,
    ) -> Result<(), DataStoreError>;
}

/// Integer id from an attribute value, accepting numeric strings
pub fn id_of(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

pub(crate) fn record_not_found(table: &TableDefinition, id: i64) -> DataStoreError {
    DataStoreError::NotFound(format!(
        "record with id '{}' is not found in the '{}'",
        id,
        table.underscore_name()
    ))
}

/// Exactly one affected row, or NotFound / Internal
pub(crate) fn expect_one(affected: u64, table: &TableDefinition, id: i64) -> Result<(), DataStoreError> {
    match affected {
        0 => Err(record_not_found(table, id)),
        1 => Ok(()),
        n => Err(DataStoreError::InternalServerError(format!(
            "affected rows is not equals 1, actual is {}",
            n
        ))),
    }
}
