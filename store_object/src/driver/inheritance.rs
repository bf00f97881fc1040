use super::cti::{DefaultCtiPolicy, PostgresInheritPolicy};
use super::simple::SimpleDriver;
use super::{Attributes, Driver, RecordVersion, RowCallback};
use crate::criteria::{OperatorRegistry, QueryParams};
use crate::errors::DataStoreError;
use crate::executor::Executor;
use async_trait::async_trait;
use std::sync::Arc;
use table_schema::{TableDefinition, TableDefinitions};
use type_mapping::Dialect;

/// Routes class-table hierarchies to the policy chosen at construction and
/// everything else to the flat driver.
pub struct InheritanceDriver {
    simple: SimpleDriver,
    cti: Box<dyn Driver>,
}

impl InheritanceDriver {
    /// `postgres_inherit` selects native `INHERITS` hierarchies; it only
    /// takes effect on Postgres.
    pub fn new(
        tables: Arc<TableDefinitions>,
        registry: Arc<OperatorRegistry>,
        dialect: Dialect,
        postgres_inherit: bool,
    ) -> Self {
        let native = postgres_inherit && dialect == Dialect::Postgres;
        let simple = SimpleDriver::new(tables, registry, dialect, !native);
        let cti: Box<dyn Driver> = if native {
            Box::new(PostgresInheritPolicy::new(simple.clone()))
        } else {
            Box::new(DefaultCtiPolicy::new(simple.clone()))
        };
        crate::debug_log!(
            "[DRIVER] dialect: {}, native inheritance: {}",
            dialect.name(),
            native
        );
        Self { simple, cti }
    }

    pub fn simple(&self) -> &SimpleDriver {
        &self.simple
    }

    fn route(&self, table: &TableDefinition) -> &dyn Driver {
        if table.is_class_table_inheritance() {
            self.cti.as_ref()
        } else {
            &self.simple
        }
    }
}

#[async_trait]
impl Driver for InheritanceDriver {
    async fn insert(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        attributes: &Attributes,
    ) -> Result<i64, DataStoreError> {
        self.simple.insert(conn, table, attributes).await
    }

    async fn count(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<i64, DataStoreError> {
        self.route(table).count(conn, table, params).await
    }

    async fn snapshot(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<RecordVersion>, DataStoreError> {
        self.route(table).snapshot(conn, table, params).await
    }

    async fn find_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<Attributes, DataStoreError> {
        self.route(table).find_by_id(conn, table, id).await
    }

    async fn find(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        self.route(table).find(conn, table, params).await
    }

    async fn update(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        attributes: &Attributes,
    ) -> Result<u64, DataStoreError> {
        self.route(table).update(conn, table, params, attributes).await
    }

    async fn update_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
        attributes: &Attributes,
    ) -> Result<(), DataStoreError> {
        self.route(table).update_by_id(conn, table, id, attributes).await
    }

    async fn delete(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<u64, DataStoreError> {
        self.route(table).delete(conn, table, params).await
    }

    async fn delete_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<(), DataStoreError> {
        self.route(table).delete_by_id(conn, table, id).await
    }

    async fn for_each(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        callback: &mut RowCallback<'_>,
    ) -> Result<(), DataStoreError> {
        self.route(table).for_each(conn, table, params, callback).await
    }
}
