//! Class-table inheritance policies
//!
//! [`DefaultCtiPolicy`] treats each table of a hierarchy as an independent
//! physical table and walks the children itself. [`PostgresInheritPolicy`]
//! relies on `INHERITS`, so a parent table already contains every child row
//! and only the concrete table of each row has to be looked up.

use super::simple::SimpleDriver;
use super::{record_not_found, Attributes, Driver, RecordVersion, RowCallback};
use crate::criteria::{CriteriaBuilder, QueryParams, Statement};
use crate::errors::DataStoreError;
use crate::executor::Executor;
use async_trait::async_trait;
use std::sync::Arc;
use table_schema::{ColumnType, TableDefinition};
use type_mapping::SqlValue;

pub struct DefaultCtiPolicy {
    simple: SimpleDriver,
}

impl DefaultCtiPolicy {
    pub fn new(simple: SimpleDriver) -> Self {
        Self { simple }
    }

    fn children(&self, table: &TableDefinition) -> Vec<Arc<TableDefinition>> {
        self.simple
            .tables()
            .own_children_of(table)
            .into_iter()
            .cloned()
            .collect()
    }

    fn route(&self, table: &TableDefinition) -> &dyn Driver {
        if table.is_class_table_inheritance() {
            self
        } else {
            &self.simple
        }
    }
}

#[async_trait]
impl Driver for DefaultCtiPolicy {
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
        let mut total = self.simple.count(conn, table, params).await?;
        for child in self.children(table) {
            total += self.route(&child).count(conn, &child, params).await?;
        }
        Ok(total)
    }

    async fn snapshot(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<RecordVersion>, DataStoreError> {
        let mut results = self.simple.snapshot(conn, table, params).await?;
        for child in self.children(table) {
            results.extend(self.route(&child).snapshot(conn, &child, params).await?);
        }
        Ok(results)
    }

    async fn find_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<Attributes, DataStoreError> {
        match self.simple.find_by_id(conn, table, id).await {
            Err(e) if e.is_not_found() => {}
            other => return other,
        }
        for child in self.children(table) {
            match self.route(&child).find_by_id(conn, &child, id).await {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(record_not_found(table, id))
    }

    async fn find(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let mut results = self.simple.find(conn, table, params).await?;
        for child in self.children(table) {
            results.extend(self.route(&child).find(conn, &child, params).await?);
        }
        Ok(results)
    }

    async fn update(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        attributes: &Attributes,
    ) -> Result<u64, DataStoreError> {
        let mut total = self.simple.update(conn, table, params, attributes).await?;
        for child in self.children(table) {
            total += self
                .route(&child)
                .update(conn, &child, params, attributes)
                .await?;
        }
        Ok(total)
    }

    async fn update_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
        attributes: &Attributes,
    ) -> Result<(), DataStoreError> {
        match self.simple.update_by_id(conn, table, id, attributes).await {
            Err(e) if e.is_not_found() => {}
            other => return other,
        }
        for child in self.children(table) {
            match self.route(&child).update_by_id(conn, &child, id, attributes).await {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(record_not_found(table, id))
    }

    async fn delete(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<u64, DataStoreError> {
        let mut total = self.simple.delete(conn, table, params).await?;
        for child in self.children(table) {
            total += self.route(&child).delete(conn, &child, params).await?;
        }
        Ok(total)
    }

    async fn delete_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<(), DataStoreError> {
        match self.simple.delete_by_id(conn, table, id).await {
            Err(e) if e.is_not_found() => {}
            other => return other,
        }
        for child in self.children(table) {
            match self.route(&child).delete_by_id(conn, &child, id).await {
                Err(e) if e.is_not_found() => continue,
                other => return other,
            }
        }
        Err(record_not_found(table, id))
    }

    async fn for_each(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        callback: &mut RowCallback<'_>,
    ) -> Result<(), DataStoreError> {
        self.simple.for_each(conn, table, params, callback).await?;
        for child in self.children(table) {
            self.route(&child).for_each(conn, &child, params, callback).await?;
        }
        Ok(())
    }
}

/// Postgres `INHERITS` hierarchies
pub struct PostgresInheritPolicy {
    simple: SimpleDriver,
}

impl PostgresInheritPolicy {
    pub fn new(simple: SimpleDriver) -> Self {
        Self { simple }
    }

    /// `SELECT tableoid::regclass::text AS tablename, id FROM coll ...`
    pub fn locate_statement(
        &self,
        table: &TableDefinition,
        params: &QueryParams,
        trailing: bool,
    ) -> Result<Statement, DataStoreError> {
        let mut builder = CriteriaBuilder::new(
            self.simple.tables(),
            table,
            self.simple.registry(),
            self.simple.dialect(),
            1,
        );
        if trailing {
            builder.build_sql(params)?;
        } else {
            builder.build(params)?;
        }
        let (criteria, args) = builder.into_parts();
        Ok(Statement::new(
            format!(
                "SELECT tableoid::regclass::text AS tablename, {} FROM {}{}",
                table.id().name,
                table.collection_name(),
                criteria
            ),
            args,
        ))
    }

    /// `(concrete table, id)` of every row matched through the parent table
    async fn locate(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        stmt: &Statement,
    ) -> Result<Vec<(Arc<TableDefinition>, i64)>, DataStoreError> {
        crate::debug_log!("[LOCATE] SQL: {}", stmt.sql);
        let rows = conn
            .fetch_rows(stmt, &[ColumnType::String, table.id().column_type])
            .await?;

        let mut located = Vec::with_capacity(rows.len());
        for row in rows {
            let mut values = row.into_iter();
            let collection = values.next().flatten();
            let Some(id) = values.next().flatten().and_then(|v| v.as_i64()) else {
                continue;
            };
            let concrete = match collection {
                Some(SqlValue::Text(name)) => self
                    .simple
                    .tables()
                    .find_by_collection_name(name.trim_matches('"'))
                    .cloned()
                    .ok_or_else(|| {
                        DataStoreError::InternalServerError(format!(
                            "table '{}' is not registered",
                            name
                        ))
                    })?,
                _ => table.clone(),
            };
            located.push((concrete, id));
        }
        Ok(located)
    }
}

#[async_trait]
impl Driver for PostgresInheritPolicy {
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
        self.simple.count(conn, table, params).await
    }

    async fn snapshot(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<RecordVersion>, DataStoreError> {
        self.simple.snapshot(conn, table, params).await
    }

    async fn find_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<Attributes, DataStoreError> {
        let params = QueryParams::new().with(format!("@{}", table.id().name), id.to_string());
        let stmt = self.locate_statement(table, &params, false)?;
        let located = self.locate(conn, table, &stmt).await?;
        match located.into_iter().next() {
            Some((concrete, id)) => self.simple.find_by_id(conn, &concrete, id).await,
            None => Err(record_not_found(table, id)),
        }
    }

    async fn find(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let stmt = self.locate_statement(table, params, true)?;
        let located = self.locate(conn, table, &stmt).await?;
        let mut results = Vec::with_capacity(located.len());
        for (concrete, id) in located {
            match self.simple.find_by_id(conn, &concrete, id).await {
                Ok(result) => results.push(result),
                // removed between the two reads
                Err(e) if e.is_not_found() => continue,
                Err(e) => return Err(e),
            }
        }
        Ok(results)
    }

    async fn update(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        attributes: &Attributes,
    ) -> Result<u64, DataStoreError> {
        self.simple.update(conn, table, params, attributes).await
    }

    async fn update_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
        attributes: &Attributes,
    ) -> Result<(), DataStoreError> {
        self.simple.update_by_id(conn, table, id, attributes).await
    }

    async fn delete(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<u64, DataStoreError> {
        self.simple.delete(conn, table, params).await
    }

    async fn delete_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<(), DataStoreError> {
        self.simple.delete_by_id(conn, table, id).await
    }

    async fn for_each(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        callback: &mut RowCallback<'_>,
    ) -> Result<(), DataStoreError> {
        let stmt = self.locate_statement(table, params, false)?;
        for (concrete, id) in self.locate(conn, table, &stmt).await? {
            callback(&concrete, id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::criteria::OperatorRegistry;
    use table_schema::{ColumnDefinition, TableBuilder, TableDefinitionsBuilder};
    use type_mapping::Dialect;

    fn policy() -> (PostgresInheritPolicy, Arc<TableDefinition>) {
        let tables = TableDefinitionsBuilder::new()
            .table(
                TableBuilder::new("NetworkDevice")
                    .column(ColumnDefinition::new("address", ColumnType::IpAddress)),
            )
            .table(TableBuilder::new("Router").extends("network_device"))
            .build()
            .unwrap();
        let tables = Arc::new(tables);
        let device = tables.get("network_device").unwrap().clone();
        let simple = SimpleDriver::new(
            tables,
            Arc::new(OperatorRegistry::standard()),
            Dialect::Postgres,
            false,
        );
        (PostgresInheritPolicy::new(simple), device)
    }

    #[test]
    fn test_locate_statement_reads_concrete_table() {
        let (policy, device) = policy();
        let params = QueryParams::new()
            .with("@address", "10.0.0.1")
            .with("order", "id")
            .with("limit", "5");
        let stmt = policy.locate_statement(&device, &params, true).unwrap();
        assert_eq!(
            stmt.sql,
            "SELECT tableoid::regclass::text AS tablename, id FROM network_devices WHERE address = $1 ORDER BY id LIMIT 5"
        );
        assert_eq!(stmt.params, vec![SqlValue::Text("10.0.0.1".into())]);
    }
}
