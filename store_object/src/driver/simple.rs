//! Flat table driver
//!
//! Generates INSERT/SELECT/UPDATE/DELETE statements for one physical table.
//! Single-table subclasses are narrowed with a discriminator predicate ahead
//! of the caller's own criteria. The statement builders are plain functions
//! of the table definition so they can be checked without a connection.

use super::{expect_one, record_not_found, Attributes, Driver, RecordVersion, RowCallback};
use crate::criteria::{CriteriaBuilder, OperatorRegistry, QueryParams, Statement};
use crate::errors::DataStoreError;
use crate::executor::Executor;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::sync::Arc;
use table_schema::{ColumnDefinition, ColumnType, TableDefinition, TableDefinitions};
use type_mapping::{Dialect, SqlValue, TypeError};

#[derive(Clone)]
pub struct SimpleDriver {
    tables: Arc<TableDefinitions>,
    registry: Arc<OperatorRegistry>,
    dialect: Dialect,
    only: bool,
}

impl SimpleDriver {
    /// `only` restricts reads and writes on a parent table to its own rows
    /// where the dialect has native inheritance.
    pub fn new(
        tables: Arc<TableDefinitions>,
        registry: Arc<OperatorRegistry>,
        dialect: Dialect,
        only: bool,
    ) -> Self {
        Self {
            tables,
            registry,
            dialect,
            only,
        }
    }

    pub fn tables(&self) -> &Arc<TableDefinitions> {
        &self.tables
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn registry(&self) -> &Arc<OperatorRegistry> {
        &self.registry
    }

    fn target(&self, table: &TableDefinition) -> String {
        if self.only && self.dialect.supports_only() && table.is_class_table_inheritance() {
            format!("ONLY {}", table.collection_name())
        } else {
            table.collection_name().to_string()
        }
    }

    fn criteria<'a>(&'a self, table: &'a TableDefinition, start: usize) -> CriteriaBuilder<'a> {
        let mut builder = CriteriaBuilder::new(&self.tables, table, &self.registry, self.dialect, start);
        if table.is_single_table_inheritance() {
            builder.equal_class("type");
        }
        builder
    }

    fn where_clause(
        &self,
        table: &TableDefinition,
        start: usize,
        params: &QueryParams,
        trailing: bool,
    ) -> Result<(String, Vec<SqlValue>), DataStoreError> {
        let mut builder = self.criteria(table, start);
        if trailing {
            builder.build_sql(params)?;
        } else {
            builder.build(params)?;
        }
        Ok(builder.into_parts())
    }

    fn where_id(
        &self,
        table: &TableDefinition,
        start: usize,
        id: i64,
    ) -> (String, Vec<SqlValue>) {
        let mut builder = self.criteria(table, start);
        builder.add_value(&table.id().name, SqlValue::Integer(id));
        builder.into_parts()
    }

    /// Every attribute of the table; a single-table hierarchy also reads
    /// the columns its descendants declare.
    pub fn select_columns<'a>(&'a self, table: &'a TableDefinition) -> Vec<&'a ColumnDefinition> {
        let mut columns: Vec<&ColumnDefinition> = table.attributes().iter().collect();
        if table.is_single_table_inheritance() {
            for descendant in self.tables.descendants_of(table) {
                for column in descendant.own_attributes() {
                    if !columns.iter().any(|c| c.name == column.name) {
                        columns.push(column);
                    }
                }
            }
        }
        columns
    }

    /// The concrete table named by the `type` attribute
    pub fn type_from(
        &self,
        table: &Arc<TableDefinition>,
        attributes: &Attributes,
    ) -> Result<Arc<TableDefinition>, DataStoreError> {
        let name = match attributes.get("type") {
            None | Some(Value::Null) => return Ok(table.clone()),
            Some(Value::String(name)) => name,
            Some(other) => {
                return Err(DataStoreError::Validation(format!(
                    "'type' must is a string, actual value is '{}'.",
                    other
                )))
            }
        };
        if name == table.underscore_name() {
            return Ok(table.clone());
        }

        let concrete = self.tables.find_by_underscore_name(name).ok_or_else(|| {
            DataStoreError::Validation(format!(
                "table '{}' with parent was table '{}' is not exists.",
                name,
                table.underscore_name()
            ))
        })?;
        if !self.tables.is_subclass_of(name, table.underscore_name()) {
            return Err(DataStoreError::Validation(format!(
                "table '{}' is not inherit from table '{}'",
                name,
                table.underscore_name()
            )));
        }
        Ok(concrete.clone())
    }

    // ========================================
    // Statement builders
    // ========================================

    pub fn count_statement(
        &self,
        table: &TableDefinition,
        params: &QueryParams,
    ) -> Result<Statement, DataStoreError> {
        let (criteria, args) = self.where_clause(table, 1, params, false)?;
        Ok(Statement::new(
            format!("SELECT count(*) FROM {}{}", self.target(table), criteria),
            args,
        ))
    }

    pub fn snapshot_statement(
        &self,
        table: &TableDefinition,
        params: &QueryParams,
    ) -> Result<Statement, DataStoreError> {
        let (criteria, args) = self.where_clause(table, 1, params, false)?;
        Ok(Statement::new(
            format!(
                "SELECT {}, created_at, updated_at FROM {}{}",
                table.id().name,
                self.target(table),
                criteria
            ),
            args,
        ))
    }

    fn select_prefix(&self, table: &TableDefinition) -> String {
        let names: Vec<&str> = self
            .select_columns(table)
            .iter()
            .map(|c| c.name.as_str())
            .collect();
        format!("SELECT {} FROM {}", names.join(", "), self.target(table))
    }

    pub fn find_statement(
        &self,
        table: &TableDefinition,
        params: &QueryParams,
    ) -> Result<Statement, DataStoreError> {
        let (criteria, args) = self.where_clause(table, 1, params, true)?;
        Ok(Statement::new(
            format!("{}{}", self.select_prefix(table), criteria),
            args,
        ))
    }

    pub fn find_by_id_statement(&self, table: &TableDefinition, id: i64) -> Statement {
        let (criteria, args) = self.where_id(table, 1, id);
        Statement::new(format!("{}{}", self.select_prefix(table), criteria), args)
    }

    pub fn for_each_statement(
        &self,
        table: &TableDefinition,
        params: &QueryParams,
    ) -> Result<Statement, DataStoreError> {
        let (criteria, args) = self.where_clause(table, 1, params, false)?;
        let columns = if table.is_single_table_inheritance() {
            format!("{}, type", table.id().name)
        } else {
            table.id().name.clone()
        };
        Ok(Statement::new(
            format!("SELECT {} FROM {}{}", columns, self.target(table), criteria),
            args,
        ))
    }

    pub fn insert_statement(
        &self,
        table: &TableDefinition,
        attributes: &Attributes,
        now: DateTime<Utc>,
    ) -> Result<Statement, DataStoreError> {
        if table.is_abstract() {
            return Err(DataStoreError::Validation(format!(
                "table '{}' is abstract.",
                table.name()
            )));
        }

        let mut names = Vec::new();
        let mut args = Vec::new();
        for column in table.attributes() {
            if column.is_serial {
                continue;
            }

            let value = match column.name.as_str() {
                "created_at" | "updated_at" => SqlValue::Timestamp(now),
                "type" if table.is_single_table_inheritance() => {
                    SqlValue::Text(table.underscore_name().to_string())
                }
                _ => {
                    let raw = match attributes.get(&column.name).filter(|v| !v.is_null()) {
                        Some(raw) => raw,
                        None => match &column.default_value {
                            Some(default) => default,
                            None if column.is_required => {
                                return Err(DataStoreError::Validation(format!(
                                    "column '{}' is required.",
                                    column.name
                                )))
                            }
                            None => continue,
                        },
                    };
                    match column.to_internal(raw) {
                        Ok(value) => value,
                        Err(TypeError::Absent) => continue,
                        Err(e) => {
                            return Err(DataStoreError::Validation(format!(
                                "column '{}' is not a '{}', actual value is '{}', {}",
                                column.name, column.column_type, raw, e
                            )))
                        }
                    }
                }
            };
            names.push(column.name.as_str());
            args.push(value);
        }

        let mut sql = if names.is_empty() {
            format!("INSERT INTO {} DEFAULT VALUES", table.collection_name())
        } else {
            let placeholders: Vec<String> = (1..=args.len())
                .map(|idx| self.dialect.placeholder(idx))
                .collect();
            format!(
                "INSERT INTO {}( {} ) VALUES ( {} )",
                table.collection_name(),
                names.join(", "),
                placeholders.join(", ")
            )
        };
        if self.dialect.supports_returning() {
            sql.push_str(" RETURNING ");
            sql.push_str(&table.id().name);
        }
        Ok(Statement::new(sql, args))
    }

    /// `UPDATE coll SET ...` and its arguments
    fn set_clause(
        &self,
        table: &TableDefinition,
        attributes: &Attributes,
        now: DateTime<Utc>,
    ) -> Result<(String, Vec<SqlValue>), DataStoreError> {
        let mut assignments = Vec::new();
        let mut args = Vec::new();
        let mut updated = 0;

        for column in table.attributes() {
            if column.is_serial || column.name == table.id().name {
                continue;
            }
            let supplied = attributes.get(&column.name).filter(|v| !v.is_null());

            let value = match column.name.as_str() {
                "updated_at" => SqlValue::Timestamp(now),
                "created_at" | "type" => {
                    if supplied.is_some() {
                        return Err(DataStoreError::Validation(format!(
                            "column '{}' is readonly.",
                            column.name
                        )));
                    }
                    continue;
                }
                _ => {
                    let Some(raw) = supplied else { continue };
                    if column.is_readonly {
                        return Err(DataStoreError::Validation(format!(
                            "column '{}' is readonly.",
                            column.name
                        )));
                    }
                    match column.to_internal(raw) {
                        Ok(value) => {
                            updated += 1;
                            value
                        }
                        Err(TypeError::Absent) => continue,
                        Err(e) => {
                            return Err(DataStoreError::Validation(format!(
                                "column '{}' is not a '{}', actual value is '{}', {}",
                                column.name, column.column_type, raw, e
                            )))
                        }
                    }
                }
            };

            args.push(value);
            assignments.push(format!(
                "{} = {}",
                column.name,
                self.dialect.placeholder(args.len())
            ));
        }

        if updated == 0 {
            return Err(DataStoreError::Validation("updated attributes is empty.".to_string()));
        }

        Ok((
            format!("UPDATE {} SET {}", self.target(table), assignments.join(", ")),
            args,
        ))
    }

    pub fn update_statement(
        &self,
        table: &TableDefinition,
        params: &QueryParams,
        attributes: &Attributes,
        now: DateTime<Utc>,
    ) -> Result<Statement, DataStoreError> {
        let (mut sql, mut args) = self.set_clause(table, attributes, now)?;
        let (criteria, criteria_args) = self.where_clause(table, args.len() + 1, params, false)?;
        sql.push_str(&criteria);
        args.extend(criteria_args);
        Ok(Statement::new(sql, args))
    }

    pub fn update_by_id_statement(
        &self,
        table: &TableDefinition,
        id: i64,
        attributes: &Attributes,
        now: DateTime<Utc>,
    ) -> Result<Statement, DataStoreError> {
        let (mut sql, mut args) = self.set_clause(table, attributes, now)?;
        let (criteria, criteria_args) = self.where_id(table, args.len() + 1, id);
        sql.push_str(&criteria);
        args.extend(criteria_args);
        Ok(Statement::new(sql, args))
    }

    pub fn delete_statement(
        &self,
        table: &TableDefinition,
        params: &QueryParams,
    ) -> Result<Statement, DataStoreError> {
        let (criteria, args) = self.where_clause(table, 1, params, false)?;
        Ok(Statement::new(
            format!("DELETE FROM {}{}", self.target(table), criteria),
            args,
        ))
    }

    pub fn delete_by_id_statement(&self, table: &TableDefinition, id: i64) -> Statement {
        let (criteria, args) = self.where_id(table, 1, id);
        Statement::new(format!("DELETE FROM {}{}", self.target(table), criteria), args)
    }

    async fn select(
        &self,
        conn: &mut dyn Executor,
        table: &TableDefinition,
        stmt: &Statement,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let columns = self.select_columns(table);
        let types: Vec<ColumnType> = columns.iter().map(|c| c.storage_type()).collect();
        let rows = conn.fetch_rows(stmt, &types).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                columns
                    .iter()
                    .zip(row)
                    .filter_map(|(column, value)| {
                        value.map(|v| (column.name.clone(), column.to_external(&v)))
                    })
                    .collect()
            })
            .collect())
    }
}

fn timestamp_of(value: Option<SqlValue>) -> Option<DateTime<Utc>> {
    match value {
        Some(SqlValue::Timestamp(t)) => Some(t),
        _ => None,
    }
}

#[async_trait]
impl Driver for SimpleDriver {
    async fn insert(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        attributes: &Attributes,
    ) -> Result<i64, DataStoreError> {
        let concrete = self.type_from(table, attributes)?;
        let stmt = self.insert_statement(&concrete, attributes, Utc::now())?;
        crate::debug_log!("[INSERT] SQL: {}", stmt.sql);
        conn.insert(&stmt).await
    }

    async fn count(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<i64, DataStoreError> {
        let stmt = self.count_statement(table, params)?;
        crate::debug_log!("[COUNT] SQL: {}", stmt.sql);
        conn.fetch_count(&stmt).await
    }

    async fn snapshot(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<RecordVersion>, DataStoreError> {
        let stmt = self.snapshot_statement(table, params)?;
        crate::debug_log!("[SNAPSHOT] SQL: {}", stmt.sql);
        let types = [table.id().column_type, ColumnType::DateTime, ColumnType::DateTime];
        let rows = conn.fetch_rows(&stmt, &types).await?;

        Ok(rows
            .into_iter()
            .filter_map(|row| {
                let mut values = row.into_iter();
                let id = values.next().flatten().and_then(|v| v.as_i64())?;
                Some(RecordVersion {
                    id,
                    created_at: timestamp_of(values.next().flatten()),
                    updated_at: timestamp_of(values.next().flatten()),
                })
            })
            .collect())
    }

    async fn find_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<Attributes, DataStoreError> {
        let stmt = self.find_by_id_statement(table, id);
        crate::debug_log!("[FIND_BY_ID] SQL: {}", stmt.sql);
        self.select(conn, table, &stmt)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| record_not_found(table, id))
    }

    async fn find(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<Vec<Attributes>, DataStoreError> {
        let stmt = self.find_statement(table, params)?;
        crate::debug_log!("[FIND] SQL: {}", stmt.sql);
        self.select(conn, table, &stmt).await
    }

    async fn update(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        attributes: &Attributes,
    ) -> Result<u64, DataStoreError> {
        let stmt = self.update_statement(table, params, attributes, Utc::now())?;
        crate::debug_log!("[UPDATE] SQL: {}", stmt.sql);
        conn.execute(&stmt).await
    }

    async fn update_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
        attributes: &Attributes,
    ) -> Result<(), DataStoreError> {
        let stmt = self.update_by_id_statement(table, id, attributes, Utc::now())?;
        crate::debug_log!("[UPDATE_BY_ID] SQL: {}", stmt.sql);
        let affected = conn.execute(&stmt).await?;
        expect_one(affected, table, id)
    }

    async fn delete(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
    ) -> Result<u64, DataStoreError> {
        let stmt = self.delete_statement(table, params)?;
        crate::debug_log!("[DELETE] SQL: {}", stmt.sql);
        conn.execute(&stmt).await
    }

    async fn delete_by_id(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        id: i64,
    ) -> Result<(), DataStoreError> {
        let stmt = self.delete_by_id_statement(table, id);
        crate::debug_log!("[DELETE_BY_ID] SQL: {}", stmt.sql);
        let affected = conn.execute(&stmt).await?;
        expect_one(affected, table, id)
    }

    async fn for_each(
        &self,
        conn: &mut dyn Executor,
        table: &Arc<TableDefinition>,
        params: &QueryParams,
        callback: &mut RowCallback<'_>,
    ) -> Result<(), DataStoreError> {
        let stmt = self.for_each_statement(table, params)?;
        crate::trace_log!("[FOR_EACH] SQL: {}", stmt.sql);
        let types = [table.id().column_type, ColumnType::String];
        let width = if table.is_single_table_inheritance() { 2 } else { 1 };
        let rows = conn.fetch_rows(&stmt, &types[..width]).await?;

        for row in rows {
            let mut values = row.into_iter();
            let Some(id) = values.next().flatten().and_then(|v| v.as_i64()) else {
                continue;
            };
            let concrete = match values.next().flatten() {
                Some(SqlValue::Text(name)) => self
                    .tables
                    .find_by_underscore_name(&name)
                    .unwrap_or(table),
                _ => table,
            };
            callback(concrete, id)?;
        }
        Ok(())
    }
}
