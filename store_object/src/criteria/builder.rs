//! Where-clause builder
//!
//! One builder per statement. Predicates are appended to a text buffer while
//! their arguments are collected in emission order; the placeholder counter
//! starts at the index given by the caller so `SET` arguments can come first.

use crate::criteria::operators::{Operator, OperatorRegistry};
use crate::criteria::params::{split, QueryParams};
use crate::errors::DataStoreError;
use table_schema::validation::{validate_column_list, validate_expression};
use table_schema::{ColumnDefinition, TableDefinition, TableDefinitions};
use type_mapping::dialect::quote_literal;
use type_mapping::{Dialect, SqlValue};

/// SQL text with its positional arguments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<SqlValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<SqlValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

pub struct CriteriaBuilder<'a> {
    tables: &'a TableDefinitions,
    table: &'a TableDefinition,
    registry: &'a OperatorRegistry,
    dialect: Dialect,
    prefix: &'a str,
    buffer: String,
    is_first: bool,
    idx: usize,
    params: Vec<SqlValue>,
}

impl<'a> CriteriaBuilder<'a> {
    pub fn new(
        tables: &'a TableDefinitions,
        table: &'a TableDefinition,
        registry: &'a OperatorRegistry,
        dialect: Dialect,
        start_index: usize,
    ) -> Self {
        Self {
            tables,
            table,
            registry,
            dialect,
            prefix: " WHERE",
            buffer: String::new(),
            is_first: true,
            idx: start_index,
            params: Vec::new(),
        }
    }

    /// Text written before the first predicate, ` WHERE` by default
    pub fn with_prefix(mut self, prefix: &'a str) -> Self {
        self.prefix = prefix;
        self
    }

    /// Index the next placeholder will get
    pub fn next_index(&self) -> usize {
        self.idx
    }

    pub fn sql(&self) -> &str {
        &self.buffer
    }

    pub fn params(&self) -> &[SqlValue] {
        &self.params
    }

    pub fn into_parts(self) -> (String, Vec<SqlValue>) {
        (self.buffer, self.params)
    }

    fn placeholder(&mut self) -> String {
        let placeholder = self.dialect.placeholder(self.idx);
        self.idx += 1;
        placeholder
    }

    fn append(&mut self, predicate: &str) {
        if self.is_first {
            self.is_first = false;
            self.buffer.push_str(self.prefix);
            self.buffer.push(' ');
        } else {
            self.buffer.push_str(" AND ");
        }
        self.buffer.push_str(predicate);
    }

    fn parse(&self, column: &ColumnDefinition, raw: &str) -> Result<SqlValue, DataStoreError> {
        column.parse(raw).map_err(|e| {
            DataStoreError::Validation(format!(
                "column '{}' convert '{}' to '{}' failed, {}",
                column.name, raw, column.column_type, e
            ))
        })
    }

    /// `column = $n` with a ready value
    pub fn add_value(&mut self, column: &str, value: SqlValue) {
        let placeholder = self.placeholder();
        self.append(&format!("{} = {}", column, placeholder));
        self.params.push(value);
    }

    /// Narrow a single-table-inheritance subclass to its own rows
    pub fn equal_class(&mut self, column: &str) {
        if !self.table.is_single_table_inheritance() || self.table.super_table().is_none() {
            return;
        }
        let table = self.table;
        self.equals_table(column, &[table]);
    }

    fn equals_table(&mut self, column: &str, tables: &[&TableDefinition]) {
        let mut names: Vec<&str> = Vec::new();
        for table in tables {
            for name in std::iter::once(table.underscore_name())
                .chain(table.descendants().iter().map(String::as_str))
            {
                if !names.contains(&name) {
                    names.push(name);
                }
            }
        }

        let predicate = match names.as_slice() {
            [only] => format!("{} = {}", column, quote_literal(only)),
            _ => format!(
                "{} IN ( {} )",
                column,
                names.iter().map(|n| quote_literal(n)).collect::<Vec<_>>().join(", ")
            ),
        };
        self.append(&predicate);
    }

    fn resolve_tables(&self, column: &ColumnDefinition, raw: &str) -> Result<Vec<&'a TableDefinition>, DataStoreError> {
        let tables = self.tables;
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|name| {
                tables
                    .find_by_underscore_name(name)
                    .map(|t| &**t)
                    .ok_or_else(|| {
                        DataStoreError::Validation(format!(
                            "table '{}' is undefined for column '{}'.",
                            name, column.name
                        ))
                    })
            })
            .collect()
    }

    fn in_list(&mut self, column: &ColumnDefinition, raw: &str, negate: bool) -> Result<(), DataStoreError> {
        let keyword = if negate { "NOT IN" } else { "IN" };
        if raw.is_empty() {
            return Err(DataStoreError::Validation(format!(
                "'{}' requires at least one value for the column '{}'",
                keyword.to_lowercase(),
                column.name
            )));
        }

        let list = if column.column_type.is_textual() {
            raw.split(',').map(quote_literal).collect::<Vec<_>>().join(", ")
        } else if column.column_type.is_numeric() {
            let items: Vec<&str> = raw.split(',').map(str::trim).collect();
            for item in &items {
                self.parse(column, item)?;
            }
            items.join(",")
        } else {
            return Err(DataStoreError::UnsupportedOperator(format!(
                "'{}' is not supported for the column '{}'",
                keyword.to_lowercase(),
                column.name
            )));
        };

        self.append(&format!("{} {} ( {} )", column.name, keyword, list));
        Ok(())
    }

    fn between(&mut self, column: &ColumnDefinition, raw: &str) -> Result<(), DataStoreError> {
        let values: Vec<&str> = raw.splitn(3, ',').collect();
        let (low, high) = match values.as_slice() {
            [low, high] if !low.is_empty() && !high.is_empty() => (*low, *high),
            _ => {
                return Err(DataStoreError::Validation(format!(
                    "column '{}' syntex error, it must has two value - '{}'",
                    column.name, raw
                )))
            }
        };
        let low = self.parse(column, low)?;
        let high = self.parse(column, high)?;

        let first = self.placeholder();
        let second = self.placeholder();
        self.append(&format!("({} BETWEEN {} AND {})", column.name, first, second));
        self.params.push(low);
        self.params.push(high);
        Ok(())
    }

    fn is(&mut self, column: &ColumnDefinition, raw: &str) -> Result<(), DataStoreError> {
        let test = match raw.to_ascii_lowercase().as_str() {
            "null" => "IS NULL",
            "notnull" => "IS NOT NULL",
            "true" => "IS TRUE",
            "false" => "IS FALSE",
            _ => {
                return Err(DataStoreError::Validation(format!(
                    "'is' is not supported with value '{}' for the column '{}'",
                    raw, column.name
                )))
            }
        };
        self.append(&format!("{} {}", column.name, test));
        Ok(())
    }

    fn apply(&mut self, column: &ColumnDefinition, operator: Operator, raw: &str) -> Result<(), DataStoreError> {
        match operator {
            Operator::Compare(comparison) => {
                let value = self.parse(column, raw)?;
                let placeholder = self.placeholder();
                self.append(&format!("{} {} {}", column.name, comparison.sql(), placeholder));
                self.params.push(value);
                Ok(())
            }
            Operator::In => self.in_list(column, raw, false),
            Operator::NotIn => self.in_list(column, raw, true),
            Operator::Between => self.between(column, raw),
            Operator::Is => self.is(column, raw),
            Operator::Like => {
                if !column.column_type.is_textual() {
                    return Err(DataStoreError::UnsupportedOperator(format!(
                        "'like' is not supported for the column '{}', it must is a string type",
                        column.name
                    )));
                }
                let placeholder = self.placeholder();
                self.append(&format!("{} LIKE {}", column.name, placeholder));
                self.params.push(SqlValue::Text(raw.to_string()));
                Ok(())
            }
            Operator::Exists => Err(DataStoreError::UnsupportedOperator(format!(
                "'exists' is not implemented for the column '{}'",
                column.name
            ))),
            Operator::EqualsClass => {
                let tables = self.resolve_tables(column, raw)?;
                match tables.as_slice() {
                    [table] => {
                        self.equals_table(&column.name, &[*table]);
                        Ok(())
                    }
                    _ => Err(DataStoreError::Validation(format!(
                        "column '{}' expects exactly one table name, got '{}'",
                        column.name, raw
                    ))),
                }
            }
            Operator::InClass => {
                let tables = self.resolve_tables(column, raw)?;
                if tables.is_empty() {
                    return Err(DataStoreError::Validation(format!(
                        "'in' requires at least one value for the column '{}'",
                        column.name
                    )));
                }
                self.equals_table(&column.name, &tables);
                Ok(())
            }
        }
    }

    /// Compile every `@column` predicate
    pub fn build(&mut self, params: &QueryParams) -> Result<(), DataStoreError> {
        let table = self.table;
        for (name, exp) in params.predicates() {
            let column = table.attribute(name).ok_or_else(|| {
                DataStoreError::Validation(format!(
                    "column '{}' is not exists in the {}.",
                    name,
                    table.name()
                ))
            })?;

            let (op, value) = split(exp);
            let operator = self.registry.lookup(&column.name, op).ok_or_else(|| {
                DataStoreError::UnsupportedOperator(format!(
                    "'{}' is unsupported operator for the column '{}'.",
                    op, name
                ))
            })?;
            self.apply(column, operator, value)?;
        }
        Ok(())
    }

    /// Predicates followed by grouping, ordering and paging clauses
    pub fn build_sql(&mut self, params: &QueryParams) -> Result<(), DataStoreError> {
        self.build(params)?;

        let invalid = |e: table_schema::validation::ValidationError| DataStoreError::Validation(e.to_string());

        if let Some(group_by) = params.single("group_by")? {
            if group_by.is_empty() {
                return Err(DataStoreError::Validation("group_by is empty.".to_string()));
            }
            validate_column_list(group_by).map_err(invalid)?;
            self.buffer.push_str(" GROUP BY ");
            self.buffer.push_str(group_by);
        }

        if let Some(having) = params.single("having")? {
            if having.is_empty() {
                return Err(DataStoreError::Validation("having is empty.".to_string()));
            }
            validate_expression(having).map_err(invalid)?;
            self.buffer.push_str(" HAVING ");
            self.buffer.push_str(having);
        }

        if let Some(order) = params.single("order")? {
            if order.is_empty() {
                return Err(DataStoreError::Validation("order is empty.".to_string()));
            }
            validate_column_list(order).map_err(invalid)?;
            self.buffer.push_str(" ORDER BY ");
            self.buffer.push_str(order);
        }

        if let Some(limit) = params.single("limit")? {
            let limit: i64 = limit.trim().parse().map_err(|_| {
                DataStoreError::Validation(format!(
                    "limit is not a number, actual value is '{}'",
                    limit
                ))
            })?;
            if limit <= 0 {
                return Err(DataStoreError::Validation(format!(
                    "limit must is geater zero, actual value is '{}'",
                    limit
                )));
            }

            let offset = match params.single("offset")? {
                Some(offset) => {
                    let parsed: i64 = offset.trim().parse().map_err(|_| {
                        DataStoreError::Validation(format!(
                            "offset is not a number, actual value is '{}'",
                            offset
                        ))
                    })?;
                    if parsed < 0 {
                        return Err(DataStoreError::Validation(format!(
                            "offset must is geater(or equals) zero, actual value is '{}'",
                            offset
                        )));
                    }
                    Some(parsed)
                }
                None => None,
            };
            self.buffer.push_str(&self.dialect.render_limit_offset(limit, offset));
        }
        Ok(())
    }
}
