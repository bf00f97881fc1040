use super::{Executor, Row};
use crate::criteria::Statement;
use crate::errors::DataStoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::sqlite::{SqliteConnection, SqliteRow};
use sqlx::{Connection, Row as _};
use type_mapping::validate::parse_datetime;
use type_mapping::{ColumnType, Dialect, SqlValue};

pub struct SqliteExecutor {
    conn: SqliteConnection,
}

impl SqliteExecutor {
    pub async fn connect(url: &str) -> Result<Self, DataStoreError> {
        let conn = SqliteConnection::connect(url).await?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: SqliteConnection) -> Self {
        Self { conn }
    }
}

// Timestamps written by other tools may be stored in any textual layout
fn decode_timestamp(row: &SqliteRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        return Ok(v.map(SqlValue::Timestamp));
    }
    if let Ok(v) = row.try_get::<Option<NaiveDateTime>, _>(idx) {
        return Ok(v.map(|t| SqlValue::Timestamp(t.and_utc())));
    }
    let v = row.try_get::<Option<String>, _>(idx)?;
    Ok(v.map(|s| match parse_datetime(&s) {
        Some(t) => SqlValue::Timestamp(t),
        None => SqlValue::Text(s),
    }))
}

fn decode(row: &SqliteRow, idx: usize, column_type: ColumnType) -> Result<Option<SqlValue>, sqlx::Error> {
    match column_type {
        ColumnType::ObjectId | ColumnType::Integer => {
            Ok(row.try_get::<Option<i64>, _>(idx)?.map(SqlValue::Integer))
        }
        ColumnType::Decimal => Ok(row.try_get::<Option<f64>, _>(idx)?.map(SqlValue::Decimal)),
        ColumnType::Boolean => Ok(row.try_get::<Option<bool>, _>(idx)?.map(SqlValue::Boolean)),
        ColumnType::DateTime => decode_timestamp(row, idx),
        ColumnType::String | ColumnType::IpAddress | ColumnType::PhysicalAddress => {
            Ok(row.try_get::<Option<String>, _>(idx)?.map(SqlValue::Text))
        }
    }
}

#[async_trait]
impl Executor for SqliteExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Sqlite
    }

    async fn fetch_rows(
        &mut self,
        stmt: &Statement,
        columns: &[ColumnType],
    ) -> Result<Vec<Row>, DataStoreError> {
        let rows = bind_all!(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_all(&mut self.conn)
            .await?;

        rows.iter()
            .map(|row| {
                columns
                    .iter()
                    .enumerate()
                    .map(|(idx, column_type)| decode(row, idx, *column_type))
                    .collect::<Result<Row, _>>()
                    .map_err(DataStoreError::from)
            })
            .collect()
    }

    async fn fetch_count(&mut self, stmt: &Statement) -> Result<i64, DataStoreError> {
        let row = bind_all!(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_one(&mut self.conn)
            .await?;
        Ok(row.try_get::<Option<i64>, _>(0)?.unwrap_or(0))
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DataStoreError> {
        let result = bind_all!(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&mut self, stmt: &Statement) -> Result<i64, DataStoreError> {
        let result = bind_all!(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut self.conn)
            .await?;
        if result.rows_affected() != 1 {
            return Err(DataStoreError::InternalServerError(format!(
                "insert failed, affected rows is {}",
                result.rows_affected()
            )));
        }
        Ok(result.last_insert_rowid())
    }

    async fn close(self: Box<Self>) -> Result<(), DataStoreError> {
        self.conn.close().await?;
        Ok(())
    }
}
