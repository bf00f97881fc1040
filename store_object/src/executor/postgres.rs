use super::{Executor, Row};
use crate::criteria::Statement;
use crate::errors::DataStoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::postgres::{PgConnection, PgRow};
use sqlx::{Connection, Row as _};
use type_mapping::{ColumnType, Dialect, SqlValue};

pub struct PgExecutor {
    conn: PgConnection,
}

impl PgExecutor {
    pub async fn connect(url: &str) -> Result<Self, DataStoreError> {
        let conn = PgConnection::connect(url).await?;
        Ok(Self { conn })
    }

    pub fn from_connection(conn: PgConnection) -> Self {
        Self { conn }
    }
}

fn decode_integer(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
    if let Ok(v) = row.try_get::<Option<i64>, _>(idx) {
        return Ok(v.map(SqlValue::Integer));
    }
    if let Ok(v) = row.try_get::<Option<i32>, _>(idx) {
        return Ok(v.map(|i| SqlValue::Integer(i64::from(i))));
    }
    let v = row.try_get::<Option<i16>, _>(idx)?;
    Ok(v.map(|i| SqlValue::Integer(i64::from(i))))
}

fn decode_decimal(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
    if let Ok(v) = row.try_get::<Option<f64>, _>(idx) {
        return Ok(v.map(SqlValue::Decimal));
    }
    let v = row.try_get::<Option<f32>, _>(idx)?;
    Ok(v.map(|f| SqlValue::Decimal(f64::from(f))))
}

fn decode_timestamp(row: &PgRow, idx: usize) -> Result<Option<SqlValue>, sqlx::Error> {
    if let Ok(v) = row.try_get::<Option<DateTime<Utc>>, _>(idx) {
        return Ok(v.map(SqlValue::Timestamp));
    }
    let v = row.try_get::<Option<NaiveDateTime>, _>(idx)?;
    Ok(v.map(|t| SqlValue::Timestamp(t.and_utc())))
}

fn decode(row: &PgRow, idx: usize, column_type: ColumnType) -> Result<Option<SqlValue>, sqlx::Error> {
    match column_type {
        ColumnType::ObjectId | ColumnType::Integer => decode_integer(row, idx),
        ColumnType::Decimal => decode_decimal(row, idx),
        ColumnType::Boolean => Ok(row.try_get::<Option<bool>, _>(idx)?.map(SqlValue::Boolean)),
        ColumnType::DateTime => decode_timestamp(row, idx),
        ColumnType::String | ColumnType::IpAddress | ColumnType::PhysicalAddress => {
            Ok(row.try_get::<Option<String>, _>(idx)?.map(SqlValue::Text))
        }
    }
}

#[async_trait]
impl Executor for PgExecutor {
    fn dialect(&self) -> Dialect {
        Dialect::Postgres
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
        Ok(decode_integer(&row, 0)?.and_then(|v| v.as_i64()).unwrap_or(0))
    }

    async fn execute(&mut self, stmt: &Statement) -> Result<u64, DataStoreError> {
        let result = bind_all!(sqlx::query(&stmt.sql), &stmt.params)
            .execute(&mut self.conn)
            .await?;
        Ok(result.rows_affected())
    }

    async fn insert(&mut self, stmt: &Statement) -> Result<i64, DataStoreError> {
        let row = bind_all!(sqlx::query(&stmt.sql), &stmt.params)
            .fetch_one(&mut self.conn)
            .await?;
        decode_integer(&row, 0)?
            .and_then(|v| v.as_i64())
            .ok_or_else(|| DataStoreError::InternalServerError("insert returned a null id".to_string()))
    }

    async fn close(self: Box<Self>) -> Result<(), DataStoreError> {
        self.conn.close().await?;
        Ok(())
    }
}
