//! PostgreSQL binding of the database capability, via sqlx
//!
//! Binds [`DbValue`] parameters, decodes `PgRow`s by column type, and fills
//! [`DriverError`] with the SQLSTATE/constraint/table details the error
//! translator keys off.

use async_trait::async_trait;
use sqlx::postgres::{PgArguments, PgPoolOptions, PgRow};
use sqlx::{Column, Pool, Postgres, Row as SqlxRow, TypeInfo};
use tokio::sync::Mutex;

use crate::database::{Database, DriverError, Row, TransactionScope};
use crate::value::DbValue;

/// The sqlx-backed capability over a Postgres pool.
pub struct PostgresDatabase {
    pool: Pool<Postgres>,
}

impl PostgresDatabase {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    /// Connect a pool with the given connection limit.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, DriverError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(driver_error)?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl Database for PostgresDatabase {
    async fn query(&self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>, DriverError> {
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&self.pool)
            .await
            .map_err(driver_error)?;
        rows.iter().map(decode_pg_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, DriverError> {
        let result = bind_params(sqlx::query(sql), params)
            .execute(&self.pool)
            .await
            .map_err(driver_error)?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DriverError> {
        let tx = self.pool.begin().await.map_err(driver_error)?;
        Ok(Box::new(PostgresTransaction {
            tx: Mutex::new(tx),
        }))
    }
}

/// One transaction over a pooled connection. Statements run behind a mutex
/// because sqlx transactions take `&mut self` while the capability is shared.
pub struct PostgresTransaction {
    tx: Mutex<sqlx::Transaction<'static, Postgres>>,
}

#[async_trait]
impl Database for PostgresTransaction {
    async fn query(&self, sql: &str, params: &[DbValue]) -> Result<Vec<Row>, DriverError> {
        let mut tx = self.tx.lock().await;
        let rows = bind_params(sqlx::query(sql), params)
            .fetch_all(&mut **tx)
            .await
            .map_err(driver_error)?;
        rows.iter().map(decode_pg_row).collect()
    }

    async fn execute(&self, sql: &str, params: &[DbValue]) -> Result<u64, DriverError> {
        let mut tx = self.tx.lock().await;
        let result = bind_params(sqlx::query(sql), params)
            .execute(&mut **tx)
            .await
            .map_err(driver_error)?;
        Ok(result.rows_affected())
    }

    async fn begin(&self) -> Result<Box<dyn TransactionScope>, DriverError> {
        Err(DriverError::message(
            "nested transactions are not supported",
        ))
    }
}

#[async_trait]
impl TransactionScope for PostgresTransaction {
    fn as_database(&self) -> &dyn Database {
        self
    }

    async fn commit(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.into_inner().commit().await.map_err(driver_error)
    }

    async fn rollback(self: Box<Self>) -> Result<(), DriverError> {
        self.tx.into_inner().rollback().await.map_err(driver_error)
    }
}

fn bind_params<'q>(
    mut query: sqlx::query::Query<'q, Postgres, PgArguments>,
    params: &'q [DbValue],
) -> sqlx::query::Query<'q, Postgres, PgArguments> {
    for param in params {
        query = match param {
            DbValue::Null => query.bind(None::<String>),
            DbValue::Bool(v) => query.bind(*v),
            DbValue::Int(v) => query.bind(*v),
            DbValue::Float(v) => query.bind(*v),
            DbValue::Text(v) => query.bind(v.as_str()),
            DbValue::Uuid(v) => query.bind(*v),
            DbValue::Date(v) => query.bind(*v),
            DbValue::DateTime(v) => query.bind(*v),
            DbValue::Json(v) => query.bind(sqlx::types::Json(v.clone())),
        };
    }
    query
}

fn decode_pg_row(row: &PgRow) -> Result<Row, DriverError> {
    let mut columns = Vec::with_capacity(row.columns().len());
    for column in row.columns() {
        let index = column.ordinal();
        let value = decode_pg_value(row, index, column.type_info().name())?;
        columns.push((column.name().to_string(), value));
    }
    Ok(Row::new(columns))
}

fn decode_pg_value(row: &PgRow, index: usize, type_name: &str) -> Result<DbValue, DriverError> {
    let value = match type_name {
        "BOOL" => row
            .try_get::<Option<bool>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, DbValue::Bool),
        "INT2" => row
            .try_get::<Option<i16>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, |v| DbValue::Int(i64::from(v))),
        "INT4" => row
            .try_get::<Option<i32>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, |v| DbValue::Int(i64::from(v))),
        "INT8" => row
            .try_get::<Option<i64>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, DbValue::Int),
        "FLOAT4" => row
            .try_get::<Option<f32>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, |v| DbValue::Float(f64::from(v))),
        "FLOAT8" => row
            .try_get::<Option<f64>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, DbValue::Float),
        "UUID" => row
            .try_get::<Option<uuid::Uuid>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, DbValue::Uuid),
        "DATE" => row
            .try_get::<Option<chrono::NaiveDate>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, DbValue::Date),
        "TIMESTAMPTZ" => row
            .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, DbValue::DateTime),
        "TIMESTAMP" => row
            .try_get::<Option<chrono::NaiveDateTime>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, |v| {
                DbValue::DateTime(chrono::DateTime::from_naive_utc_and_offset(v, chrono::Utc))
            }),
        "JSON" | "JSONB" => row
            .try_get::<Option<sqlx::types::Json<serde_json::Value>>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, |v| DbValue::Json(v.0)),
        _ => row
            .try_get::<Option<String>, _>(index)
            .map_err(driver_error)?
            .map_or(DbValue::Null, DbValue::Text),
    };
    Ok(value)
}

fn driver_error(err: sqlx::Error) -> DriverError {
    match &err {
        sqlx::Error::Database(db_err) => DriverError {
            code: db_err.code().map(|code| code.to_string()),
            message: db_err.message().to_string(),
            constraint: db_err.constraint().map(str::to_string),
            table: db_err.table().map(str::to_string),
        },
        other => DriverError::message(other.to_string()),
    }
}
