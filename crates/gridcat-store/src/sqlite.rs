//! SQLite executor, for local runs and tests.

use std::str::FromStr;

use gridcat_core::DatabaseConfig;
use serde_json::Value;
use sqlx::query::Query;
use sqlx::sqlite::{SqliteArguments, SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row as _, Sqlite, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::{ExecutionError, StoreError, StoreResult};
use crate::executor::{Backend, ExecuteFuture, QueryExecutor, StatementFuture, redact_url};
use crate::query::{BindParams, BindValue, CompiledQuery};
use crate::row::Row;

/// Pooled SQLite executor.
#[derive(Clone)]
pub struct SqliteExecutor {
    pool: SqlitePool,
}

impl SqliteExecutor {
    /// Open the database named by `config.url`. An in-memory database is
    /// private to its connection, so it is pinned to a single one.
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let connect_err = |e: sqlx::Error| StoreError::Connect {
            url: redact_url(&config.url),
            message: e.to_string(),
        };
        let options = SqliteConnectOptions::from_str(&config.url)
            .map_err(connect_err)?
            .create_if_missing(true);

        let pool_options = if config.url.contains(":memory:") {
            Self::single_connection_options()
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };
        let pool = pool_options
            .acquire_timeout(config.acquire_timeout())
            .connect_with(options)
            .await
            .map_err(connect_err)?;

        Ok(Self { pool })
    }

    /// Create an ephemeral in-memory database (for testing).
    pub async fn in_memory() -> StoreResult<Self> {
        let config = DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            ..DatabaseConfig::default()
        };
        Self::connect(&config).await
    }

    fn single_connection_options() -> SqlitePoolOptions {
        SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
    }
}

impl QueryExecutor for SqliteExecutor {
    fn backend(&self) -> Backend {
        Backend::Sqlite
    }

    fn fetch_all<'a>(
        &'a self,
        query: &'a CompiledQuery,
        params: &'a BindParams,
    ) -> ExecuteFuture<'a> {
        Box::pin(async move {
            let values = query.resolve(params)?;
            let rows = bind_all(sqlx::query(query.sql()), values)
                .fetch_all(&self.pool)
                .await?;
            debug!(rows = rows.len(), "sqlite query complete");
            rows.iter().map(decode_row).collect()
        })
    }

    fn run_statement<'a>(&'a self, sql: &'a str) -> StatementFuture<'a> {
        Box::pin(async move {
            let done = sqlx::query(sql).execute(&self.pool).await?;
            Ok(done.rows_affected())
        })
    }
}

fn bind_all<'q>(
    mut query: Query<'q, Sqlite, SqliteArguments<'q>>,
    values: Vec<BindValue>,
) -> Query<'q, Sqlite, SqliteArguments<'q>> {
    for value in values {
        query = match value {
            BindValue::Text(v) => query.bind(v),
            BindValue::Int(v) => query.bind(v),
            BindValue::Float(v) => query.bind(v),
            BindValue::Bool(v) => query.bind(v),
        };
    }
    query
}

fn decode_row(row: &SqliteRow) -> Result<Row, ExecutionError> {
    let mut out = Row::with_capacity(row.len());
    for (index, column) in row.columns().iter().enumerate() {
        let value = decode_column(row, index).map_err(|e| ExecutionError::Decode {
            column: column.name().to_string(),
            message: e.to_string(),
        })?;
        out.push(column.name(), value);
    }
    Ok(out)
}

/// SQLite is dynamically typed: branch on the storage class of the value
/// itself rather than the declared column type.
fn decode_column(row: &SqliteRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_ascii_uppercase();

    let value = match type_name.as_str() {
        "BOOLEAN" => Value::Bool(row.try_get_unchecked::<bool, _>(index)?),
        name if name.contains("INT") => Value::from(row.try_get_unchecked::<i64, _>(index)?),
        "REAL" | "FLOAT" | "DOUBLE" | "NUMERIC" => {
            Value::from(row.try_get_unchecked::<f64, _>(index)?)
        }
        "BLOB" => Value::String(hex::encode_upper(
            row.try_get_unchecked::<Vec<u8>, _>(index)?,
        )),
        _ => Value::String(row.try_get_unchecked::<String, _>(index)?),
    };
    Ok(value)
}
