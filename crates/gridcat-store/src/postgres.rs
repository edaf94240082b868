//! PostgreSQL / PostGIS executor.

use std::fmt::Write;

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use gridcat_core::DatabaseConfig;
use serde_json::Value;
use sqlx::postgres::{PgArguments, PgPool, PgPoolOptions, PgRow};
use sqlx::query::Query;
use sqlx::types::Json;
use sqlx::{Column, Postgres, Row as _, TypeInfo, ValueRef};
use tracing::debug;

use crate::error::{ExecutionError, StoreError, StoreResult};
use crate::executor::{Backend, ExecuteFuture, QueryExecutor, StatementFuture, redact_url};
use crate::query::{BindParams, BindValue, CompiledQuery};
use crate::row::Row;

const NUMERIC_NEG: u16 = 0x4000;
const NUMERIC_NAN: u16 = 0xC000;
const NUMERIC_PINF: u16 = 0xD000;
const NUMERIC_NINF: u16 = 0xF000;

/// Pooled PostgreSQL executor.
#[derive(Clone)]
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub async fn connect(config: &DatabaseConfig) -> StoreResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(config.acquire_timeout())
            .connect(&config.url)
            .await
            .map_err(|e| StoreError::Connect {
                url: redact_url(&config.url),
                message: e.to_string(),
            })?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl QueryExecutor for PgExecutor {
    fn backend(&self) -> Backend {
        Backend::Postgres
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
            debug!(rows = rows.len(), "postgres query complete");
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

fn bind_all(
    mut query: Query<'_, Postgres, PgArguments>,
    values: Vec<BindValue>,
) -> Query<'_, Postgres, PgArguments> {
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

fn decode_row(row: &PgRow) -> Result<Row, ExecutionError> {
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

fn decode_column(row: &PgRow, index: usize) -> Result<Value, sqlx::Error> {
    let raw = row.try_get_raw(index)?;
    if raw.is_null() {
        return Ok(Value::Null);
    }
    let type_name = raw.type_info().name().to_string();

    let value = match type_name.as_str() {
        "BOOL" => Value::Bool(row.try_get::<bool, _>(index)?),
        "INT2" => Value::from(row.try_get::<i16, _>(index)?),
        "INT4" => Value::from(row.try_get::<i32, _>(index)?),
        "INT8" => Value::from(row.try_get::<i64, _>(index)?),
        "FLOAT4" => Value::from(f64::from(row.try_get::<f32, _>(index)?)),
        "FLOAT8" => Value::from(row.try_get::<f64, _>(index)?),
        "NUMERIC" => {
            let bytes = row.try_get_unchecked::<Vec<u8>, _>(index)?;
            numeric_to_json(&bytes).map_err(|e| sqlx::Error::Decode(e.into()))?
        }
        "TEXT" | "VARCHAR" | "BPCHAR" | "NAME" => Value::String(row.try_get::<String, _>(index)?),
        "JSON" | "JSONB" => row.try_get::<Json<Value>, _>(index)?.0,
        "TIMESTAMPTZ" => Value::String(row.try_get::<DateTime<Utc>, _>(index)?.to_rfc3339()),
        "TIMESTAMP" => Value::String(
            row.try_get::<NaiveDateTime, _>(index)?
                .format("%Y-%m-%dT%H:%M:%S%.f")
                .to_string(),
        ),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(row.try_get::<NaiveTime, _>(index)?.to_string()),
        "UUID" => Value::String(row.try_get::<uuid::Uuid, _>(index)?.to_string()),
        // geometry and anything else: hex of the binary wire form (EWKB for PostGIS).
        _ => Value::String(hex::encode_upper(
            row.try_get_unchecked::<Vec<u8>, _>(index)?,
        )),
    };
    Ok(value)
}

/// Decode the binary NUMERIC wire format into a JSON number.
///
/// Layout: `ndigits`, `weight`, `sign`, `dscale` (all 16-bit big endian)
/// followed by `ndigits` base-10000 digits. NaN and infinities map to null.
/// The decimal text is kept as written, so no digit is lost to `f64`.
fn numeric_to_json(bytes: &[u8]) -> Result<Value, String> {
    let read = |at: usize| -> Result<u16, String> {
        bytes
            .get(at..at + 2)
            .map(|b| u16::from_be_bytes([b[0], b[1]]))
            .ok_or_else(|| "truncated NUMERIC value".to_string())
    };

    let ndigits = usize::from(read(0)?);
    let weight = i32::from(read(2)? as i16);
    let sign = read(4)?;
    let dscale = usize::from(read(6)?);

    if matches!(sign, NUMERIC_NAN | NUMERIC_PINF | NUMERIC_NINF) {
        return Ok(Value::Null);
    }

    let digits = (0..ndigits)
        .map(|k| read(8 + 2 * k))
        .collect::<Result<Vec<_>, _>>()?;
    let digit = |pos: i32| -> u16 {
        usize::try_from(pos)
            .ok()
            .and_then(|p| digits.get(p).copied())
            .unwrap_or(0)
    };

    let mut text = String::new();
    if sign == NUMERIC_NEG {
        text.push('-');
    }
    if weight < 0 {
        text.push('0');
    } else {
        for pos in 0..=weight {
            let _ = if pos == 0 {
                write!(text, "{}", digit(pos))
            } else {
                write!(text, "{:04}", digit(pos))
            };
        }
    }
    if dscale > 0 {
        let mut fraction = String::with_capacity(dscale + 4);
        let mut pos = weight + 1;
        while fraction.len() < dscale {
            let _ = write!(fraction, "{:04}", digit(pos));
            pos += 1;
        }
        fraction.truncate(dscale);
        text.push('.');
        text.push_str(&fraction);
    }

    text.parse::<serde_json::Number>()
        .map(Value::Number)
        .map_err(|e| format!("NUMERIC {text}: {e}"))
}
