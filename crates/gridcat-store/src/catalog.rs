//! Entity catalog — CRUD over the network tables.
//!
//! Every operation goes through the same [`QueryExecutor`] used by the
//! dynamic query endpoints. Statements are compiled once per kind when the
//! catalog is built. Geometry is written from WKT and read back as a
//! GeoJSON object.

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::entities::{EntityKind, EntityPayload, GeometryKind};
use crate::error::ExecutionError;
use crate::executor::QueryExecutor;
use crate::query::{BindParams, CompiledQuery};
use crate::row::Row;

pub const SRID: u32 = 4326;
pub const DEFAULT_LIMIT: i64 = 100;
pub const MAX_LIMIT: i64 = 1000;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("{0}")]
    Validation(String),

    #[error(transparent)]
    Execution(#[from] ExecutionError),
}

/// `skip`/`limit` window for list operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Deserialize)]
#[serde(default)]
pub struct Page {
    pub skip: i64,
    pub limit: i64,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl Page {
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.skip < 0 {
            return Err(CatalogError::Validation("skip must be >= 0".to_string()));
        }
        if !(1..=MAX_LIMIT).contains(&self.limit) {
            return Err(CatalogError::Validation(format!(
                "limit must be between 1 and {MAX_LIMIT}"
            )));
        }
        Ok(())
    }
}

/// Compiled statements for one entity kind.
#[derive(Debug, Clone)]
struct Statements {
    insert: CompiledQuery,
    select_one: CompiledQuery,
    select_page: CompiledQuery,
    update: CompiledQuery,
    delete: CompiledQuery,
}

impl Statements {
    fn build(kind: EntityKind) -> Self {
        let table = kind.table();
        let id = kind.id_column();
        let columns = kind.columns();
        let returning = select_list(kind);
        let geom_from_wkt = format!("ST_GeomFromText(:geom, {SRID})");

        let insert = format!(
            "INSERT INTO {table} ({cols}, geom) VALUES ({binds}, {geom_from_wkt}) RETURNING {returning}",
            cols = columns.join(", "),
            binds = columns
                .iter()
                .map(|c| format!(":{c}"))
                .collect::<Vec<_>>()
                .join(", "),
        );
        let update = format!(
            "UPDATE {table} SET {assignments}, geom = {geom_from_wkt} WHERE {id} = :id RETURNING {returning}",
            assignments = columns
                .iter()
                .map(|c| format!("{c} = :{c}"))
                .collect::<Vec<_>>()
                .join(", "),
        );

        Self {
            insert: CompiledQuery::compile(&insert),
            select_one: CompiledQuery::compile(&format!(
                "SELECT {returning} FROM {table} WHERE {id} = :id"
            )),
            select_page: CompiledQuery::compile(&format!(
                "SELECT {returning} FROM {table} ORDER BY {id} OFFSET :skip LIMIT :limit"
            )),
            update: CompiledQuery::compile(&update),
            delete: CompiledQuery::compile(&format!(
                "DELETE FROM {table} WHERE {id} = :id RETURNING {id}"
            )),
        }
    }
}

fn select_list(kind: EntityKind) -> String {
    format!(
        "{id}, {cols}, ST_AsGeoJSON(geom)::json AS geom, created_at",
        id = kind.id_column(),
        cols = kind.columns().join(", "),
    )
}

/// Light shape check of a WKT string against the expected geometry type.
/// Full parsing is left to the store.
pub fn validate_wkt(wkt: &str, expected: GeometryKind) -> Result<(), CatalogError> {
    let trimmed = wkt.trim();
    let body = match trimmed.split_once(';') {
        Some((prefix, rest)) if prefix.to_ascii_uppercase().starts_with("SRID=") => rest.trim(),
        _ => trimmed,
    };
    let tag: String = body
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase();

    if tag.is_empty() {
        return Err(CatalogError::Validation("geom must be a WKT string".to_string()));
    }
    if tag != expected.wkt_tag() {
        return Err(CatalogError::Validation(format!(
            "geom must be a {} geometry, got {tag}",
            expected.wkt_tag()
        )));
    }
    let rest = body[tag.len()..].trim_start();
    if !rest.contains('(') && !rest.to_ascii_uppercase().starts_with("EMPTY") {
        return Err(CatalogError::Validation(format!(
            "geom is not valid WKT: {trimmed}"
        )));
    }
    Ok(())
}

/// CRUD access to the seven network tables.
#[derive(Clone)]
pub struct Catalog {
    executor: Arc<dyn QueryExecutor>,
    statements: Arc<HashMap<EntityKind, Statements>>,
}

impl Catalog {
    pub fn new(executor: Arc<dyn QueryExecutor>) -> Self {
        let statements = EntityKind::ALL
            .iter()
            .map(|kind| (*kind, Statements::build(*kind)))
            .collect();
        Self {
            executor,
            statements: Arc::new(statements),
        }
    }

    fn statements(&self, kind: EntityKind) -> &Statements {
        // Built for every kind in `new`.
        &self.statements[&kind]
    }

    fn write_params<P: EntityPayload>(payload: &P) -> Result<BindParams, CatalogError> {
        validate_wkt(payload.geom(), P::KIND.geometry())?;
        let mut params = BindParams::new();
        for (column, value) in P::KIND.columns().iter().zip(payload.values()) {
            params.insert(*column, value);
        }
        params.insert("geom", payload.geom());
        Ok(params)
    }

    pub async fn create<P: EntityPayload>(&self, payload: &P) -> Result<Row, CatalogError> {
        let params = Self::write_params(payload)?;
        let mut rows = self
            .executor
            .fetch_all(&self.statements(P::KIND).insert, &params)
            .await?;
        debug!(kind = P::KIND.table(), "entity created");
        rows.pop().ok_or_else(|| {
            CatalogError::Execution(ExecutionError::Database(
                "insert returned no row".to_string(),
            ))
        })
    }

    pub async fn get(&self, kind: EntityKind, id: i64) -> Result<Option<Row>, CatalogError> {
        let params = BindParams::new().with("id", id);
        let mut rows = self
            .executor
            .fetch_all(&self.statements(kind).select_one, &params)
            .await?;
        Ok(rows.pop())
    }

    pub async fn list(&self, kind: EntityKind, page: Page) -> Result<Vec<Row>, CatalogError> {
        page.validate()?;
        let params = BindParams::new()
            .with("skip", page.skip)
            .with("limit", page.limit);
        Ok(self
            .executor
            .fetch_all(&self.statements(kind).select_page, &params)
            .await?)
    }

    /// Replace every attribute and the geometry. `None` when no row has `id`.
    pub async fn update<P: EntityPayload>(
        &self,
        id: i64,
        payload: &P,
    ) -> Result<Option<Row>, CatalogError> {
        let mut params = Self::write_params(payload)?;
        params.insert("id", id);
        let mut rows = self
            .executor
            .fetch_all(&self.statements(P::KIND).update, &params)
            .await?;
        debug!(kind = P::KIND.table(), id, found = !rows.is_empty(), "entity updated");
        Ok(rows.pop())
    }

    /// Returns true if a row was removed.
    pub async fn delete(&self, kind: EntityKind, id: i64) -> Result<bool, CatalogError> {
        let params = BindParams::new().with("id", id);
        let rows = self
            .executor
            .fetch_all(&self.statements(kind).delete, &params)
            .await?;
        debug!(kind = kind.table(), id, existed = !rows.is_empty(), "entity deleted");
        Ok(!rows.is_empty())
    }
}
