//! Catalog table bootstrap.
//!
//! Creates the PostGIS extension and the seven network tables when they do
//! not exist yet. Existing tables are left untouched; there is no migration
//! of changed definitions.

use tracing::{info, warn};

use crate::error::{StoreError, StoreResult};
use crate::executor::{Backend, QueryExecutor};

/// DDL in dependency order (referenced tables first).
pub const STATEMENTS: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS postgis",
    "CREATE TABLE IF NOT EXISTS substations (
        substation_id SERIAL PRIMARY KEY,
        substation_name VARCHAR(255) NOT NULL,
        voltage_level_kv DOUBLE PRECISION NOT NULL,
        status VARCHAR(50) NOT NULL DEFAULT 'Active',
        geom geometry(Point, 4326) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS feeders (
        feeder_id SERIAL PRIMARY KEY,
        feeder_name VARCHAR(255) NOT NULL,
        substation_id INTEGER NOT NULL REFERENCES substations (substation_id),
        voltage_level_kv DOUBLE PRECISION,
        geom geometry(LineString, 4326) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS transformers (
        transformer_id SERIAL PRIMARY KEY,
        transformer_name VARCHAR(255) NOT NULL,
        feeder_id INTEGER NOT NULL REFERENCES feeders (feeder_id),
        capacity_kva DOUBLE PRECISION NOT NULL,
        status VARCHAR(50) NOT NULL DEFAULT 'Active',
        geom geometry(Point, 4326) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS poles (
        pole_id SERIAL PRIMARY KEY,
        transformer_id INTEGER REFERENCES transformers (transformer_id),
        material_type VARCHAR(100),
        height_meters DOUBLE PRECISION,
        installation_year INTEGER,
        geom geometry(Point, 4326) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS conductors (
        conductor_id SERIAL PRIMARY KEY,
        start_pole_id INTEGER REFERENCES poles (pole_id),
        end_pole_id INTEGER REFERENCES poles (pole_id),
        conductor_type VARCHAR(100),
        voltage_rating_kv DOUBLE PRECISION,
        geom geometry(LineString, 4326) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS switches (
        switch_id SERIAL PRIMARY KEY,
        conductor_id INTEGER REFERENCES conductors (conductor_id),
        switch_type VARCHAR(100),
        operational_status VARCHAR(50) NOT NULL DEFAULT 'Closed',
        geom geometry(Point, 4326) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
    "CREATE TABLE IF NOT EXISTS fuses (
        fuse_id SERIAL PRIMARY KEY,
        conductor_id INTEGER REFERENCES conductors (conductor_id),
        fuse_rating_amps INTEGER,
        operational_status VARCHAR(50) NOT NULL DEFAULT 'Operational',
        geom geometry(Point, 4326) NOT NULL,
        created_at TIMESTAMPTZ NOT NULL DEFAULT now()
    )",
];

/// Apply [`STATEMENTS`]. Only PostgreSQL carries PostGIS; other backends
/// are skipped.
pub async fn bootstrap(executor: &dyn QueryExecutor) -> StoreResult<()> {
    if executor.backend() != Backend::Postgres {
        warn!(
            backend = executor.backend().name(),
            "schema bootstrap needs PostGIS; skipped"
        );
        return Ok(());
    }
    for statement in STATEMENTS {
        executor
            .run_statement(statement)
            .await
            .map_err(|e| StoreError::Schema(e.to_string()))?;
    }
    info!(tables = STATEMENTS.len() - 1, "catalog schema ready");
    Ok(())
}
