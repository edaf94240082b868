//! gridcat-store — relational store access for gridcat.
//!
//! Provides the [`QueryExecutor`] seam used by both the dynamic query
//! endpoints and the entity catalog. Query text uses `:name` bind
//! parameters, compiled once into store-native `$n` placeholders by
//! [`CompiledQuery`]. Two backends are available, selected from the
//! database URL: PostgreSQL/PostGIS for production and SQLite for local
//! runs and tests.
//!
//! Every executor materializes the full result set into owned [`Row`]s
//! before the pooled connection is handed back.

pub mod catalog;
pub mod entities;
pub mod error;
pub mod executor;
pub mod postgres;
pub mod query;
pub mod row;
pub mod schema;
pub mod sqlite;

pub use catalog::{Catalog, CatalogError, Page};
pub use entities::*;
pub use error::{ExecutionError, StoreError, StoreResult};
pub use executor::{Backend, ExecuteFuture, QueryExecutor, StatementFuture, connect, redact_url};
pub use postgres::PgExecutor;
pub use query::{BindParams, BindValue, CompiledQuery};
pub use row::{QueryResult, Row};
pub use sqlite::SqliteExecutor;
