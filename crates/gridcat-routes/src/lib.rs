//! gridcat-routes — runtime-registered query endpoints.
//!
//! An operator registers a `(name, sql)` pair; from then on
//! `GET /api/custom/{name}` runs that query. Registration and dispatch
//! share one [`RouteTable`], built once at startup and handed to both the
//! [`Registrar`] and the HTTP front end.
//!
//! # Components
//!
//! - **`table`** — name → [`RouteDefinition`] map with atomic insert-if-absent
//! - **`registrar`** — validation, query compilation, commit

pub mod registrar;
pub mod table;

pub use registrar::{QueryPolicy, Registrar, RegistrationError, ROUTE_PREFIX, route_path};
pub use table::{RouteDefinition, RouteTable};
