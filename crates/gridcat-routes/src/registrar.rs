//! Dynamic route registrar.
//!
//! Turns a `(name, sql)` request into a live endpoint. Dispatch resolves
//! `/api/custom/{name}` through the [`RouteTable`] at request time, so
//! making a route live is the single `insert_if_absent` of a fully built
//! definition: a concurrent request sees either no route (404) or the
//! complete one.
//!
//! The query text is trusted. Callers must sit behind an authorization
//! layer; [`QueryPolicy::ReadOnly`] only screens the leading keyword.

use std::sync::Arc;

use chrono::Utc;
use thiserror::Error;
use tracing::{info, warn};

use crate::table::{RouteDefinition, RouteTable};

/// Path prefix under which dynamic routes are served.
pub const ROUTE_PREFIX: &str = "/api/custom/";

/// Leading keywords accepted under [`QueryPolicy::ReadOnly`].
const READ_KEYWORDS: &[&str] = &["SELECT", "WITH", "VALUES", "TABLE", "SHOW", "EXPLAIN"];

pub fn route_path(name: &str) -> String {
    format!("{ROUTE_PREFIX}{name}")
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("Endpoint already exists")]
    Duplicate(String),

    #[error("endpoint name must not be empty")]
    EmptyName,

    #[error("endpoint name '{0}' must be a single path segment (no '/', '?' or '#')")]
    InvalidName(String),

    #[error("sql must not be empty")]
    EmptyQuery,

    #[error("only read queries may be registered, found {0}")]
    NotReadOnly(String),
}

/// What query text the registrar accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum QueryPolicy {
    #[default]
    Unrestricted,
    ReadOnly,
}

impl QueryPolicy {
    pub fn from_read_only(read_only: bool) -> Self {
        if read_only {
            QueryPolicy::ReadOnly
        } else {
            QueryPolicy::Unrestricted
        }
    }

    fn check(&self, sql: &str) -> Result<(), RegistrationError> {
        if *self == QueryPolicy::Unrestricted {
            return Ok(());
        }
        let keyword = leading_keyword(sql);
        if READ_KEYWORDS.contains(&keyword.as_str()) {
            Ok(())
        } else {
            Err(RegistrationError::NotReadOnly(keyword))
        }
    }
}

/// First keyword of `sql`, skipping whitespace, comments and opening parens.
fn leading_keyword(sql: &str) -> String {
    let mut rest = sql;
    loop {
        rest = rest.trim_start_matches(|c: char| c.is_whitespace() || c == '(');
        if let Some(after) = rest.strip_prefix("--") {
            rest = after.split_once('\n').map_or("", |(_, tail)| tail);
        } else if let Some(after) = rest.strip_prefix("/*") {
            rest = after.split_once("*/").map_or("", |(_, tail)| tail);
        } else {
            break;
        }
    }
    rest.chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect::<String>()
        .to_ascii_uppercase()
}

/// Registers dynamic routes into a shared [`RouteTable`].
#[derive(Clone)]
pub struct Registrar {
    table: RouteTable,
    policy: QueryPolicy,
}

impl Registrar {
    pub fn new(table: RouteTable, policy: QueryPolicy) -> Self {
        Self { table, policy }
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Validate and commit a new route. On any error nothing is installed
    /// and an existing route of the same name is untouched.
    pub fn register(
        &self,
        name: &str,
        sql: &str,
    ) -> Result<Arc<RouteDefinition>, RegistrationError> {
        if name.trim().is_empty() {
            return Err(RegistrationError::EmptyName);
        }
        // A taken name is reported as such whatever query accompanies it.
        if self.table.contains(name) {
            warn!(%name, "route already registered");
            return Err(RegistrationError::Duplicate(name.to_string()));
        }
        if name.contains(['/', '?', '#']) {
            return Err(RegistrationError::InvalidName(name.to_string()));
        }
        if sql.trim().is_empty() {
            return Err(RegistrationError::EmptyQuery);
        }
        self.policy.check(sql)?;

        let definition = Arc::new(RouteDefinition::new(name, sql, Utc::now()));
        // A concurrent registration may have won since the check above.
        if !self.table.insert_if_absent(Arc::clone(&definition)) {
            warn!(%name, "route registered concurrently");
            return Err(RegistrationError::Duplicate(name.to_string()));
        }

        info!(
            %name,
            path = %route_path(name),
            parameters = ?definition.query().parameters(),
            "dynamic route registered"
        );
        Ok(definition)
    }
}
