//! Route table — registered dynamic routes by name.
//!
//! The table is the single source of truth for dynamic dispatch: a name is
//! reachable exactly when it is present here. Definitions are immutable
//! once inserted and shared as `Arc`s, so readers clone a pointer under a
//! short read lock and never hold the lock while a query runs.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Utc};
use gridcat_store::CompiledQuery;
use tracing::debug;

/// A registered query endpoint.
#[derive(Debug, Clone, PartialEq)]
pub struct RouteDefinition {
    pub name: String,
    pub created_at: DateTime<Utc>,
    query: CompiledQuery,
}

impl RouteDefinition {
    pub fn new(name: impl Into<String>, query_text: &str, created_at: DateTime<Utc>) -> Self {
        Self {
            name: name.into(),
            created_at,
            query: CompiledQuery::compile(query_text),
        }
    }

    /// Query text exactly as registered.
    pub fn query_text(&self) -> &str {
        self.query.text()
    }

    pub fn query(&self) -> &CompiledQuery {
        &self.query
    }
}

#[derive(Default)]
struct Entries {
    by_name: HashMap<String, Arc<RouteDefinition>>,
    /// Names in registration order.
    order: Vec<String>,
}

/// Process-wide dynamic route table. Cheap to clone; clones share state.
#[derive(Clone, Default)]
pub struct RouteTable {
    entries: Arc<RwLock<Entries>>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        let entries = self.entries.read().expect("route table lock");
        entries.by_name.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<Arc<RouteDefinition>> {
        let entries = self.entries.read().expect("route table lock");
        entries.by_name.get(name).cloned()
    }

    /// Insert `definition` under its name unless the name is taken.
    ///
    /// The check and the insert happen under one write lock: of any number
    /// of concurrent calls for the same name exactly one returns true, and
    /// the others leave the table unchanged.
    pub fn insert_if_absent(&self, definition: Arc<RouteDefinition>) -> bool {
        let mut entries = self.entries.write().expect("route table lock");
        if entries.by_name.contains_key(&definition.name) {
            return false;
        }
        let name = definition.name.clone();
        entries.order.push(name.clone());
        entries.by_name.insert(name, definition);
        debug!(routes = entries.order.len(), "route table grew");
        true
    }

    /// Snapshot of every definition, in registration order.
    pub fn list(&self) -> Vec<Arc<RouteDefinition>> {
        let entries = self.entries.read().expect("route table lock");
        entries
            .order
            .iter()
            .filter_map(|name| entries.by_name.get(name).cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.read().expect("route table lock").order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
