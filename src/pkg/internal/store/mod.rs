//! Row-level access to the hosted table store.

pub mod memory;
pub mod rest;

use serde_json::Value;

use crate::pkg::internal::failure::Outcome;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// Equality filters plus optional ordering and limit.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<(String, Value)>,
    pub order: Option<(String, Order)>,
    pub limit: Option<usize>,
}

impl Query {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push((column.to_string(), value.into()));
        self
    }

    pub fn order(mut self, column: &str, order: Order) -> Self {
        self.order = Some((column.to_string(), order));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Whether `row` satisfies every filter.
    pub fn matches(&self, row: &Value) -> bool {
        self.filters
            .iter()
            .all(|(column, value)| row.get(column) == Some(value))
    }
}

#[async_trait::async_trait]
pub trait TableStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Outcome<Vec<Value>>;

    /// Inserts one row and returns it as stored, with generated columns filled in.
    async fn insert(&self, table: &str, row: Value) -> Outcome<Value>;

    /// Merges `patch` into every matching row and returns the updated rows.
    async fn update(&self, table: &str, query: &Query, patch: Value) -> Outcome<Vec<Value>>;

    async fn delete(&self, table: &str, query: &Query) -> Outcome<u64>;

    /// Resolves a session token to the user id owning it.
    async fn session_user(&self, token: &str) -> Outcome<Option<String>>;
}
