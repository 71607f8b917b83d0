use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{SecondsFormat, Utc};
use parking_lot::RwLock;
use serde_json::{Value, json};
use uuid::Uuid;

use super::{Order, Query, TableStore};
use crate::pkg::internal::failure::{Failure, Outcome};

/// In-process table store with the same filter and ordering semantics as the
/// hosted one. Used by tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<HashMap<String, Vec<Value>>>,
    sessions: RwLock<HashMap<String, String>>,
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => x
            .as_f64()
            .partial_cmp(&y.as_f64())
            .unwrap_or(Ordering::Equal),
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        _ => Ordering::Equal,
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_session(&self, token: &str, user_id: &str) {
        self.sessions
            .write()
            .insert(token.to_string(), user_id.to_string());
    }
}

#[async_trait::async_trait]
impl TableStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Outcome<Vec<Value>> {
        let tables = self.tables.read();
        let mut rows: Vec<Value> = tables
            .get(table)
            .map(|rows| rows.iter().filter(|r| query.matches(r)).cloned().collect())
            .unwrap_or_default();
        if let Some((column, order)) = &query.order {
            rows.sort_by(|a, b| {
                let ord = compare(a.get(column), b.get(column));
                match order {
                    Order::Asc => ord,
                    Order::Desc => ord.reverse(),
                }
            });
        }
        if let Some(limit) = query.limit {
            rows.truncate(limit);
        }
        Ok(rows)
    }

    async fn insert(&self, table: &str, row: Value) -> Outcome<Value> {
        let Value::Object(mut fields) = row else {
            return Err(Failure::Backend(format!("{} rows must be objects", table)));
        };
        let stamp = now();
        fields
            .entry("id")
            .or_insert_with(|| json!(Uuid::new_v4().to_string()));
        fields.entry("created_at").or_insert_with(|| json!(stamp));
        fields.entry("updated_at").or_insert_with(|| json!(stamp));
        let row = Value::Object(fields);
        let mut tables = self.tables.write();
        let rows = tables.entry(table.to_string()).or_default();
        if rows.iter().any(|r| r.get("id") == row.get("id")) {
            return Err(Failure::Backend(format!(
                "duplicate key in {}: {}",
                table,
                row.get("id").cloned().unwrap_or_default()
            )));
        }
        rows.push(row.clone());
        Ok(row)
    }

    async fn update(&self, table: &str, query: &Query, patch: Value) -> Outcome<Vec<Value>> {
        let Value::Object(patch) = patch else {
            return Err(Failure::Backend(format!("{} patch must be an object", table)));
        };
        let stamp = now();
        let mut tables = self.tables.write();
        let mut updated = vec![];
        for row in tables.get_mut(table).into_iter().flatten() {
            if !query.matches(row) {
                continue;
            }
            if let Value::Object(fields) = row {
                for (k, v) in &patch {
                    fields.insert(k.clone(), v.clone());
                }
                fields.insert("updated_at".into(), json!(stamp));
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, query: &Query) -> Outcome<u64> {
        let mut tables = self.tables.write();
        let Some(rows) = tables.get_mut(table) else {
            return Ok(0);
        };
        let before = rows.len();
        rows.retain(|r| !query.matches(r));
        Ok((before - rows.len()) as u64)
    }

    async fn session_user(&self, token: &str) -> Outcome<Option<String>> {
        Ok(self.sessions.read().get(token).cloned())
    }
}
