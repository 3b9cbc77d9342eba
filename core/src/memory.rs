use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::error::StoreError;
use crate::store::{DataStore, Filter, Query};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Op {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct Tables {
    rows: HashMap<String, Vec<Value>>,
    next_id: HashMap<String, i64>,
    calls: HashMap<(String, Op), usize>,
    fail_next: HashMap<(String, Op), StoreError>,
}

/// In-memory table store with PostgREST-compatible error codes.
///
/// Rows are plain JSON objects. `insert` assigns an `id` when the record has
/// none; `select_single` fails with `PGRST116` unless exactly one row matches.
#[derive(Default)]
pub struct MemoryStore {
    inner: Mutex<Tables>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed `table` with `rows` without counting as operations.
    pub fn seed(&self, table: &str, rows: Vec<Value>) {
        let mut tables = self.lock();
        for mut row in rows {
            assign_id(&mut tables, table, &mut row);
            tables.rows.entry(table.to_string()).or_default().push(row);
        }
    }

    /// Make the next `op` on `table` fail with `err`.
    pub fn fail_next(&self, table: &str, op: Op, err: StoreError) {
        self.lock().fail_next.insert((table.to_string(), op), err);
    }

    #[must_use]
    pub fn rows(&self, table: &str) -> Vec<Value> {
        self.lock().rows.get(table).cloned().unwrap_or_default()
    }

    #[must_use]
    pub fn calls(&self, table: &str, op: Op) -> usize {
        self.lock()
            .calls
            .get(&(table.to_string(), op))
            .copied()
            .unwrap_or(0)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Tables> {
        // A panic while holding the lock leaves plain data behind; keep going.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn begin(&self, table: &str, op: Op) -> Result<std::sync::MutexGuard<'_, Tables>, StoreError> {
        let mut tables = self.lock();
        *tables.calls.entry((table.to_string(), op)).or_insert(0) += 1;
        if let Some(err) = tables.fail_next.remove(&(table.to_string(), op)) {
            return Err(err);
        }
        Ok(tables)
    }
}

fn assign_id(tables: &mut Tables, table: &str, row: &mut Value) {
    let next = tables.next_id.entry(table.to_string()).or_insert(1);
    if let Some(obj) = row.as_object_mut() {
        match obj.get("id").and_then(Value::as_i64) {
            Some(id) => *next = (*next).max(id + 1),
            None => {
                obj.insert("id".to_string(), Value::from(*next));
                *next += 1;
            }
        }
    }
}

fn matches_all(row: &Value, filters: &[Filter]) -> bool {
    filters.iter().all(|f| f.matches(row))
}

fn project(row: &Value, columns: Option<&[&str]>) -> Value {
    match (columns, row.as_object()) {
        (Some(cols), Some(obj)) if !cols.contains(&"*") => {
            let picked: Map<String, Value> = cols
                .iter()
                .filter_map(|c| obj.get(*c).map(|v| ((*c).to_string(), v.clone())))
                .collect();
            Value::Object(picked)
        }
        _ => row.clone(),
    }
}

fn select_rows(tables: &Tables, table: &str, query: &Query) -> Vec<Value> {
    let columns = query.column_names();
    let matched = tables
        .rows
        .get(table)
        .into_iter()
        .flatten()
        .filter(|row| matches_all(row, &query.filters))
        .skip(query.offset);
    let limited: Vec<&Value> = match query.limit {
        Some(n) => matched.take(n).collect(),
        None => matched.collect(),
    };
    limited
        .into_iter()
        .map(|row| project(row, columns.as_deref()))
        .collect()
}

#[async_trait]
impl DataStore for MemoryStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        let tables = self.begin(table, Op::Select)?;
        Ok(select_rows(&tables, table, query))
    }

    async fn select_single(&self, table: &str, query: &Query) -> Result<Value, StoreError> {
        let tables = self.begin(table, Op::Select)?;
        let mut rows = select_rows(&tables, table, query);
        if rows.len() == 1 {
            Ok(rows.remove(0))
        } else {
            Err(StoreError::no_rows())
        }
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Vec<Value>, StoreError> {
        let mut tables = self.begin(table, Op::Insert)?;
        if !record.is_object() {
            return Err(StoreError::Provider {
                status: 400,
                code: Some("PGRST102".to_string()),
                message: "All object keys must match".to_string(),
            });
        }
        let mut row = record;
        assign_id(&mut tables, table, &mut row);
        tables
            .rows
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(vec![row])
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        let mut tables = self.begin(table, Op::Update)?;
        let Some(patch) = patch.as_object() else {
            return Err(StoreError::Decode("update patch must be an object".to_string()));
        };
        let mut updated = Vec::new();
        for row in tables.rows.entry(table.to_string()).or_default() {
            if !matches_all(row, filters) {
                continue;
            }
            if let Some(obj) = row.as_object_mut() {
                for (k, v) in patch {
                    obj.insert(k.clone(), v.clone());
                }
            }
            updated.push(row.clone());
        }
        Ok(updated)
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
        let mut tables = self.begin(table, Op::Delete)?;
        let rows = tables.rows.entry(table.to_string()).or_default();
        let (removed, kept): (Vec<Value>, Vec<Value>) =
            rows.drain(..).partition(|row| matches_all(row, filters));
        *rows = kept;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_insert_assigns_ids() {
        let store = MemoryStore::new();
        let a = store.insert("t", json!({"name": "a"})).await.unwrap();
        let b = store.insert("t", json!({"name": "b"})).await.unwrap();
        assert_eq!(a[0]["id"], 1);
        assert_eq!(b[0]["id"], 2);

        store.seed("u", vec![json!({"id": 10})]);
        let c = store.insert("u", json!({})).await.unwrap();
        assert_eq!(c[0]["id"], 11);
    }

    #[tokio::test]
    async fn test_select_filters_projects_and_limits() {
        let store = MemoryStore::new();
        store.seed(
            "fav",
            vec![
                json!({"user_id": "u1", "recipe_id": 1, "recipe_title": "A"}),
                json!({"user_id": "u1", "recipe_id": 2, "recipe_title": "B"}),
                json!({"user_id": "u2", "recipe_id": 3, "recipe_title": "C"}),
            ],
        );

        let q = Query::new().columns("recipe_id").eq("user_id", "u1");
        let rows = store.select("fav", &q).await.unwrap();
        assert_eq!(rows, vec![json!({"recipe_id": 1}), json!({"recipe_id": 2})]);

        let rows = store.select("fav", &q.clone().limit(1)).await.unwrap();
        assert_eq!(rows.len(), 1);

        let rows = store.select("fav", &q.clone().limit(0)).await.unwrap();
        assert!(rows.is_empty());

        let rows = store.select("fav", &q.range(1, 5)).await.unwrap();
        assert_eq!(rows, vec![json!({"recipe_id": 2})]);
    }

    #[tokio::test]
    async fn test_select_single_requires_exactly_one() {
        let store = MemoryStore::new();
        store.seed("r", vec![json!({"k": 1}), json!({"k": 2}), json!({"k": 2})]);

        assert!(store.select_single("r", &Query::new().eq("k", 1)).await.is_ok());
        let none = store.select_single("r", &Query::new().eq("k", 9)).await;
        assert!(none.unwrap_err().is_no_rows());
        let many = store.select_single("r", &Query::new().eq("k", 2)).await;
        assert!(many.unwrap_err().is_no_rows());
    }

    #[tokio::test]
    async fn test_update_and_delete_return_affected_rows() {
        let store = MemoryStore::new();
        store.seed("r", vec![json!({"k": 1, "v": "a"}), json!({"k": 2, "v": "b"})]);

        let updated = store
            .update("r", &[Filter::new("k", 1)], json!({"v": "z"}))
            .await
            .unwrap();
        assert_eq!(updated.len(), 1);
        assert_eq!(updated[0]["v"], "z");

        let none = store
            .update("r", &[Filter::new("k", 9)], json!({"v": "z"}))
            .await
            .unwrap();
        assert!(none.is_empty());

        let removed = store.delete("r", &[Filter::new("k", 2)]).await.unwrap();
        assert_eq!(removed.len(), 1);
        assert_eq!(store.rows("r").len(), 1);
    }

    #[tokio::test]
    async fn test_fail_next_is_one_shot_and_counted() {
        let store = MemoryStore::new();
        store.fail_next("r", Op::Select, StoreError::Transport("down".to_string()));

        assert!(store.select("r", &Query::new()).await.is_err());
        assert!(store.select("r", &Query::new()).await.is_ok());
        assert_eq!(store.calls("r", Op::Select), 2);
        assert_eq!(store.calls("r", Op::Insert), 0);
    }
}
