use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// An equality predicate on a named column.
#[derive(Debug, Clone, PartialEq)]
pub struct Filter {
    pub column: String,
    pub value: Value,
}

impl Filter {
    pub fn new(column: &str, value: impl Into<Value>) -> Self {
        Self {
            column: column.to_string(),
            value: value.into(),
        }
    }

    #[must_use]
    pub fn matches(&self, row: &Value) -> bool {
        row.get(&self.column)
            .is_some_and(|v| values_equal(v, &self.value))
    }
}

/// Numbers compare by value so `42` and `42.0` match, as they do in Postgres.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}

/// A `select` request: column list, equality filters and an optional row range.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub columns: Option<String>,
    pub filters: Vec<Filter>,
    pub offset: usize,
    pub limit: Option<usize>,
}

impl Query {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn columns(mut self, columns: &str) -> Self {
        self.columns = Some(columns.to_string());
        self
    }

    #[must_use]
    pub fn eq(mut self, column: &str, value: impl Into<Value>) -> Self {
        self.filters.push(Filter::new(column, value));
        self
    }

    /// Restrict to rows `from..=to`, like a PostgREST range. A range that
    /// ends before it starts is empty.
    #[must_use]
    pub fn range(mut self, from: usize, to: usize) -> Self {
        self.offset = from;
        self.limit = Some(to.checked_sub(from).map_or(0, |span| span + 1));
        self
    }

    /// At most `limit` rows from the start.
    #[must_use]
    pub fn limit(mut self, limit: usize) -> Self {
        self.offset = 0;
        self.limit = Some(limit);
        self
    }

    /// Column names requested, `None` meaning all.
    #[must_use]
    pub fn column_names(&self) -> Option<Vec<&str>> {
        self.columns
            .as_deref()
            .map(|c| c.split(',').map(str::trim).filter(|s| !s.is_empty()).collect())
    }
}

/// Table-oriented access to the hosted Postgres backend.
///
/// The CLI implements this over PostgREST with reqwest; tests use
/// [`crate::memory::MemoryStore`]. Write operations return the affected rows.
#[async_trait]
pub trait DataStore: Send + Sync {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError>;

    /// Exactly one row, or a `PGRST116` provider error.
    async fn select_single(&self, table: &str, query: &Query) -> Result<Value, StoreError>;

    async fn insert(&self, table: &str, record: Value) -> Result<Vec<Value>, StoreError>;

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError>;

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_eq_matches_numbers_by_value() {
        let row = json!({"recipe_id": 42, "user_id": "abc"});
        assert!(Filter::new("recipe_id", 42).matches(&row));
        assert!(Filter::new("recipe_id", 42.0).matches(&row));
        assert!(!Filter::new("recipe_id", 43).matches(&row));
        assert!(!Filter::new("missing", 42).matches(&row));
        assert!(Filter::new("user_id", "abc").matches(&row));
    }

    #[test]
    fn test_query_range_and_limit() {
        let q = Query::new().limit(1);
        assert_eq!((q.offset, q.limit), (0, Some(1)));

        let q = Query::new().range(10, 19);
        assert_eq!((q.offset, q.limit), (10, Some(10)));
    }

    #[test]
    fn test_zero_limit_and_reversed_range_are_empty() {
        let q = Query::new().limit(0);
        assert_eq!((q.offset, q.limit), (0, Some(0)));

        let q = Query::new().range(5, 4);
        assert_eq!((q.offset, q.limit), (5, Some(0)));
    }

    #[test]
    fn test_column_names() {
        let q = Query::new().columns("id, nome_pt,nome_en");
        assert_eq!(q.column_names().unwrap(), vec!["id", "nome_pt", "nome_en"]);
        assert!(Query::new().column_names().is_none());
    }
}
