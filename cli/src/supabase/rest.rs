use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use pantry_core::error::StoreError;
use pantry_core::store::{DataStore, Filter, Query};

use super::Supabase;

const SINGLE_OBJECT: &str = "application/vnd.pgrst.object+json";
const RETURN_ROWS: &str = "return=representation";

/// PostgREST error body.
#[derive(Debug, Deserialize)]
struct PostgrestError {
    code: Option<String>,
    message: Option<String>,
    details: Option<String>,
}

/// `DataStore` over the Supabase REST endpoint (`/rest/v1/{table}`).
pub struct RestStore {
    client: Arc<Supabase>,
}

impl RestStore {
    pub fn new(client: Arc<Supabase>) -> Self {
        Self { client }
    }

    fn table(&self, method: Method, table: &str) -> RequestBuilder {
        self.client.request(method, &format!("/rest/v1/{table}"))
    }
}

/// `column=eq.value` pairs.
fn filter_params(filters: &[Filter]) -> Vec<(String, String)> {
    filters
        .iter()
        .map(|f| (f.column.clone(), format!("eq.{}", literal(&f.value))))
        .collect()
}

fn literal(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

fn query_params(query: &Query) -> Vec<(String, String)> {
    let mut params = vec![(
        "select".to_string(),
        query.columns.clone().unwrap_or_else(|| "*".to_string()),
    )];
    params.extend(filter_params(&query.filters));
    if query.offset > 0 {
        params.push(("offset".to_string(), query.offset.to_string()));
    }
    if let Some(limit) = query.limit {
        params.push(("limit".to_string(), limit.to_string()));
    }
    params
}

async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
    let response = request
        .send()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let text = response.text().await.unwrap_or_default();
    let (code, message) = match serde_json::from_str::<PostgrestError>(&text) {
        Ok(err) => {
            let message = match (err.message, err.details) {
                (Some(m), Some(d)) if !d.is_empty() => format!("{m} ({d})"),
                (Some(m), _) => m,
                (None, _) => text.clone(),
            };
            (err.code, message)
        }
        Err(_) => (None, text),
    };
    Err(StoreError::Provider {
        status: status.as_u16(),
        code,
        message,
    })
}

async fn rows(response: Response) -> Result<Vec<Value>, StoreError> {
    let text = response
        .text()
        .await
        .map_err(|e| StoreError::Transport(e.to_string()))?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }
    match serde_json::from_str::<Value>(&text)? {
        Value::Array(rows) => Ok(rows),
        Value::Object(row) => Ok(vec![Value::Object(row)]),
        other => Err(StoreError::Decode(format!("expected rows, got {other}"))),
    }
}

#[async_trait]
impl DataStore for RestStore {
    async fn select(&self, table: &str, query: &Query) -> Result<Vec<Value>, StoreError> {
        debug!(table, "select");
        let response = send(self.table(Method::GET, table).query(&query_params(query))).await?;
        rows(response).await
    }

    async fn select_single(&self, table: &str, query: &Query) -> Result<Value, StoreError> {
        debug!(table, "select single");
        let request = self
            .table(Method::GET, table)
            .header(reqwest::header::ACCEPT, SINGLE_OBJECT)
            .query(&query_params(query));
        let response = send(request).await?;
        let text = response
            .text()
            .await
            .map_err(|e| StoreError::Transport(e.to_string()))?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn insert(&self, table: &str, record: Value) -> Result<Vec<Value>, StoreError> {
        debug!(table, "insert");
        let request = self
            .table(Method::POST, table)
            .header("Prefer", RETURN_ROWS)
            .json(&[record]);
        rows(send(request).await?).await
    }

    async fn update(
        &self,
        table: &str,
        filters: &[Filter],
        patch: Value,
    ) -> Result<Vec<Value>, StoreError> {
        debug!(table, "update");
        let request = self
            .table(Method::PATCH, table)
            .header("Prefer", RETURN_ROWS)
            .query(&filter_params(filters))
            .json(&patch);
        rows(send(request).await?).await
    }

    async fn delete(&self, table: &str, filters: &[Filter]) -> Result<Vec<Value>, StoreError> {
        debug!(table, "delete");
        let request = self
            .table(Method::DELETE, table)
            .header("Prefer", RETURN_ROWS)
            .query(&filter_params(filters));
        rows(send(request).await?).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubServer;
    use crate::supabase::tests::session;
    use pantry_core::gateway::Gateway;
    use pantry_core::models::{RATINGS_TABLE, RatingValue};
    use serde_json::json;

    fn store(server: &StubServer) -> (Arc<Supabase>, RestStore) {
        let client = Arc::new(Supabase::new(&server.base_url, "anon-key", 5).unwrap());
        (Arc::clone(&client), RestStore::new(client))
    }

    #[tokio::test]
    async fn test_select_builds_postgrest_query() {
        let server = StubServer::start(vec![(200, json!([{"id": 1, "recipe_id": 42}]))]).await;
        let (_client, store) = store(&server);

        let query = Query::new()
            .columns("id, recipe_id")
            .eq("user_id", "u-1")
            .eq("recipe_id", 42)
            .limit(1);
        let rows = store.select("user_favorites", &query).await.unwrap();
        assert_eq!(rows.len(), 1);

        let req = server.last();
        assert_eq!(req.method, Method::GET);
        assert_eq!(req.path, "/rest/v1/user_favorites");
        let params = req.query_pairs();
        assert!(params.contains(&("select".to_string(), "id, recipe_id".to_string())));
        assert!(params.contains(&("user_id".to_string(), "eq.u-1".to_string())));
        assert!(params.contains(&("recipe_id".to_string(), "eq.42".to_string())));
        assert!(params.contains(&("limit".to_string(), "1".to_string())));
        assert_eq!(req.header("apikey"), Some("anon-key"));
        assert_eq!(req.header("authorization"), Some("Bearer anon-key"));
    }

    #[tokio::test]
    async fn test_signed_in_requests_use_user_token() {
        let server = StubServer::start(vec![]).await;
        let (client, store) = store(&server);
        client.set_session(Some(session("jwt-123")));

        store.select("ingredientes", &Query::new()).await.unwrap();
        assert_eq!(server.last().header("authorization"), Some("Bearer jwt-123"));
    }

    #[tokio::test]
    async fn test_single_row_not_found_keeps_provider_code() {
        let server = StubServer::start(vec![(
            406,
            json!({
                "code": "PGRST116",
                "message": "JSON object requested, multiple (or no) rows returned",
                "details": "The result contains 0 rows",
                "hint": null
            }),
        )])
        .await;
        let (_client, store) = store(&server);

        let err = store
            .select_single("recipe_ratings", &Query::new().eq("recipe_id", 1))
            .await
            .unwrap_err();
        assert!(err.is_no_rows());
        assert_eq!(server.last().header("accept"), Some(SINGLE_OBJECT));
    }

    #[tokio::test]
    async fn test_other_errors_are_not_no_rows() {
        let server = StubServer::start(vec![(
            401,
            json!({"code": "42501", "message": "permission denied for table recipe_ratings"}),
        )])
        .await;
        let (_client, store) = store(&server);
        let err = store.select("recipe_ratings", &Query::new()).await.unwrap_err();
        assert!(!err.is_no_rows());
        assert!(err.to_string().contains("42501"));
    }

    #[tokio::test]
    async fn test_insert_update_delete_wire_format() {
        let server = StubServer::start(vec![
            (201, json!([{"id": 5, "recipe_id": 42}])),
            (200, json!([])),
            (200, json!([{"id": 5}])),
        ])
        .await;
        let (_client, store) = store(&server);
        let filters = [Filter::new("user_id", "u-1"), Filter::new("recipe_id", 42)];

        let inserted = store
            .insert("user_favorites", json!({"user_id": "u-1", "recipe_id": 42}))
            .await
            .unwrap();
        assert_eq!(inserted[0]["id"], 5);

        let updated = store
            .update("user_favorites", &filters, json!({"recipe_title": "Bolo"}))
            .await
            .unwrap();
        assert!(updated.is_empty());

        let deleted = store.delete("user_favorites", &filters).await.unwrap();
        assert_eq!(deleted.len(), 1);

        let reqs = server.requests();
        assert_eq!(reqs[0].method, Method::POST);
        assert_eq!(reqs[0].json(), json!([{"user_id": "u-1", "recipe_id": 42}]));
        assert_eq!(reqs[0].header("prefer"), Some(RETURN_ROWS));
        assert_eq!(reqs[1].method, Method::PATCH);
        assert_eq!(reqs[1].json(), json!({"recipe_title": "Bolo"}));
        assert!(
            reqs[1]
                .query_pairs()
                .contains(&("recipe_id".to_string(), "eq.42".to_string()))
        );
        assert_eq!(reqs[2].method, Method::DELETE);
    }

    #[tokio::test]
    async fn test_save_rating_over_http_inserts_after_empty_update() {
        let server = StubServer::start(vec![
            (200, json!([])),
            (201, json!([{"id": 1, "ratingValue": 4.5}])),
        ])
        .await;
        let (_client, store) = store(&server);
        let gateway = Gateway::new(Arc::new(store));
        let user = uuid::Uuid::new_v4();

        gateway
            .save_rating(user, 7, RatingValue::new(4.5).unwrap(), Some("bom"))
            .await
            .unwrap();

        let reqs = server.requests();
        assert_eq!(reqs.len(), 2);
        assert_eq!(reqs[0].method, Method::PATCH);
        assert_eq!(reqs[0].path, format!("/rest/v1/{RATINGS_TABLE}"));
        assert_eq!(reqs[1].method, Method::POST);
        let body = reqs[1].json();
        assert_eq!(body[0]["ratingValue"], 4.5);
        assert_eq!(body[0]["user_id"], user.to_string());
    }

    #[tokio::test]
    async fn test_unreachable_store_is_transport_error() {
        let client = Arc::new(Supabase::new("http://127.0.0.1:9", "anon", 2).unwrap());
        let err = RestStore::new(client)
            .select("ingredientes", &Query::new())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Transport(_)));
    }
}
