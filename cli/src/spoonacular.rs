use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Response;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::debug;

use pantry_core::error::ApiError;
use pantry_core::models::{IngredientSuggestion, RecipeDetail, RecipeId, RecipeSummary};
use pantry_core::service::RecipeApi;
use pantry_core::spoonacular::{
    AUTOCOMPLETE_COUNT, ApiFailure, AutocompleteHit, FindByIngredientsHit, RecipeInformation,
    SEARCH_RESULT_COUNT, hit_to_suggestion, hit_to_summary, information_to_detail,
};

pub struct SpoonacularClient {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
}

impl SpoonacularClient {
    pub fn new(base_url: &str, api_key: Option<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!(
                "pantry-cli/{} (recipe finder)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        })
    }

    fn key(&self) -> Result<&str, ApiError> {
        self.api_key.as_deref().ok_or(ApiError::MissingKey)
    }

    async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let key = self.key()?;
        debug!(path, "spoonacular request");
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .query(params)
            .query(&[("apiKey", key)])
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;
        let response = check(response).await?;
        response
            .json()
            .await
            .map_err(|e| ApiError::Decode(e.to_string()))
    }
}

async fn check(response: Response) -> Result<Response, ApiError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = serde_json::from_str::<ApiFailure>(&text)
        .ok()
        .and_then(|f| f.message)
        .unwrap_or(text);
    Err(ApiError::Status {
        status: status.as_u16(),
        message,
    })
}

#[async_trait]
impl RecipeApi for SpoonacularClient {
    async fn search_by_ingredients(
        &self,
        ingredients: &[String],
    ) -> Result<Vec<RecipeSummary>, ApiError> {
        let params = [
            ("ingredients", ingredients.join(",")),
            ("number", SEARCH_RESULT_COUNT.to_string()),
        ];
        let hits: Vec<FindByIngredientsHit> =
            self.get("/recipes/findByIngredients", &params).await?;
        Ok(hits.into_iter().map(hit_to_summary).collect())
    }

    async fn recipe_details(&self, id: RecipeId) -> Result<RecipeDetail, ApiError> {
        let info: RecipeInformation = self
            .get(&format!("/recipes/{id}/information"), &[])
            .await?;
        Ok(information_to_detail(info))
    }

    async fn autocomplete_ingredients(
        &self,
        query: &str,
    ) -> Result<Vec<IngredientSuggestion>, ApiError> {
        let params = [
            ("query", query.to_string()),
            ("number", AUTOCOMPLETE_COUNT.to_string()),
        ];
        let hits: Vec<AutocompleteHit> = self.get("/food/ingredients/autocomplete", &params).await?;
        Ok(hits.into_iter().map(hit_to_suggestion).collect())
    }
}
