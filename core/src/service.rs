use std::sync::Arc;

use async_trait::async_trait;

use crate::catalog::{self, Catalog};
use crate::error::{ApiError, CatalogLoadError, SearchError};
use crate::gateway::Gateway;
use crate::models::{IngredientSuggestion, RecipeDetail, RecipeId, RecipeSummary, SelectionSet};
use crate::reconcile::Reconciler;
use crate::search;
use crate::store::DataStore;

/// Third-party recipe lookup.
///
/// The CLI implements this with reqwest against Spoonacular; tests use stubs.
#[async_trait]
pub trait RecipeApi: Send + Sync {
    /// Recipes that use the given ingredients (canonical English names).
    async fn search_by_ingredients(
        &self,
        ingredients: &[String],
    ) -> Result<Vec<RecipeSummary>, ApiError>;

    async fn recipe_details(&self, id: RecipeId) -> Result<RecipeDetail, ApiError>;

    async fn autocomplete_ingredients(
        &self,
        query: &str,
    ) -> Result<Vec<IngredientSuggestion>, ApiError>;
}

/// Entry point that wires the table store and the recipe API together.
#[derive(Clone)]
pub struct PantryService {
    gateway: Gateway,
    api: Arc<dyn RecipeApi>,
    reconciler: Arc<Reconciler>,
}

impl PantryService {
    pub fn new(store: Arc<dyn DataStore>, api: Arc<dyn RecipeApi>) -> Self {
        let gateway = Gateway::new(store);
        let reconciler = Arc::new(Reconciler::new(gateway.clone(), Arc::clone(&api)));
        Self {
            gateway,
            api,
            reconciler,
        }
    }

    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    #[must_use]
    pub fn api(&self) -> &dyn RecipeApi {
        self.api.as_ref()
    }

    #[must_use]
    pub fn reconciler(&self) -> &Reconciler {
        &self.reconciler
    }

    pub async fn load_catalog(&self) -> Result<Catalog, CatalogLoadError> {
        catalog::load_catalog(&self.gateway).await
    }

    pub async fn search(&self, selection: &SelectionSet) -> Result<Vec<RecipeSummary>, SearchError> {
        search::search_recipes(self.api.as_ref(), selection).await
    }

    pub async fn recipe_details(&self, id: RecipeId) -> Result<RecipeDetail, ApiError> {
        self.api.recipe_details(id).await
    }

    pub async fn autocomplete(&self, query: &str) -> Result<Vec<IngredientSuggestion>, ApiError> {
        self.api.autocomplete_ingredients(query).await
    }
}
