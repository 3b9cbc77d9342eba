use tracing::{debug, error};

use crate::error::{SEARCH_FAILED, SearchError};
use crate::models::{RecipeSummary, SelectionSet};
use crate::service::RecipeApi;

/// Run one ingredient search. An empty selection never reaches the API.
pub async fn search_recipes(
    api: &dyn RecipeApi,
    selection: &SelectionSet,
) -> Result<Vec<RecipeSummary>, SearchError> {
    if selection.is_empty() {
        return Err(SearchError::EmptySelection);
    }
    let ingredients = selection.to_vec();
    debug!(?ingredients, "searching recipes");
    let results = api.search_by_ingredients(&ingredients).await?;
    debug!(count = results.len(), "recipe search finished");
    Ok(results)
}

/// Results, loading flag and error message of the search page.
#[derive(Debug, Default)]
pub struct SearchOrchestrator {
    results: Vec<RecipeSummary>,
    loading: bool,
    error: Option<&'static str>,
}

impl SearchOrchestrator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn results(&self) -> &[RecipeSummary] {
        &self.results
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.loading
    }

    #[must_use]
    pub fn error(&self) -> Option<&'static str> {
        self.error
    }

    /// Replace the results with a fresh search for `selection`.
    ///
    /// Previous results are dropped before the request goes out. On failure the
    /// provider error is logged and only the generic message is kept.
    pub async fn search(&mut self, api: &dyn RecipeApi, selection: &SelectionSet) -> &[RecipeSummary] {
        self.results.clear();
        self.error = None;
        self.loading = true;

        match search_recipes(api, selection).await {
            Ok(results) => self.results = results,
            Err(SearchError::EmptySelection) => {
                debug!("search skipped: empty selection");
            }
            Err(SearchError::Api(source)) => {
                error!("Error searching recipes: {source}");
                self.error = Some(SEARCH_FAILED);
            }
        }

        self.loading = false;
        &self.results
    }
}
