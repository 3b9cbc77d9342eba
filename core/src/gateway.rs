use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use crate::error::StoreError;
use crate::models::{
    FAVORITES_TABLE, Favorite, FavoriteRow, INGREDIENTS_TABLE, IngredientRow, RATINGS_TABLE,
    Rating, RatingRow, RatingValue, RecipeId, UserId,
};
use crate::store::{DataStore, Filter, Query};

/// Typed access to the backend tables.
///
/// Errors pass through unchanged, except that "no rows" (as classified by the
/// provider) becomes `None` / `false` / an empty list.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<dyn DataStore>,
}

fn decode<T: DeserializeOwned>(row: Value) -> Result<T, StoreError> {
    Ok(serde_json::from_value(row)?)
}

fn decode_all<T: DeserializeOwned>(rows: Vec<Value>) -> Result<Vec<T>, StoreError> {
    rows.into_iter().map(decode).collect()
}

fn record<T: Serialize>(value: &T) -> Result<Value, StoreError> {
    Ok(serde_json::to_value(value)?)
}

fn user_recipe(user_id: UserId, recipe_id: RecipeId) -> [Filter; 2] {
    [
        Filter::new("user_id", user_id.to_string()),
        Filter::new("recipe_id", recipe_id),
    ]
}

impl Gateway {
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    // --- Generic CRUD ---

    pub async fn create<T: Serialize + Sync>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<Vec<Value>, StoreError> {
        self.store.insert(table, record(data)?).await
    }

    pub async fn update<T: Serialize + Sync>(
        &self,
        table: &str,
        data: &T,
        id: i64,
    ) -> Result<Vec<Value>, StoreError> {
        self.store
            .update(table, &[Filter::new("id", id)], record(data)?)
            .await
    }

    pub async fn delete(&self, table: &str, id: i64) -> Result<Vec<Value>, StoreError> {
        self.store.delete(table, &[Filter::new("id", id)]).await
    }

    pub async fn find(&self, table: &str, id: i64) -> Result<Option<Value>, StoreError> {
        let rows = self
            .store
            .select(table, &Query::new().eq("id", id).limit(1))
            .await?;
        Ok(rows.into_iter().next())
    }

    pub async fn list(&self, table: &str) -> Result<Vec<Value>, StoreError> {
        self.store
            .select(table, &Query::new())
            .await
            .inspect_err(|e| error!("Error listing table {table}: {e}"))
    }

    // --- Ingredients ---

    pub async fn get_translated_ingredients(&self) -> Result<Vec<IngredientRow>, StoreError> {
        let rows = self
            .store
            .select(INGREDIENTS_TABLE, &Query::new().columns("id, nome_pt, nome_en"))
            .await
            .inspect_err(|e| error!("Error fetching translated ingredients: {e}"))?;
        decode_all(rows)
    }

    // --- Favorites ---

    pub async fn get_user_favorites(&self, user_id: UserId) -> Result<Vec<FavoriteRow>, StoreError> {
        let query = Query::new()
            .columns("id, recipe_id, recipe_title")
            .eq("user_id", user_id.to_string());
        let rows = self
            .store
            .select(FAVORITES_TABLE, &query)
            .await
            .inspect_err(|e| error!("Error fetching user favorites: {e}"))?;
        decode_all(rows)
    }

    /// The favorite row for `(user_id, recipe_id)`, if any. Its presence is the
    /// favorited state.
    pub async fn favorite(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<Option<FavoriteRow>, StoreError> {
        let query = Query::new()
            .columns("id, recipe_id, recipe_title")
            .eq("user_id", user_id.to_string())
            .eq("recipe_id", recipe_id)
            .limit(1);
        let rows = self.store.select(FAVORITES_TABLE, &query).await?;
        rows.into_iter().next().map(decode).transpose()
    }

    pub async fn is_favorited(&self, user_id: UserId, recipe_id: RecipeId) -> Result<bool, StoreError> {
        Ok(self.favorite(user_id, recipe_id).await?.is_some())
    }

    /// Delete when `currently_favorited`, insert otherwise. Returns the new state.
    ///
    /// The caller's flag is trusted; no existence check is made first.
    pub async fn toggle_favorite(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        recipe_title: &str,
        currently_favorited: bool,
    ) -> Result<bool, StoreError> {
        if currently_favorited {
            debug!(%user_id, recipe_id, "removing favorite");
            self.store
                .delete(FAVORITES_TABLE, &user_recipe(user_id, recipe_id))
                .await?;
            Ok(false)
        } else {
            debug!(%user_id, recipe_id, "adding favorite");
            let favorite = Favorite {
                user_id,
                recipe_id,
                recipe_title: recipe_title.to_string(),
            };
            self.create(FAVORITES_TABLE, &favorite).await?;
            Ok(true)
        }
    }

    // --- Ratings ---

    pub async fn get_single_recipe_rating(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<Option<RatingRow>, StoreError> {
        let query = Query::new()
            .columns("ratingValue, comment")
            .eq("user_id", user_id.to_string())
            .eq("recipe_id", recipe_id);
        match self.store.select_single(RATINGS_TABLE, &query).await {
            Ok(row) => decode(row).map(Some),
            Err(e) if e.is_no_rows() => Ok(None),
            Err(e) => {
                error!("Error fetching single rating: {e}");
                Err(e)
            }
        }
    }

    /// Update the `(user_id, recipe_id)` row, inserting it when the update
    /// touched nothing.
    ///
    /// Not atomic: two concurrent writers for the same pair can both insert.
    pub async fn save_rating(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        rating_value: RatingValue,
        comment: Option<&str>,
    ) -> Result<(), StoreError> {
        // Without a comment the stored one is left as it is.
        let mut patch = serde_json::json!({ "ratingValue": rating_value.value() });
        if let Some(comment) = comment {
            patch["comment"] = serde_json::Value::from(comment);
        }

        let updated = match self
            .store
            .update(RATINGS_TABLE, &user_recipe(user_id, recipe_id), patch)
            .await
        {
            Ok(rows) => rows,
            Err(e) if e.is_no_rows() => Vec::new(),
            Err(e) => return Err(e),
        };

        if updated.is_empty() {
            debug!(%user_id, recipe_id, "no rating row yet, inserting");
            let rating = Rating {
                user_id,
                recipe_id,
                rating_value,
                comment: comment.map(str::to_string),
            };
            self.create(RATINGS_TABLE, &rating).await?;
        }

        Ok(())
    }
}
