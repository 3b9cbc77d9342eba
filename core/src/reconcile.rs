use std::error::Error as _;
use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::error::{
    DetailFetchError, FAVORITES_PARTIAL_FAILURE, FavoriteToggleError, FavoritesLoadError,
    RatingSaveError, StoreError,
};
use crate::gateway::Gateway;
use crate::models::{
    FavoriteRow, FavoriteViewModel, FavoritesView, PLACEHOLDER_IMAGE, RatingRow, RatingValue,
    RecipeDetail, RecipeId, UserId,
};
use crate::sequence::SettledMap;
use crate::service::RecipeApi;

/// Title written when a favorite is removed from the favorites list.
pub const REMOVED_FAVORITE_TITLE: &str = "Receita";

type Key = (UserId, RecipeId);

/// Everything the recipe page shows for one recipe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipePage {
    pub detail: RecipeDetail,
    /// `None` when nobody is signed in.
    pub favorited: Option<bool>,
    pub rating: Option<RatingRow>,
}

/// Joins favorites, recipe details and ratings, and performs the favorite and
/// rating writes.
///
/// The last settled favorite state and rating per `(user, recipe)` are kept so
/// that a late response never overwrites a newer one.
pub struct Reconciler {
    gateway: Gateway,
    api: Arc<dyn RecipeApi>,
    favorites: SettledMap<Key, bool>,
    ratings: SettledMap<Key, RatingRow>,
}

impl Reconciler {
    pub fn new(gateway: Gateway, api: Arc<dyn RecipeApi>) -> Self {
        Self {
            gateway,
            api,
            favorites: SettledMap::new(),
            ratings: SettledMap::new(),
        }
    }

    // --- Read path ---

    /// Build the favorites page for `user_id`.
    ///
    /// Failing to list favorites fails the whole load. Past that, each favorite
    /// is fetched on its own and dropped if its detail or rating fetch fails.
    pub async fn load_favorites(&self, user_id: UserId) -> Result<FavoritesView, FavoritesLoadError> {
        let favorites = self
            .gateway
            .get_user_favorites(user_id)
            .await
            .map_err(FavoritesLoadError)?;
        debug!(%user_id, count = favorites.len(), "loading favorite details");

        let settled = join_all(
            favorites
                .into_iter()
                .map(|favorite| self.view_model(user_id, favorite)),
        )
        .await;

        let mut entries = Vec::with_capacity(settled.len());
        let mut dropped = Vec::new();
        for result in settled {
            match result {
                Ok(entry) => entries.push(entry),
                Err(e) => {
                    let cause = e.source().map(|s| s.to_string()).unwrap_or_default();
                    warn!(recipe_id = e.recipe_id(), "Dropping favorite: {e}: {cause}");
                    dropped.push(e.recipe_id());
                }
            }
        }

        let warning = (!dropped.is_empty()).then_some(FAVORITES_PARTIAL_FAILURE);
        Ok(FavoritesView {
            entries,
            dropped,
            warning,
        })
    }

    async fn view_model(
        &self,
        user_id: UserId,
        favorite: FavoriteRow,
    ) -> Result<FavoriteViewModel, DetailFetchError> {
        let recipe_id = favorite.recipe_id;
        let (detail, rating) = futures::join!(
            self.api.recipe_details(recipe_id),
            self.gateway.get_single_recipe_rating(user_id, recipe_id),
        );
        let detail = detail.map_err(|source| DetailFetchError::Detail { recipe_id, source })?;
        let rating = rating.map_err(|source| DetailFetchError::Rating { recipe_id, source })?;

        Ok(FavoriteViewModel {
            recipe_id,
            recipe_title: favorite.recipe_title,
            image: detail.image.unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string()),
            user_rating: rating.map(|r| r.rating_value),
        })
    }

    /// Load the recipe page: details, plus favorite state and rating when a
    /// user is signed in.
    pub async fn open_recipe(
        &self,
        user_id: Option<UserId>,
        recipe_id: RecipeId,
    ) -> Result<RecipePage, DetailFetchError> {
        let Some(user_id) = user_id else {
            let detail = self
                .api
                .recipe_details(recipe_id)
                .await
                .map_err(|source| DetailFetchError::Detail { recipe_id, source })?;
            return Ok(RecipePage {
                detail,
                favorited: None,
                rating: None,
            });
        };

        let (detail, favorited, rating) = futures::join!(
            self.api.recipe_details(recipe_id),
            self.load_favorite_state(user_id, recipe_id),
            self.load_rating(user_id, recipe_id),
        );
        Ok(RecipePage {
            detail: detail.map_err(|source| DetailFetchError::Detail { recipe_id, source })?,
            favorited: Some(
                favorited.map_err(|source| DetailFetchError::Favorite { recipe_id, source })?,
            ),
            rating: rating.map_err(|source| DetailFetchError::Rating { recipe_id, source })?,
        })
    }

    // --- Favorites ---

    /// Last settled favorite state, if any request for it has settled.
    #[must_use]
    pub fn favorite_state(&self, user_id: UserId, recipe_id: RecipeId) -> Option<bool> {
        self.favorites.get(&(user_id, recipe_id))
    }

    /// Read the favorite state from the store.
    pub async fn load_favorite_state(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<bool, StoreError> {
        let key = (user_id, recipe_id);
        let ticket = self.favorites.begin(key);
        let fetched = self.gateway.is_favorited(user_id, recipe_id).await?;
        if self.favorites.settle(&ticket, fetched) {
            Ok(fetched)
        } else {
            Ok(self.favorites.get(&key).unwrap_or(fetched))
        }
    }

    /// Flip the favorite state, trusting `currently_favorited`.
    ///
    /// Returns the state after this request. On failure the settled state is
    /// left untouched.
    pub async fn toggle_favorite(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        recipe_title: &str,
        currently_favorited: bool,
    ) -> Result<bool, FavoriteToggleError> {
        let ticket = self.favorites.begin((user_id, recipe_id));
        let now = self
            .gateway
            .toggle_favorite(user_id, recipe_id, recipe_title, currently_favorited)
            .await
            .map_err(|source| {
                error!(recipe_id, "Error toggling favorite: {source}");
                FavoriteToggleError { recipe_id, source }
            })?;
        if !self.favorites.settle(&ticket, now) {
            debug!(recipe_id, "discarding late favorite toggle result");
        }
        Ok(now)
    }

    /// Remove a favorite from the favorites list. Callers reload the list after.
    pub async fn remove_favorite(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<(), FavoriteToggleError> {
        self.toggle_favorite(user_id, recipe_id, REMOVED_FAVORITE_TITLE, true)
            .await
            .map(|_| ())
    }

    // --- Ratings ---

    /// Last settled rating row for the pair.
    #[must_use]
    pub fn rating(&self, user_id: UserId, recipe_id: RecipeId) -> Option<RatingRow> {
        self.ratings.get(&(user_id, recipe_id))
    }

    /// Read the stored rating and remember it as the last known one.
    pub async fn load_rating(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
    ) -> Result<Option<RatingRow>, StoreError> {
        let key = (user_id, recipe_id);
        let ticket = self.ratings.begin(key);
        let fetched = self.gateway.get_single_recipe_rating(user_id, recipe_id).await?;
        match fetched {
            Some(row) => {
                if self.ratings.settle(&ticket, row.clone()) {
                    Ok(Some(row))
                } else {
                    Ok(self.ratings.get(&key))
                }
            }
            None => Ok(None),
        }
    }

    /// Save a star rating.
    ///
    /// A zero `value` keeps the last known rating. `comment` of `None` keeps
    /// the last known comment. Nothing is sent if the result is still zero.
    pub async fn rate(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        value: f64,
        comment: Option<&str>,
    ) -> Result<RatingValue, RatingSaveError> {
        let requested = RatingValue::new(value)?;
        let last = self.rating(user_id, recipe_id);
        let rating_value = if requested.is_zero() {
            last.as_ref().map_or(requested, |r| r.rating_value)
        } else {
            requested
        };
        let comment = comment
            .map(str::to_string)
            .or_else(|| last.and_then(|r| r.comment));
        self.save(user_id, recipe_id, rating_value, comment).await?;
        Ok(rating_value)
    }

    /// Save a comment along with the last known rating.
    pub async fn save_comment(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        comment: &str,
    ) -> Result<RatingValue, RatingSaveError> {
        let Some(last) = self.rating(user_id, recipe_id) else {
            return Err(RatingSaveError::MissingRating);
        };
        let rating_value = last.rating_value;
        self.save(user_id, recipe_id, rating_value, Some(comment.to_string()))
            .await?;
        Ok(rating_value)
    }

    async fn save(
        &self,
        user_id: UserId,
        recipe_id: RecipeId,
        rating_value: RatingValue,
        comment: Option<String>,
    ) -> Result<(), RatingSaveError> {
        if rating_value.is_zero() {
            return Err(RatingSaveError::MissingRating);
        }
        let ticket = self.ratings.begin((user_id, recipe_id));
        self.gateway
            .save_rating(user_id, recipe_id, rating_value, comment.as_deref())
            .await
            .inspect_err(|e| error!(recipe_id, "Error saving rating: {e}"))?;
        let row = RatingRow {
            rating_value,
            comment,
        };
        if !self.ratings.settle(&ticket, row) {
            debug!(recipe_id, "discarding late rating save result");
        }
        Ok(())
    }
}
