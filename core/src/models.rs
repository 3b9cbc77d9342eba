use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::InvalidRating;

pub type UserId = Uuid;
pub type RecipeId = i64;

pub const INGREDIENTS_TABLE: &str = "ingredientes";
pub const FAVORITES_TABLE: &str = "user_favorites";
pub const RATINGS_TABLE: &str = "recipe_ratings";

/// Shown for favorites whose recipe has no image.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.png";

// --- Ingredients ---

/// Raw row of the translated ingredient table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientRow {
    pub id: i64,
    pub nome_pt: String,
    pub nome_en: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Ingredient {
    pub id: i64,
    /// Lowercased English name, the value sent to the recipe API.
    pub name_key: String,
    /// Portuguese name with the first letter capitalized.
    pub display_name: String,
    pub icon: String,
}

/// The user's picked ingredients, keyed by `name_key`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SelectionSet(BTreeSet<String>);

impl SelectionSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds `name_key` if absent, removes it if present. Returns whether it is now selected.
    pub fn toggle(&mut self, name_key: &str) -> bool {
        if self.0.remove(name_key) {
            false
        } else {
            self.0.insert(name_key.to_string());
            true
        }
    }

    #[must_use]
    pub fn contains(&self, name_key: &str) -> bool {
        self.0.contains(name_key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for SelectionSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

// --- Recipes ---

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeSummary {
    pub id: RecipeId,
    pub title: String,
    pub image: Option<String>,
    pub used_ingredient_count: u32,
    pub missed_ingredient_count: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeDetail {
    pub id: RecipeId,
    pub title: String,
    pub image: Option<String>,
    pub ready_in_minutes: Option<u32>,
    pub servings: Option<u32>,
    /// Plain text, markup already stripped. Empty when the API has none.
    pub instructions: String,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecipeIngredient {
    pub name: String,
    pub amount: f64,
    pub unit: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IngredientSuggestion {
    pub name: String,
    pub image: Option<String>,
}

// --- Favorites ---

/// A `user_favorites` row as selected for one user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FavoriteRow {
    pub id: i64,
    pub recipe_id: RecipeId,
    pub recipe_title: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Favorite {
    pub user_id: UserId,
    pub recipe_id: RecipeId,
    pub recipe_title: String,
}

// --- Ratings ---

/// A star rating between 0 and 5 in half steps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct RatingValue(u8);

impl RatingValue {
    pub const MAX: f64 = 5.0;

    pub fn new(value: f64) -> Result<Self, InvalidRating> {
        if !value.is_finite() || !(0.0..=Self::MAX).contains(&value) {
            return Err(InvalidRating(value));
        }
        let halves = value * 2.0;
        if (halves - halves.round()).abs() > f64::EPSILON {
            return Err(InvalidRating(value));
        }
        #[allow(clippy::cast_sign_loss)]
        Ok(Self(halves.round() as u8))
    }

    #[must_use]
    pub fn value(self) -> f64 {
        f64::from(self.0) / 2.0
    }

    #[must_use]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }
}

impl TryFrom<f64> for RatingValue {
    type Error = InvalidRating;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<RatingValue> for f64 {
    fn from(rating: RatingValue) -> Self {
        rating.value()
    }
}

impl fmt::Display for RatingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.1}", self.value())
    }
}

/// A full `recipe_ratings` row, keyed by `(user_id, recipe_id)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rating {
    pub user_id: UserId,
    pub recipe_id: RecipeId,
    #[serde(rename = "ratingValue")]
    pub rating_value: RatingValue,
    pub comment: Option<String>,
}

/// The columns read back for a single rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RatingRow {
    #[serde(rename = "ratingValue")]
    pub rating_value: RatingValue,
    pub comment: Option<String>,
}

// --- View models ---

/// A favorite joined with its recipe image and the user's rating.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoriteViewModel {
    pub recipe_id: RecipeId,
    pub recipe_title: String,
    pub image: String,
    pub user_rating: Option<RatingValue>,
}

impl FavoriteViewModel {
    #[must_use]
    pub fn rating_label(&self) -> String {
        self.user_rating
            .filter(|r| !r.is_zero())
            .map_or_else(|| "N/A".to_string(), |r| r.to_string())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FavoritesView {
    pub entries: Vec<FavoriteViewModel>,
    /// Recipes left out because their detail or rating fetch failed.
    pub dropped: Vec<RecipeId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<&'static str>,
}

/// Load status of a page's primary data. Keeps "empty" apart from "failed".
#[derive(Debug, Clone, PartialEq)]
pub enum LoadState<T> {
    Loading,
    Failed { message: String },
    Ready(T),
}

impl<T> LoadState<T> {
    #[must_use]
    pub fn is_loading(&self) -> bool {
        matches!(self, Self::Loading)
    }

    #[must_use]
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn error(&self) -> Option<&str> {
        match self {
            Self::Failed { message } => Some(message),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_is_its_own_inverse() {
        let original: SelectionSet = ["tomato", "egg"].into_iter().collect();
        for key in ["tomato", "egg", "flour", ""] {
            let mut s = original.clone();
            s.toggle(key);
            s.toggle(key);
            assert_eq!(s, original, "toggle twice with {key:?}");
        }
    }

    #[test]
    fn test_toggle_reports_membership() {
        let mut s = SelectionSet::new();
        assert!(s.toggle("tomato"));
        assert!(s.contains("tomato"));
        assert!(!s.toggle("tomato"));
        assert!(s.is_empty());
    }

    #[test]
    fn test_selection_vec_is_sorted() {
        let s: SelectionSet = ["onion", "egg", "tomato"].into_iter().collect();
        assert_eq!(s.to_vec(), vec!["egg", "onion", "tomato"]);
    }

    #[test]
    fn test_rating_value_half_steps() {
        assert_eq!(RatingValue::new(4.5).unwrap().value(), 4.5);
        assert_eq!(RatingValue::new(0.0).unwrap().value(), 0.0);
        assert_eq!(RatingValue::new(5.0).unwrap().value(), 5.0);
        assert!(RatingValue::new(0.0).unwrap().is_zero());
    }

    #[test]
    fn test_rating_value_rejects_invalid() {
        assert!(RatingValue::new(4.3).is_err());
        assert!(RatingValue::new(-0.5).is_err());
        assert!(RatingValue::new(5.5).is_err());
        assert!(RatingValue::new(f64::NAN).is_err());
        assert!(RatingValue::new(f64::INFINITY).is_err());
    }

    #[test]
    fn test_rating_serde_uses_column_names() {
        let rating = Rating {
            user_id: Uuid::nil(),
            recipe_id: 42,
            rating_value: RatingValue::new(3.5).unwrap(),
            comment: Some("Ótimo".to_string()),
        };
        let json = serde_json::to_value(&rating).unwrap();
        assert_eq!(json["ratingValue"], 3.5);
        assert_eq!(json["recipe_id"], 42);

        let row: RatingRow =
            serde_json::from_value(serde_json::json!({"ratingValue": 4, "comment": null})).unwrap();
        assert_eq!(row.rating_value.value(), 4.0);
        assert!(row.comment.is_none());

        let bad = serde_json::from_value::<RatingRow>(serde_json::json!({"ratingValue": 7}));
        assert!(bad.is_err());
    }

    #[test]
    fn test_rating_label() {
        let mut vm = FavoriteViewModel {
            recipe_id: 1,
            recipe_title: "Bolo".to_string(),
            image: PLACEHOLDER_IMAGE.to_string(),
            user_rating: None,
        };
        assert_eq!(vm.rating_label(), "N/A");
        vm.user_rating = Some(RatingValue::new(4.0).unwrap());
        assert_eq!(vm.rating_label(), "4.0");
        vm.user_rating = Some(RatingValue::new(0.0).unwrap());
        assert_eq!(vm.rating_label(), "N/A");
    }

    #[test]
    fn test_load_state_accessors() {
        let state: LoadState<Vec<i32>> = LoadState::Ready(vec![]);
        assert!(state.ready().unwrap().is_empty());
        assert!(state.error().is_none());

        let failed: LoadState<Vec<i32>> = LoadState::Failed {
            message: "x".to_string(),
        };
        assert_eq!(failed.error(), Some("x"));
        assert!(LoadState::<()>::Loading.is_loading());
    }
}
