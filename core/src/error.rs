use thiserror::Error;

use crate::models::RecipeId;

/// PostgREST code for "the result contains 0 rows" on a single-object request.
pub const NO_ROWS_CODE: &str = "PGRST116";

// User-facing messages. Auth errors are the only ones that are not fixed text.
pub const CATALOG_LOAD_FAILED: &str = "Não foi possível carregar os ingredientes do banco de dados.";
pub const SEARCH_FAILED: &str = "Não foi possível buscar as receitas. Verifique sua chave de API.";
pub const DETAIL_LOAD_FAILED: &str = "Não foi possível carregar os detalhes desta receita.";
pub const FAVORITES_LOAD_FAILED: &str = "Não foi possível carregar suas receitas favoritas.";
pub const FAVORITES_PARTIAL_FAILURE: &str =
    "Algumas receitas não puderam ser carregadas (erro na API).";
pub const FAVORITE_TOGGLE_FAILED: &str = "Erro ao salvar favorito.";
pub const RATING_SAVE_FAILED: &str = "Erro ao salvar a classificação.";
pub const RATING_REQUIRED: &str = "Por favor, dê uma nota antes de salvar o comentário.";
pub const NOT_SIGNED_IN: &str = "Faça login para continuar.";

/// Failure reported by the table store.
#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Transport(String),

    /// The provider answered with an error body. `code` is the provider's own
    /// classification (e.g. `PGRST116`), used to tell "no rows" from a failed query.
    #[error("store error {status}{}: {message}", fmt_code(.code.as_deref()))]
    Provider {
        status: u16,
        code: Option<String>,
        message: String,
    },

    #[error("malformed store response: {0}")]
    Decode(String),
}

fn fmt_code(code: Option<&str>) -> String {
    code.map(|c| format!(" ({c})")).unwrap_or_default()
}

impl StoreError {
    #[must_use]
    pub fn no_rows() -> Self {
        Self::Provider {
            status: 406,
            code: Some(NO_ROWS_CODE.to_string()),
            message: "JSON object requested, multiple (or no) rows returned".to_string(),
        }
    }

    #[must_use]
    pub fn is_no_rows(&self) -> bool {
        matches!(self, Self::Provider { code: Some(code), .. } if code == NO_ROWS_CODE)
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}

/// Failure reported by the third-party recipe API.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("recipe API key is not configured")]
    MissingKey,

    #[error("recipe API unreachable: {0}")]
    Transport(String),

    #[error("recipe API returned {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed recipe API response: {0}")]
    Decode(String),
}

#[derive(Debug, Error)]
#[error("failed to load ingredient catalog")]
pub struct CatalogLoadError(#[source] pub StoreError);

impl CatalogLoadError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        CATALOG_LOAD_FAILED
    }
}

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("no ingredients selected")]
    EmptySelection,

    #[error("recipe search failed")]
    Api(#[from] ApiError),
}

impl SearchError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        SEARCH_FAILED
    }
}

/// Per-recipe failure inside a favorites batch. Never halts the batch.
#[derive(Debug, Error)]
pub enum DetailFetchError {
    #[error("recipe {recipe_id}: details unavailable")]
    Detail {
        recipe_id: RecipeId,
        #[source]
        source: ApiError,
    },

    #[error("recipe {recipe_id}: rating unavailable")]
    Rating {
        recipe_id: RecipeId,
        #[source]
        source: StoreError,
    },

    #[error("recipe {recipe_id}: favorite state unavailable")]
    Favorite {
        recipe_id: RecipeId,
        #[source]
        source: StoreError,
    },
}

impl DetailFetchError {
    #[must_use]
    pub fn recipe_id(&self) -> RecipeId {
        match self {
            Self::Detail { recipe_id, .. }
            | Self::Rating { recipe_id, .. }
            | Self::Favorite { recipe_id, .. } => *recipe_id,
        }
    }

    #[must_use]
    pub fn user_message(&self) -> &'static str {
        DETAIL_LOAD_FAILED
    }
}

#[derive(Debug, Error)]
#[error("failed to load favorites")]
pub struct FavoritesLoadError(#[source] pub StoreError);

impl FavoritesLoadError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        FAVORITES_LOAD_FAILED
    }
}

#[derive(Debug, Error)]
#[error("failed to toggle favorite for recipe {recipe_id}")]
pub struct FavoriteToggleError {
    pub recipe_id: RecipeId,
    #[source]
    pub source: StoreError,
}

impl FavoriteToggleError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        FAVORITE_TOGGLE_FAILED
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
#[error("invalid rating {0}: must be between 0 and 5 in steps of 0.5")]
pub struct InvalidRating(pub f64);

#[derive(Debug, Error)]
pub enum RatingSaveError {
    /// Nothing to save: neither the new value nor the last known one is nonzero.
    #[error("a nonzero rating is required")]
    MissingRating,

    #[error(transparent)]
    Invalid(#[from] InvalidRating),

    #[error("failed to save rating")]
    Store(#[from] StoreError),
}

impl RatingSaveError {
    #[must_use]
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::MissingRating => RATING_REQUIRED,
            Self::Invalid(_) | Self::Store(_) => RATING_SAVE_FAILED,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("not signed in")]
    NotSignedIn,

    /// Form validation that happens before the provider is contacted.
    #[error("{0}")]
    Validation(&'static str),

    /// Message from the identity provider, shown verbatim.
    #[error("{0}")]
    Provider(String),

    #[error("identity provider unreachable: {0}")]
    Transport(String),
}

impl AuthError {
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotSignedIn => NOT_SIGNED_IN.to_string(),
            Self::Validation(msg) => (*msg).to_string(),
            Self::Provider(msg) => msg.clone(),
            Self::Transport(msg) => msg.clone(),
        }
    }
}
