use serde::Serialize;
use tracing::{debug, warn};

use crate::error::CatalogLoadError;
use crate::gateway::Gateway;
use crate::models::{Ingredient, IngredientRow};

/// The translated ingredient list, loaded once per session and read-only after.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Catalog {
    ingredients: Vec<Ingredient>,
}

impl Catalog {
    #[must_use]
    pub fn new(ingredients: Vec<Ingredient>) -> Self {
        Self { ingredients }
    }

    #[must_use]
    pub fn from_rows(rows: Vec<IngredientRow>) -> Self {
        Self::new(rows.into_iter().filter_map(normalize_row).collect())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Ingredient> {
        self.ingredients.iter()
    }

    #[must_use]
    pub fn get(&self, name_key: &str) -> Option<&Ingredient> {
        self.ingredients.iter().find(|i| i.name_key == name_key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ingredients.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ingredients.is_empty()
    }
}

/// Fetch and normalize the translated ingredient table.
///
/// Zero rows is a valid, empty catalog; only a failed fetch is an error.
pub async fn load_catalog(gateway: &Gateway) -> Result<Catalog, CatalogLoadError> {
    let rows = gateway
        .get_translated_ingredients()
        .await
        .map_err(CatalogLoadError)?;
    let catalog = Catalog::from_rows(rows);
    debug!(count = catalog.len(), "ingredient catalog loaded");
    Ok(catalog)
}

/// Derive the display form of a raw row. Rows without a localized name are skipped.
#[must_use]
pub fn normalize_row(row: IngredientRow) -> Option<Ingredient> {
    let local = row.nome_pt.trim();
    let Some(first) = local.chars().next() else {
        warn!(id = row.id, "skipping ingredient without a localized name");
        return None;
    };

    let icon: String = first.to_uppercase().collect();
    let display_name = format!("{icon}{}", &local[first.len_utf8()..]);

    Some(Ingredient {
        id: row.id,
        name_key: row.nome_en.trim().to_lowercase(),
        display_name,
        icon,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::memory::{MemoryStore, Op};
    use crate::models::INGREDIENTS_TABLE;
    use serde_json::json;
    use std::sync::Arc;

    fn row(id: i64, pt: &str, en: &str) -> IngredientRow {
        IngredientRow {
            id,
            nome_pt: pt.to_string(),
            nome_en: en.to_string(),
        }
    }

    #[test]
    fn test_normalize_row() {
        let ing = normalize_row(row(1, "tomate", "Tomato")).unwrap();
        assert_eq!(ing.name_key, "tomato");
        assert_eq!(ing.display_name, "Tomate");
        assert_eq!(ing.icon, "T");
    }

    #[test]
    fn test_normalize_row_unicode_first_letter() {
        let ing = normalize_row(row(2, "óleo de oliva", "Olive Oil")).unwrap();
        assert_eq!(ing.display_name, "Óleo de oliva");
        assert_eq!(ing.icon, "Ó");
        assert_eq!(ing.name_key, "olive oil");
    }

    #[test]
    fn test_normalize_row_blank_name_skipped() {
        assert!(normalize_row(row(3, "  ", "salt")).is_none());
    }

    #[tokio::test]
    async fn test_load_catalog_empty_is_ok() {
        let store = Arc::new(MemoryStore::new());
        let catalog = load_catalog(&Gateway::new(store)).await.unwrap();
        assert!(catalog.is_empty());
    }

    #[tokio::test]
    async fn test_load_catalog_maps_rows() {
        let store = Arc::new(MemoryStore::new());
        store.seed(
            INGREDIENTS_TABLE,
            vec![
                json!({"id": 1, "nome_pt": "tomate", "nome_en": "tomato"}),
                json!({"id": 2, "nome_pt": "ovo", "nome_en": "Egg"}),
            ],
        );
        let catalog = load_catalog(&Gateway::new(store)).await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.get("egg").unwrap().display_name, "Ovo");
    }

    #[tokio::test]
    async fn test_load_catalog_failure() {
        let store = Arc::new(MemoryStore::new());
        store.fail_next(
            INGREDIENTS_TABLE,
            Op::Select,
            StoreError::Transport("offline".to_string()),
        );
        let err = load_catalog(&Gateway::new(store)).await.unwrap_err();
        assert!(err.user_message().contains("ingredientes"));
    }
}
