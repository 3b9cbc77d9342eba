use serde::Deserialize;

use crate::models::{IngredientSuggestion, RecipeDetail, RecipeIngredient, RecipeSummary};

/// Number of recipes requested per ingredient search.
pub const SEARCH_RESULT_COUNT: u32 = 10;
/// Number of suggestions requested per autocomplete query.
pub const AUTOCOMPLETE_COUNT: u32 = 20;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FindByIngredientsHit {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    #[serde(default)]
    pub used_ingredient_count: u32,
    #[serde(default)]
    pub missed_ingredient_count: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeInformation {
    pub id: i64,
    pub title: String,
    pub image: Option<String>,
    pub ready_in_minutes: Option<u32>,
    pub servings: Option<u32>,
    pub instructions: Option<String>,
    pub summary: Option<String>,
    #[serde(default)]
    pub extended_ingredients: Vec<ExtendedIngredient>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtendedIngredient {
    pub name: Option<String>,
    pub name_clean: Option<String>,
    #[serde(default)]
    pub amount: f64,
    #[serde(default)]
    pub unit: String,
}

#[derive(Debug, Deserialize)]
pub struct AutocompleteHit {
    pub name: String,
    pub image: Option<String>,
}

/// Error body returned on non-2xx responses.
#[derive(Debug, Deserialize)]
pub struct ApiFailure {
    pub message: Option<String>,
}

#[must_use]
pub fn hit_to_summary(hit: FindByIngredientsHit) -> RecipeSummary {
    RecipeSummary {
        id: hit.id,
        title: hit.title,
        image: hit.image.filter(|i| !i.is_empty()),
        used_ingredient_count: hit.used_ingredient_count,
        missed_ingredient_count: hit.missed_ingredient_count,
    }
}

#[must_use]
pub fn information_to_detail(info: RecipeInformation) -> RecipeDetail {
    let raw = info
        .instructions
        .filter(|i| !i.trim().is_empty())
        .or(info.summary)
        .unwrap_or_default();

    let ingredients = info
        .extended_ingredients
        .into_iter()
        .filter_map(|ing| {
            let name = ing.name_clean.or(ing.name).filter(|n| !n.is_empty())?;
            Some(RecipeIngredient {
                name,
                amount: ing.amount,
                unit: ing.unit,
            })
        })
        .collect();

    RecipeDetail {
        id: info.id,
        title: info.title,
        image: info.image.filter(|i| !i.is_empty()),
        ready_in_minutes: info.ready_in_minutes,
        servings: info.servings,
        instructions: strip_markup(&raw),
        ingredients,
    }
}

#[must_use]
pub fn hit_to_suggestion(hit: AutocompleteHit) -> IngredientSuggestion {
    IngredientSuggestion {
        name: hit.name,
        image: hit.image,
    }
}

/// Reduce HTML to its text content: tags dropped, common entities decoded.
#[must_use]
pub fn strip_markup(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars();
    // Set once no '>' is left, so every later '<' is text.
    let mut unclosed = false;

    while let Some(c) = chars.next() {
        match c {
            '<' if !unclosed => {
                // Skip to the end of the tag. A lone '<' with no '>' is text.
                let mut tag = chars.clone();
                if tag.by_ref().any(|t| t == '>') {
                    chars = tag;
                } else {
                    unclosed = true;
                    out.push(c);
                }
            }
            '&' => {
                let mut entity = String::new();
                let mut lookahead = chars.clone();
                let mut closed = false;
                for e in lookahead.by_ref().take(10) {
                    if e == ';' {
                        closed = true;
                        break;
                    }
                    entity.push(e);
                }
                match closed.then(|| decode_entity(&entity)).flatten() {
                    Some(decoded) => {
                        out.push(decoded);
                        chars = lookahead;
                    }
                    None => out.push(c),
                }
            }
            _ => out.push(c),
        }
    }

    out.trim().to_string()
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some('\u{a0}'),
        _ => {
            let num = entity.strip_prefix('#')?;
            let code = match num.strip_prefix(['x', 'X']) {
                Some(hex) => u32::from_str_radix(hex, 16).ok()?,
                None => num.parse().ok()?,
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info() -> RecipeInformation {
        serde_json::from_value(serde_json::json!({
            "id": 716429,
            "title": "Pasta with Garlic",
            "image": "https://img.spoonacular.com/recipes/716429-556x370.jpg",
            "readyInMinutes": 45,
            "servings": 2,
            "instructions": "<ol><li>Boil the pasta.</li><li>Add garlic &amp; oil.</li></ol>",
            "summary": "<b>Quick</b> pasta",
            "extendedIngredients": [
                {"name": "garlic", "nameClean": "garlic", "amount": 2.0, "unit": "cloves"},
                {"name": "pasta", "nameClean": null, "amount": 200.0, "unit": "g"},
                {"name": "", "nameClean": null, "amount": 1.0, "unit": ""}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn test_information_to_detail() {
        let detail = information_to_detail(info());
        assert_eq!(detail.id, 716429);
        assert_eq!(detail.ready_in_minutes, Some(45));
        assert_eq!(detail.instructions, "Boil the pasta.Add garlic & oil.");
        assert_eq!(detail.ingredients.len(), 2);
        assert_eq!(detail.ingredients[1].name, "pasta");
    }

    #[test]
    fn test_instructions_fall_back_to_summary() {
        let mut i = info();
        i.instructions = Some("  ".to_string());
        assert_eq!(information_to_detail(i).instructions, "Quick pasta");

        let mut i = info();
        i.instructions = None;
        i.summary = None;
        assert_eq!(information_to_detail(i).instructions, "");
    }

    #[test]
    fn test_hit_to_summary() {
        let hit: FindByIngredientsHit = serde_json::from_value(serde_json::json!({
            "id": 1,
            "title": "Tomato Soup",
            "image": "",
            "usedIngredientCount": 2,
            "missedIngredientCount": 1,
            "likes": 4
        }))
        .unwrap();
        let summary = hit_to_summary(hit);
        assert_eq!(summary.title, "Tomato Soup");
        assert!(summary.image.is_none());
        assert_eq!(summary.used_ingredient_count, 2);
        assert_eq!(summary.missed_ingredient_count, 1);
    }

    #[test]
    fn test_strip_markup_entities() {
        assert_eq!(strip_markup("a &lt;b&gt; c"), "a <b> c");
        assert_eq!(strip_markup("caf&#233; &#x41;"), "café A");
        assert_eq!(strip_markup("salt & pepper"), "salt & pepper");
        assert_eq!(strip_markup("&unknown; x"), "&unknown; x");
    }

    #[test]
    fn test_strip_markup_large_input_is_linear() {
        let html = "<b>x</b>".repeat(20_000);
        let start = std::time::Instant::now();
        assert_eq!(strip_markup(&html), "x".repeat(20_000));

        let lone = "< ".repeat(50_000);
        assert_eq!(strip_markup(&lone), lone.trim());
        assert!(start.elapsed() < std::time::Duration::from_secs(5));
    }

    #[test]
    fn test_strip_markup_tags() {
        assert_eq!(strip_markup("<p>Mix <i>well</i>.</p>"), "Mix well.");
        assert_eq!(strip_markup("2 < 3"), "2 < 3");
        assert_eq!(strip_markup("a < b <i>c</i>"), "a c");
        assert_eq!(strip_markup("1 < 2 < 3"), "1 < 2 < 3");
        assert_eq!(strip_markup(""), "");
    }
}
