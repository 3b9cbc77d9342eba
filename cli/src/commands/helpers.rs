use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use pantry_core::models::{FavoriteViewModel, Ingredient, RecipeSummary, SelectionSet};
use pantry_core::reconcile::RecipePage;

pub(crate) const NO_INSTRUCTIONS: &str = "Modo de preparo detalhado não disponível.";

/// Read one line from stdin after printing `label` on stderr.
pub(crate) fn prompt(label: &str) -> Result<String> {
    eprint!("{label}: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(line.trim().to_string())
}

/// Use `value` when given, otherwise ask for it.
pub(crate) fn value_or_prompt(value: Option<String>, label: &str) -> Result<String> {
    match value {
        Some(v) => Ok(v),
        None => prompt(label),
    }
}

/// Report `message` the way the output mode expects and exit with `code`.
pub(crate) fn exit_with(json: bool, message: &str, code: i32) -> ! {
    if json {
        println!("{}", json_error(message));
    } else {
        eprintln!("{message}");
    }
    process::exit(code);
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub(crate) fn print_ingredient_table(items: &[&Ingredient], selection: &SelectionSet) {
    #[derive(Tabled)]
    struct IngredientRow {
        #[tabled(rename = "")]
        picked: &'static str,
        #[tabled(rename = "Key")]
        key: String,
        #[tabled(rename = "Ingrediente")]
        name: String,
        #[tabled(rename = "")]
        icon: String,
    }

    let rows: Vec<IngredientRow> = items
        .iter()
        .map(|i| IngredientRow {
            picked: if selection.contains(&i.name_key) { "✓" } else { "" },
            key: i.name_key.clone(),
            name: truncate(&i.display_name, 30),
            icon: i.icon.clone(),
        })
        .collect();

    println!("{}", Table::new(&rows).with(Style::rounded()));
}

pub(crate) fn print_recipe_table(recipes: &[RecipeSummary]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Receita")]
        title: String,
        #[tabled(rename = "Usados")]
        used: u32,
        #[tabled(rename = "Faltando")]
        missed: u32,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            title: truncate(&r.title, 45),
            used: r.used_ingredient_count,
            missed: r.missed_ingredient_count,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..4)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_favorites_table(entries: &[FavoriteViewModel]) {
    #[derive(Tabled)]
    struct FavoriteRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Receita")]
        title: String,
        #[tabled(rename = "Sua nota")]
        rating: String,
    }

    let rows: Vec<FavoriteRow> = entries
        .iter()
        .map(|f| FavoriteRow {
            id: f.recipe_id,
            title: truncate(&f.recipe_title, 45),
            rating: f.rating_label(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_recipe_page(page: &RecipePage) {
    let detail = &page.detail;
    println!("{} (id: {})", detail.title, detail.id);

    let mut facts = Vec::new();
    if let Some(minutes) = detail.ready_in_minutes {
        facts.push(format!("{minutes} min"));
    }
    if let Some(servings) = detail.servings {
        facts.push(format!("{servings} porções"));
    }
    match page.favorited {
        Some(true) => facts.push("★ favorita".to_string()),
        Some(false) => facts.push("☆ não favorita".to_string()),
        None => {}
    }
    if let Some(rating) = &page.rating {
        facts.push(format!("sua nota: {}", rating.rating_value));
    }
    if !facts.is_empty() {
        println!("{}", facts.join(" · "));
    }

    if !detail.ingredients.is_empty() {
        println!("\nIngredientes:");
        for ingredient in &detail.ingredients {
            println!(
                "  - {} {} {}",
                format_amount(ingredient.amount),
                ingredient.unit,
                ingredient.name
            );
        }
    }

    println!("\nModo de preparo:");
    if detail.instructions.is_empty() {
        println!("  {NO_INSTRUCTIONS}");
    } else {
        println!("{}", detail.instructions);
    }

    if let Some(comment) = page.rating.as_ref().and_then(|r| r.comment.as_deref()) {
        println!("\nSeu comentário: {comment}");
    }
}

fn format_amount(amount: f64) -> String {
    if amount.fract() == 0.0 {
        format!("{amount:.0}")
    } else {
        format!("{amount:.2}")
            .trim_end_matches('0')
            .to_string()
    }
}

pub(crate) fn json_error(message: &str) -> String {
    #[derive(Serialize)]
    struct CliError<'a> {
        error: &'a str,
    }
    serde_json::to_string(&CliError { error: message })
        .unwrap_or_else(|_| format!("{{\"error\":\"{message}\"}}"))
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}

/// Parse a star value like "4", "4.5" or "4,5".
pub(crate) fn parse_stars(s: &str) -> Result<f64> {
    let value: f64 = s
        .trim()
        .replace(',', ".")
        .parse()
        .with_context(|| format!("Invalid rating: '{s}'. Use a number from 0 to 5"))?;
    if !value.is_finite() {
        bail!("Invalid rating: '{s}'");
    }
    Ok(value)
}
