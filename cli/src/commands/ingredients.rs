use anyhow::Result;
use serde::Serialize;
use std::process;

use pantry_core::catalog::Catalog;
use pantry_core::selection::{DisplayView, SelectionState};

use super::App;
use super::helpers::{exit_with, print_ingredient_table, print_json};

#[derive(Serialize)]
struct IngredientsOutput<'a> {
    #[serde(flatten)]
    view: DisplayView<'a>,
    selected: Vec<String>,
}

pub(crate) async fn cmd_ingredients(
    app: &App,
    search: Option<&str>,
    all: bool,
    select: &[String],
    json: bool,
) -> Result<()> {
    let catalog = match app.service.load_catalog().await {
        Ok(catalog) => catalog,
        Err(e) => exit_with(json, e.user_message(), 1),
    };

    let state = build_state(app, &catalog, search, all, select);
    let view = state.displayed(&catalog);

    if json {
        let empty = view.items.is_empty();
        print_json(&IngredientsOutput {
            view,
            selected: state.selection().to_vec(),
        })?;
        if empty {
            process::exit(2);
        }
        return Ok(());
    }

    println!("{}", view.heading);
    if let Some(message) = &view.empty_message {
        eprintln!("{message}");
        process::exit(2);
    }
    print_ingredient_table(&view.items, state.selection());
    if !state.selection().is_empty() {
        println!("{}", state.search_label());
    }
    Ok(())
}

fn build_state(
    app: &App,
    catalog: &Catalog,
    search: Option<&str>,
    all: bool,
    select: &[String],
) -> SelectionState {
    let mut state = SelectionState::new(app.retention);
    for key in select {
        let key = key.trim().to_lowercase();
        if catalog.get(&key).is_none() {
            tracing::warn!(key, "selected ingredient is not in the catalog");
        }
        state.toggle(&key);
    }
    if let Some(term) = search {
        state.set_search_term(term);
    }
    if all {
        state.toggle_show_all();
    }
    state
}

/// Ingredient names the recipe API knows, for use as search keys.
pub(crate) async fn cmd_suggest(app: &App, query: &str, json: bool) -> Result<()> {
    let suggestions = match app.service.autocomplete(query.trim()).await {
        Ok(suggestions) => suggestions,
        Err(e) => {
            tracing::error!("Error fetching suggestions: {e}");
            exit_with(json, &e.to_string(), 1);
        }
    };

    if suggestions.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No suggestions for '{query}'");
        }
        process::exit(2);
    }

    if json {
        print_json(&suggestions)?;
    } else {
        for suggestion in &suggestions {
            println!("{}", suggestion.name);
        }
    }
    Ok(())
}
