use anyhow::Result;
use serde_json::json;
use std::process;
use tracing::warn;

use pantry_core::error::FAVORITE_TOGGLE_FAILED;
use pantry_core::models::RecipeId;
use pantry_core::reconcile::REMOVED_FAVORITE_TITLE;

use super::App;
use super::helpers::{exit_with, print_favorites_table, print_json};

const NO_FAVORITES: &str = "Você ainda não salvou nenhuma receita.";

/// Flip the favorite state of one recipe.
pub(crate) async fn cmd_favorite(
    app: &App,
    id: RecipeId,
    title: Option<String>,
    json: bool,
) -> Result<()> {
    let user_id = app.require_user(json);
    let reconciler = app.service.reconciler();

    let current = match reconciler.load_favorite_state(user_id, id).await {
        Ok(current) => current,
        Err(e) => {
            warn!("Could not read favorite state for recipe {id}: {e}");
            exit_with(json, FAVORITE_TOGGLE_FAILED, 1);
        }
    };

    let title = match title {
        Some(title) => title,
        None if current => REMOVED_FAVORITE_TITLE.to_string(),
        None => match app.service.recipe_details(id).await {
            Ok(detail) => detail.title,
            Err(e) => {
                warn!("Could not fetch the title of recipe {id}: {e}");
                REMOVED_FAVORITE_TITLE.to_string()
            }
        },
    };

    let now = match reconciler
        .toggle_favorite(user_id, id, &title, current)
        .await
    {
        Ok(now) => now,
        Err(e) => exit_with(json, e.user_message(), 1),
    };

    if json {
        print_json(&json!({ "recipe_id": id, "favorited": now }))?;
    } else if now {
        println!("★ {title} adicionada aos favoritos");
    } else {
        println!("☆ Receita {id} removida dos favoritos");
    }
    Ok(())
}

/// List favorites, optionally removing one first.
pub(crate) async fn cmd_favorites(app: &App, remove: Option<RecipeId>, json: bool) -> Result<()> {
    let user_id = app.require_user(json);
    let reconciler = app.service.reconciler();

    if let Some(id) = remove {
        if let Err(e) = reconciler.remove_favorite(user_id, id).await {
            exit_with(json, e.user_message(), 1);
        }
        if !json {
            eprintln!("Receita {id} removida dos favoritos");
        }
    }

    let view = match reconciler.load_favorites(user_id).await {
        Ok(view) => view,
        Err(e) => exit_with(json, e.user_message(), 1),
    };

    if json {
        print_json(&view)?;
        if view.entries.is_empty() {
            process::exit(2);
        }
        return Ok(());
    }

    if let Some(warning) = view.warning {
        eprintln!("{warning}");
    }
    if view.entries.is_empty() {
        eprintln!("{NO_FAVORITES}");
        process::exit(2);
    }
    print_favorites_table(&view.entries);
    Ok(())
}
