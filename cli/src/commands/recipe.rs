use anyhow::Result;
use serde_json::json;
use tracing::warn;

use pantry_core::error::RATING_SAVE_FAILED;
use pantry_core::models::{RatingValue, RecipeId, UserId};

use super::App;
use super::helpers::{exit_with, parse_stars, print_json, print_recipe_page};

pub(crate) async fn cmd_recipe(app: &App, id: RecipeId, json: bool) -> Result<()> {
    let user_id = app.identity().user_id();
    let page = match app.service.reconciler().open_recipe(user_id, id).await {
        Ok(page) => page,
        Err(e) => exit_with(json, e.user_message(), 1),
    };

    if json {
        print_json(&page)?;
    } else {
        print_recipe_page(&page);
    }
    Ok(())
}

/// Seed the last known rating so a zero value or a missing comment falls
/// back to what is stored. Exits if the stored rating cannot be read.
async fn load_last_rating(app: &App, user_id: UserId, id: RecipeId, json: bool) {
    if let Err(e) = app.service.reconciler().load_rating(user_id, id).await {
        warn!("Could not read the stored rating for recipe {id}: {e}");
        exit_with(json, RATING_SAVE_FAILED, 1);
    }
}

pub(crate) async fn cmd_rate(
    app: &App,
    id: RecipeId,
    value: &str,
    comment: Option<&str>,
    json: bool,
) -> Result<()> {
    let user_id = app.require_user(json);
    let stars = parse_stars(value)?;
    load_last_rating(app, user_id, id, json).await;

    match app
        .service
        .reconciler()
        .rate(user_id, id, stars, comment)
        .await
    {
        Ok(saved) => print_saved(app, user_id, id, saved, json),
        Err(e) => exit_with(json, e.user_message(), 1),
    }
}

pub(crate) async fn cmd_comment(app: &App, id: RecipeId, text: &str, json: bool) -> Result<()> {
    let user_id = app.require_user(json);
    load_last_rating(app, user_id, id, json).await;

    match app
        .service
        .reconciler()
        .save_comment(user_id, id, text)
        .await
    {
        Ok(saved) => print_saved(app, user_id, id, saved, json),
        Err(e) => exit_with(json, e.user_message(), 1),
    }
}

fn print_saved(
    app: &App,
    user_id: UserId,
    id: RecipeId,
    saved: RatingValue,
    json: bool,
) -> Result<()> {
    let comment = app
        .service
        .reconciler()
        .rating(user_id, id)
        .and_then(|r| r.comment);
    if json {
        print_json(&json!({
            "recipe_id": id,
            "rating": saved,
            "comment": comment,
        }))?;
    } else {
        println!("Avaliação salva: {saved} ★");
        if let Some(comment) = comment {
            println!("Comentário: {comment}");
        }
    }
    Ok(())
}
