use anyhow::Result;
use std::process;

use pantry_core::models::SelectionSet;
use pantry_core::search::SearchOrchestrator;

use super::App;
use super::helpers::{exit_with, print_json, print_recipe_table};

pub(crate) async fn cmd_search(app: &App, keys: &[String], json: bool) -> Result<()> {
    let selection: SelectionSet = keys.iter().map(|k| k.trim().to_lowercase()).collect();

    let mut search = SearchOrchestrator::new();
    let results = search.search(app.service.api(), &selection).await.to_vec();
    if let Some(message) = search.error() {
        exit_with(json, message, 1);
    }

    if results.is_empty() {
        if json {
            println!("[]");
        } else {
            let keys = selection.to_vec().join(", ");
            eprintln!("Nenhuma receita encontrada para: {keys}");
        }
        process::exit(2);
    }

    if json {
        print_json(&results)?;
    } else {
        print_recipe_table(&results);
        eprintln!("Veja os detalhes com: pantry recipe <ID>");
    }
    Ok(())
}
