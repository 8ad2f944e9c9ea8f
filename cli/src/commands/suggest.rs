use anyhow::{Result, bail};
use std::process;

use pantry_chef_core::models::{RecipeFilters, pantry_names, validate_filters};
use pantry_chef_core::retrieval::RecipeBoard;

use super::helpers::{confirm, print_recipe, print_recipe_table, prompt_choice, report_push};
use super::{Chef, Engine};

pub(crate) async fn cmd_suggest(
    engine: &mut Engine,
    chef: &Chef,
    filters: RecipeFilters,
    priority: Vec<String>,
    json: bool,
) -> Result<()> {
    validate_filters(&filters)?;

    let names = pantry_names(engine.pantry());
    if names.is_empty() {
        bail!("Your pantry is empty. Add items with: pantry-chef pantry add <name>");
    }
    for p in &priority {
        if !names.contains(p) {
            eprintln!("Note: '{p}' is not in your pantry");
        }
    }
    let language = engine.settings().language.clone();
    let search_term = if priority.is_empty() {
        names.join(", ")
    } else {
        priority.join(", ")
    };

    if !json {
        eprintln!("Asking the chef about {} ingredient(s)...", names.len());
    }
    let mut board = RecipeBoard::new();
    let recipes = board
        .search(chef, &names, &priority, &filters, &language)
        .await?;

    if recipes.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No recipes match your pantry and filters");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(recipes)?);
        return Ok(());
    }

    print_recipe_table(recipes);
    let count = recipes.len();

    while let Some(idx) = prompt_choice(count)? {
        let recipe = match board.inspect(chef, idx, &names, &language).await {
            Ok(r) => r.clone(),
            Err(e) => {
                eprintln!("Could not load the full recipe: {e}");
                continue;
            }
        };
        print_recipe(&recipe);
        engine
            .record_recipe_view(&recipe.recipe_name, &search_term)
            .await;

        let question = if engine.is_saved(&recipe.recipe_name) {
            "Remove from saved recipes?"
        } else {
            "Save this recipe?"
        };
        if confirm(question)? {
            let outcome = engine.toggle_saved_recipe(&recipe).await?;
            report_push(outcome);
        }

        let missing = recipe.missing_ingredients.len();
        if missing > 0
            && confirm(&format!("Add {missing} missing ingredient(s) to the shopping list?"))?
        {
            let added = engine.add_missing_ingredients(&recipe)?;
            println!("Added {added} item(s) to the shopping list");
        }

        print_recipe_table(board.recipes());
    }

    Ok(())
}
