use anyhow::Result;
use std::process;

use super::Engine;
use super::helpers::{json_error, print_recipe_table, report_push};

pub(crate) fn cmd_saved_list(engine: &Engine, json: bool) -> Result<()> {
    let saved = engine.saved_recipes();

    if saved.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No saved recipes yet. Save one from: pantry-chef suggest");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(saved)?);
    } else {
        print_recipe_table(saved);
    }
    Ok(())
}

pub(crate) async fn cmd_saved_remove(engine: &mut Engine, name: &str, json: bool) -> Result<()> {
    if !engine.is_saved(name) {
        if json {
            println!("{}", json_error(&format!("No saved recipe named '{name}'")));
        } else {
            eprintln!("No saved recipe named '{name}'");
        }
        process::exit(2);
    }

    let outcome = engine.remove_saved_recipe(name).await?;

    if json {
        println!("{}", serde_json::json!({ "removed": name }));
    } else {
        println!("Removed {name} from saved recipes");
        report_push(outcome);
    }
    Ok(())
}
