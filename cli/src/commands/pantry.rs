use anyhow::{Result, bail};
use std::process;

use pantry_chef_core::models::PantryItem;

use super::Engine;
use super::helpers::{json_error, print_pantry_table, report_push};

pub(crate) async fn cmd_pantry_add(
    engine: &mut Engine,
    name: &str,
    quantity: Option<String>,
    json: bool,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Ingredient name must not be empty");
    }
    let item = PantryItem::new(name, quantity.unwrap_or_default());
    let outcome = engine.upsert_pantry_item(item.clone()).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        if item.quantity.is_empty() {
            println!("Added {name} to the pantry");
        } else {
            println!("Added {name} ({}) to the pantry", item.quantity);
        }
        report_push(outcome);
    }
    Ok(())
}

pub(crate) async fn cmd_pantry_remove(engine: &mut Engine, name: &str, json: bool) -> Result<()> {
    if !engine.pantry().iter().any(|p| p.name == name) {
        if json {
            println!("{}", json_error(&format!("'{name}' is not in the pantry")));
        } else {
            eprintln!("'{name}' is not in the pantry");
        }
        process::exit(2);
    }

    let outcome = engine.remove_pantry_item(name).await?;

    if json {
        println!("{}", serde_json::json!({ "removed": name }));
    } else {
        println!("Removed {name} from the pantry");
        report_push(outcome);
    }
    Ok(())
}

pub(crate) fn cmd_pantry_list(engine: &Engine, json: bool) -> Result<()> {
    let pantry = engine.pantry();

    if pantry.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("Your pantry is empty. Add items with: pantry-chef pantry add <name>");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(pantry)?);
    } else {
        print_pantry_table(pantry);
    }
    Ok(())
}

/// Destructive: empties the pantry here and in the remote store.
pub(crate) async fn cmd_pantry_clear(engine: &mut Engine, json: bool) -> Result<()> {
    let count = engine.pantry().len();
    let outcome = engine.replace_pantry(Vec::new()).await?;

    if json {
        println!("{}", serde_json::json!({ "removed": count }));
    } else {
        println!("Cleared {count} item(s) from the pantry");
        report_push(outcome);
    }
    Ok(())
}
