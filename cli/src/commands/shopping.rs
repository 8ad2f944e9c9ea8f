use anyhow::{Result, bail};
use std::process;

use pantry_chef_core::models::ShoppingItem;

use super::Engine;
use super::helpers::{json_error, print_shopping_table};

fn not_found(name: &str, json: bool) -> ! {
    if json {
        println!("{}", json_error(&format!("'{name}' is not on the shopping list")));
    } else {
        eprintln!("'{name}' is not on the shopping list");
    }
    process::exit(2);
}

pub(crate) fn cmd_shopping_list(engine: &Engine, json: bool) -> Result<()> {
    let items = engine.shopping_list();

    if items.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("Your shopping list is empty");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(items)?);
    } else {
        print_shopping_table(items);
    }
    Ok(())
}

pub(crate) fn cmd_shopping_add(
    engine: &mut Engine,
    name: &str,
    quantity: Option<String>,
    json: bool,
) -> Result<()> {
    let name = name.trim();
    if name.is_empty() {
        bail!("Item name must not be empty");
    }
    let item = ShoppingItem {
        name: name.to_string(),
        quantity,
        from_recipe: None,
        checked: false,
    };
    engine.add_to_shopping_list(item.clone())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&item)?);
    } else {
        println!("Added {name} to the shopping list");
    }
    Ok(())
}

pub(crate) fn cmd_shopping_check(engine: &mut Engine, name: &str, json: bool) -> Result<()> {
    if !engine.toggle_shopping_item(name)? {
        not_found(name, json);
    }
    let checked = engine
        .shopping_list()
        .iter()
        .any(|s| s.name == name && s.checked);

    if json {
        println!("{}", serde_json::json!({ "name": name, "checked": checked }));
    } else if checked {
        println!("Checked off {name}");
    } else {
        println!("Unchecked {name}");
    }
    Ok(())
}

pub(crate) fn cmd_shopping_remove(engine: &mut Engine, name: &str, json: bool) -> Result<()> {
    if !engine.remove_shopping_item(name)? {
        not_found(name, json);
    }

    if json {
        println!("{}", serde_json::json!({ "removed": name }));
    } else {
        println!("Removed {name} from the shopping list");
    }
    Ok(())
}

pub(crate) fn cmd_shopping_clear_checked(engine: &mut Engine, json: bool) -> Result<()> {
    let removed = engine.clear_checked_items()?;

    if json {
        println!("{}", serde_json::json!({ "removed": removed }));
    } else {
        println!("Removed {removed} checked item(s)");
    }
    Ok(())
}
