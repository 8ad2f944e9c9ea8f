use anyhow::{Context, Result, bail};
use serde::Serialize;
use std::io::{self, BufRead, Write};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use pantry_chef_core::models::{PantryItem, Recipe, ShoppingItem};
use pantry_chef_core::sync::PushOutcome;

/// Read one line from stdin after printing `prompt` to stderr.
/// `None` on EOF or a blank line.
pub(crate) fn prompt_line(prompt: &str) -> Result<Option<String>> {
    eprint!("{prompt}");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let Some(line) = stdin.lock().lines().next() else {
        return Ok(None);
    };
    let line = line?;
    let line = line.trim();
    Ok((!line.is_empty()).then(|| line.to_string()))
}

/// Zero-based index of a 1-based choice, `None` if the user just pressed Enter.
pub(crate) fn prompt_choice(count: usize) -> Result<Option<usize>> {
    read_choice(&mut io::stdin().lock(), &mut io::stderr(), count)
}

/// Ask until the answer is a valid choice, Enter, or EOF.
fn read_choice(
    input: &mut impl BufRead,
    out: &mut impl Write,
    count: usize,
) -> Result<Option<usize>> {
    loop {
        write!(out, "\nInspect a recipe (1-{count}, Enter to quit): ")?;
        out.flush()?;
        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            return Ok(None);
        }
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        match parse_choice(line, count) {
            Ok(idx) => return Ok(Some(idx)),
            Err(e) => writeln!(out, "{e:#}")?,
        }
    }
}

pub(crate) fn parse_choice(input: &str, count: usize) -> Result<usize> {
    let n: usize = input.trim().parse().context("Invalid number")?;
    if n < 1 || n > count {
        bail!("Selection out of range");
    }
    Ok(n - 1)
}

pub(crate) fn confirm(question: &str) -> Result<bool> {
    let answer = prompt_line(&format!("{question} [y/N]: "))?;
    Ok(answer.is_some_and(|a| is_yes(&a)))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Stderr note for pushes that did not reach the remote store.
pub(crate) fn report_push(outcome: PushOutcome) {
    match outcome {
        PushOutcome::Pushed | PushOutcome::LocalOnly => {}
        PushOutcome::Deferred => eprintln!("Note: saved locally; remote sync has not finished"),
        PushOutcome::Failed => eprintln!("Note: saved locally; could not reach the remote store"),
    }
}

pub(crate) fn print_pantry_table(items: &[PantryItem]) {
    #[derive(Tabled)]
    struct PantryRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Ingredient")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
    }

    let rows: Vec<PantryRow> = items
        .iter()
        .enumerate()
        .map(|(i, p)| PantryRow {
            idx: i + 1,
            name: truncate(&p.name, 40),
            quantity: if p.quantity.is_empty() {
                "-".to_string()
            } else {
                p.quantity.clone()
            },
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
}

pub(crate) fn print_recipe_table(recipes: &[Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "#")]
        idx: usize,
        #[tabled(rename = "Recipe")]
        name: String,
        #[tabled(rename = "Cuisine")]
        cuisine: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Difficulty")]
        difficulty: String,
        #[tabled(rename = "Spice")]
        spiciness: String,
        #[tabled(rename = "kcal")]
        calories: u32,
        #[tabled(rename = "Missing")]
        missing: usize,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .enumerate()
        .map(|(i, r)| RecipeRow {
            idx: i + 1,
            name: truncate(&r.recipe_name, 35),
            cuisine: truncate(&r.cuisine, 15),
            time: format!("{} min", r.cook_time),
            difficulty: r.difficulty.to_string(),
            spiciness: "*".repeat(usize::from(r.spiciness)),
            calories: r.calories,
            missing: r.missing_ingredients.len(),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(6..8)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

pub(crate) fn print_recipe(recipe: &Recipe) {
    println!("\n{}", recipe.recipe_name);
    if recipe.english_recipe_name != recipe.recipe_name && !recipe.english_recipe_name.is_empty() {
        println!("({})", recipe.english_recipe_name);
    }
    if !recipe.description.is_empty() {
        println!("{}", recipe.description);
    }
    println!(
        "{} | {} min | {} | serves {} | {} kcal",
        recipe.cuisine, recipe.cook_time, recipe.difficulty, recipe.servings, recipe.calories
    );

    println!("\nIngredients:");
    for i in &recipe.ingredients {
        println!("  - {i}");
    }
    if !recipe.missing_ingredients.is_empty() {
        println!("\nYou are missing:");
        for i in &recipe.missing_ingredients {
            println!("  - {i}");
        }
    }
    if !recipe.substitutions.is_empty() {
        println!("\nSubstitutions:");
        for s in &recipe.substitutions {
            println!("  - {} -> {}", s.missing, s.substitute);
        }
    }
    if recipe.is_details_loaded {
        println!("\nSteps:");
        for (n, step) in recipe.instructions.iter().enumerate() {
            println!("  {}. {step}", n + 1);
        }
    }
}

pub(crate) fn print_shopping_table(items: &[ShoppingItem]) {
    #[derive(Tabled)]
    struct ShoppingRow {
        #[tabled(rename = " ")]
        checked: &'static str,
        #[tabled(rename = "Item")]
        name: String,
        #[tabled(rename = "Quantity")]
        quantity: String,
        #[tabled(rename = "For")]
        from_recipe: String,
    }

    let rows: Vec<ShoppingRow> = items
        .iter()
        .map(|s| ShoppingRow {
            checked: if s.checked { "[x]" } else { "[ ]" },
            name: truncate(&s.name, 35),
            quantity: s.quantity.clone().unwrap_or_default(),
            from_recipe: s
                .from_recipe
                .as_deref()
                .map(|r| truncate(r, 30))
                .unwrap_or_default(),
        })
        .collect();

    let table = Table::new(&rows).with(Style::rounded()).to_string();
    println!("{table}");
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
