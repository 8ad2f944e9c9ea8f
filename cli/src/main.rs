mod chef_client;
mod commands;
mod config;
mod rest_client;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_chat, cmd_login, cmd_logout, cmd_onboard, cmd_pantry_add, cmd_pantry_clear,
    cmd_pantry_list, cmd_pantry_remove, cmd_popular, cmd_receipt, cmd_saved_list,
    cmd_saved_remove, cmd_settings, cmd_shopping_add, cmd_shopping_check,
    cmd_shopping_clear_checked, cmd_shopping_list, cmd_shopping_remove, cmd_suggest, cmd_whoami,
    open_chef, open_engine,
};
use crate::config::Config;
use pantry_chef_core::models::{Difficulty, RecipeFilters};

#[derive(Parser)]
#[command(
    name = "pantry-chef",
    version,
    about = "Turn what is in your pantry into recipes",
    long_about = "Keep track of your pantry and ask an AI chef what to cook with it.\n\
                  Works offline; signs in to sync your pantry and saved recipes."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and sync pantry and saved recipes
    Login {
        /// Account id
        user_id: String,
        /// Account email
        email: String,
        /// Display name
        #[arg(long)]
        name: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Sign out (data cached on this device is kept)
    Logout {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the current session
    Whoami {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage pantry ingredients
    Pantry {
        #[command(subcommand)]
        command: PantryCommands,
    },
    /// Suggest recipes from the pantry, then inspect them one by one
    Suggest {
        /// Cuisine to aim for (e.g. "Korean")
        #[arg(long)]
        cuisine: Option<String>,
        /// Number of servings
        #[arg(long)]
        servings: Option<u32>,
        /// Spiciness, 1-5
        #[arg(long)]
        spiciness: Option<u8>,
        /// Difficulty: easy, medium, hard
        #[arg(long)]
        difficulty: Option<String>,
        /// Maximum cook time in minutes
        #[arg(long)]
        max_cook_time: Option<u32>,
        /// Pantry ingredient to use up first (repeatable)
        #[arg(long = "priority", value_name = "NAME")]
        priority: Vec<String>,
        /// Output the overview list as JSON (no interactive inspection)
        #[arg(long)]
        json: bool,
    },
    /// Add groceries from a receipt photo to the pantry
    Receipt {
        /// Path to the receipt image (jpg, png, webp, heic)
        image: std::path::PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Ask the chef about a saved recipe
    Chat {
        /// Saved recipe name
        recipe: String,
        /// Question (omit for an interactive conversation)
        message: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage saved recipes
    Saved {
        #[command(subcommand)]
        command: SavedCommands,
    },
    /// Manage the shopping list
    Shopping {
        #[command(subcommand)]
        command: ShoppingCommands,
    },
    /// Show the most searched recipes
    Popular {
        /// Number of recipes to show
        #[arg(short, long, default_value = "10")]
        limit: u32,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show or change settings
    Settings {
        /// Recipe language code (e.g. en, ko)
        #[arg(long)]
        language: Option<String>,
        /// Preferred cuisines, comma separated
        #[arg(long)]
        cuisines: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Finish onboarding by picking preferred cuisines
    Onboard {
        /// Preferred cuisines, comma separated
        #[arg(long)]
        cuisines: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum PantryCommands {
    /// Add an ingredient, or update its quantity
    Add {
        /// Ingredient name
        name: String,
        /// Free-form quantity (e.g. "6", "500g", "a bunch")
        quantity: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an ingredient
    Remove {
        /// Ingredient name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List pantry ingredients
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every ingredient
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SavedCommands {
    /// List saved recipes
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a saved recipe
    Remove {
        /// Recipe name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum ShoppingCommands {
    /// Show the shopping list
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add an item
    Add {
        /// Item name
        name: String,
        /// Quantity
        #[arg(short, long)]
        quantity: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Check or uncheck an item
    Check {
        /// Item name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove an item
    Remove {
        /// Item name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove every checked item
    ClearChecked {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let mut engine = open_engine(&config)?;

    // Session commands manage the lifecycle themselves; everything else
    // works on a reconciled session when one exists.
    if !matches!(
        cli.command,
        Commands::Login { .. } | Commands::Logout { .. } | Commands::Whoami { .. }
    ) {
        engine.reconcile().await?;
    }

    match cli.command {
        Commands::Login {
            user_id,
            email,
            name,
            json,
        } => cmd_login(&mut engine, &user_id, &email, name, json).await,
        Commands::Logout { json } => cmd_logout(&mut engine, json),
        Commands::Whoami { json } => cmd_whoami(&engine, json),
        Commands::Pantry { command } => match command {
            PantryCommands::Add {
                name,
                quantity,
                json,
            } => cmd_pantry_add(&mut engine, &name, quantity, json).await,
            PantryCommands::Remove { name, json } => {
                cmd_pantry_remove(&mut engine, &name, json).await
            }
            PantryCommands::List { json } => cmd_pantry_list(&engine, json),
            PantryCommands::Clear { json } => cmd_pantry_clear(&mut engine, json).await,
        },
        Commands::Suggest {
            cuisine,
            servings,
            spiciness,
            difficulty,
            max_cook_time,
            priority,
            json,
        } => {
            let difficulty = difficulty
                .as_deref()
                .map(str::parse::<Difficulty>)
                .transpose()?;
            let filters = RecipeFilters {
                cuisine,
                servings,
                spiciness,
                difficulty,
                max_cook_time,
            };
            let chef = open_chef(&config)?;
            cmd_suggest(&mut engine, &chef, filters, priority, json).await
        }
        Commands::Receipt { image, json } => {
            let chef = open_chef(&config)?;
            cmd_receipt(&mut engine, &chef, &image, json).await
        }
        Commands::Chat {
            recipe,
            message,
            json,
        } => {
            let chef = open_chef(&config)?;
            cmd_chat(&engine, &chef, &recipe, message, json).await
        }
        Commands::Saved { command } => match command {
            SavedCommands::List { json } => cmd_saved_list(&engine, json),
            SavedCommands::Remove { name, json } => {
                cmd_saved_remove(&mut engine, &name, json).await
            }
        },
        Commands::Shopping { command } => match command {
            ShoppingCommands::List { json } => cmd_shopping_list(&engine, json),
            ShoppingCommands::Add {
                name,
                quantity,
                json,
            } => cmd_shopping_add(&mut engine, &name, quantity, json),
            ShoppingCommands::Check { name, json } => cmd_shopping_check(&mut engine, &name, json),
            ShoppingCommands::Remove { name, json } => {
                cmd_shopping_remove(&mut engine, &name, json)
            }
            ShoppingCommands::ClearChecked { json } => {
                cmd_shopping_clear_checked(&mut engine, json)
            }
        },
        Commands::Popular { limit, json } => cmd_popular(&engine, limit, json).await,
        Commands::Settings {
            language,
            cuisines,
            json,
        } => cmd_settings(&mut engine, language, cuisines, json).await,
        Commands::Onboard { cuisines, json } => cmd_onboard(&mut engine, &cuisines, json).await,
    }
}
