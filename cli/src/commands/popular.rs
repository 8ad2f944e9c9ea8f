use anyhow::{Result, bail};
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use super::Engine;

pub(crate) async fn cmd_popular(engine: &Engine, limit: u32, json: bool) -> Result<()> {
    if limit == 0 {
        bail!("Limit must be greater than 0");
    }
    let popular = engine.popular_recipes(limit).await;

    if popular.is_empty() {
        if json {
            println!("[]");
        } else if engine.has_remote() {
            eprintln!("No searches recorded yet");
        } else {
            eprintln!("Popular recipes need a remote store; none is configured");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&popular)?);
        return Ok(());
    }

    #[derive(Tabled)]
    struct PopularRow {
        #[tabled(rename = "#")]
        rank: usize,
        #[tabled(rename = "Recipe")]
        name: String,
        #[tabled(rename = "Searches")]
        count: u32,
    }

    let rows: Vec<PopularRow> = popular
        .into_iter()
        .enumerate()
        .map(|(i, p)| PopularRow {
            rank: i + 1,
            name: p.recipe_name,
            count: p.search_count,
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..3)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}
