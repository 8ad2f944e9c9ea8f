use anyhow::Result;
use std::process;

use pantry_chef_core::models::{ChatRole, ChatTurn};

use super::helpers::{json_error, prompt_line};
use super::{Chef, Engine};

pub(crate) async fn cmd_chat(
    engine: &Engine,
    chef: &Chef,
    recipe_name: &str,
    message: Option<String>,
    json: bool,
) -> Result<()> {
    let Some(recipe) = engine
        .saved_recipes()
        .iter()
        .find(|r| r.recipe_name.eq_ignore_ascii_case(recipe_name))
    else {
        if json {
            println!("{}", json_error(&format!("No saved recipe named '{recipe_name}'")));
        } else {
            eprintln!("No saved recipe named '{recipe_name}'");
        }
        process::exit(2);
    };
    let language = &engine.settings().language;

    if let Some(message) = message {
        let reply = chef.chat(recipe, &[], &message, language).await?;
        if json {
            println!("{}", serde_json::json!({ "reply": reply }));
        } else {
            println!("{reply}");
        }
        return Ok(());
    }

    eprintln!(
        "Chatting about {}. Press Enter on an empty line to stop.",
        recipe.recipe_name
    );
    let mut history: Vec<ChatTurn> = Vec::new();
    while let Some(message) = prompt_line("\nyou> ")? {
        match chef.chat(recipe, &history, &message, language).await {
            Ok(reply) => {
                println!("chef> {reply}");
                history.push(ChatTurn {
                    role: ChatRole::User,
                    text: message,
                });
                history.push(ChatTurn {
                    role: ChatRole::Chef,
                    text: reply,
                });
            }
            // The conversation survives a failed turn
            Err(e) => eprintln!("The chef could not answer: {e}"),
        }
    }
    Ok(())
}
