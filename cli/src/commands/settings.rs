use anyhow::{Result, bail};

use pantry_chef_core::models::parse_cuisine_list;

use super::Engine;
use super::helpers::report_push;

fn validate_language(language: &str) -> Result<String> {
    let language = language.trim().to_lowercase();
    let valid = (2..=3).contains(&language.len()) && language.chars().all(|c| c.is_ascii_lowercase());
    if !valid {
        bail!("Invalid language '{language}'. Use a 2 or 3 letter code like 'en' or 'ko'");
    }
    Ok(language)
}

pub(crate) async fn cmd_settings(
    engine: &mut Engine,
    language: Option<String>,
    cuisines: Option<String>,
    json: bool,
) -> Result<()> {
    if let Some(language) = language {
        engine.set_language(&validate_language(&language)?)?;
    }
    if let Some(cuisines) = cuisines {
        let outcome = engine
            .set_preferred_cuisines(parse_cuisine_list(&cuisines))
            .await?;
        report_push(outcome);
    }

    let settings = engine.settings();
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
    } else {
        println!("Language:   {}", settings.language);
        let cuisines = if settings.preferred_cuisines.is_empty() {
            "(any)".to_string()
        } else {
            settings.preferred_cuisines.join(", ")
        };
        println!("Cuisines:   {cuisines}");
        println!(
            "Onboarded:  {}",
            if settings.has_completed_onboarding {
                "yes"
            } else {
                "no"
            }
        );
    }
    Ok(())
}

pub(crate) async fn cmd_onboard(engine: &mut Engine, cuisines: &str, json: bool) -> Result<()> {
    let cuisines = parse_cuisine_list(cuisines);
    if cuisines.is_empty() {
        bail!("Pick at least one cuisine, e.g. --cuisines korean,italian");
    }
    let outcome = engine.complete_onboarding(cuisines).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(engine.settings())?);
    } else {
        println!(
            "All set. Suggestions will lean towards {}",
            engine.settings().preferred_cuisines.join(", ")
        );
        report_push(outcome);
    }
    Ok(())
}
