use anyhow::{Result, bail};
use serde::Serialize;

use pantry_chef_core::models::UserProfile;
use pantry_chef_core::sync::SessionState;

use super::Engine;

#[derive(Serialize)]
struct SessionSummary<'a> {
    user: Option<&'a UserProfile>,
    state: &'static str,
    pantry_items: usize,
    saved_recipes: usize,
    remote_configured: bool,
}

fn state_label(state: SessionState) -> &'static str {
    match state {
        SessionState::NoSession => "guest",
        SessionState::LocalLoaded => "local",
        SessionState::RemoteReconciling => "syncing",
        SessionState::Synced => "synced",
    }
}

fn summary(engine: &Engine) -> SessionSummary<'_> {
    SessionSummary {
        user: engine.profile(),
        state: state_label(engine.state()),
        pantry_items: engine.pantry().len(),
        saved_recipes: engine.saved_recipes().len(),
        remote_configured: engine.has_remote(),
    }
}

pub(crate) async fn cmd_login(
    engine: &mut Engine,
    user_id: &str,
    email: &str,
    name: Option<String>,
    json: bool,
) -> Result<()> {
    if user_id.trim().is_empty() {
        bail!("User id must not be empty");
    }
    if !email.contains('@') {
        bail!("Invalid email '{email}'");
    }

    // Switching users: the previous session ends first
    if engine.user_id().is_some_and(|current| current != user_id) {
        engine.logout()?;
    }

    let mut profile = engine
        .profile()
        .filter(|p| p.id == user_id)
        .cloned()
        .unwrap_or_else(|| UserProfile::new(user_id, email));
    email.clone_into(&mut profile.email);
    if name.is_some() {
        profile.display_name = name;
    }

    engine.begin_session(profile)?;
    engine.reconcile().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&summary(engine))?);
    } else {
        let who = engine
            .profile()
            .and_then(|p| p.display_name.as_deref())
            .unwrap_or(user_id);
        println!(
            "Signed in as {who} ({} pantry items, {} saved recipes)",
            engine.pantry().len(),
            engine.saved_recipes().len()
        );
        if !engine.has_remote() {
            eprintln!("Note: no remote store configured; data stays on this device");
        }
    }
    Ok(())
}

pub(crate) fn cmd_logout(engine: &mut Engine, json: bool) -> Result<()> {
    let user_id = engine.user_id().map(str::to_string);
    engine.logout()?;

    if json {
        println!("{}", serde_json::json!({ "signed_out": user_id }));
    } else if let Some(id) = user_id {
        println!("Signed out {id}");
    } else {
        println!("No active session");
    }
    Ok(())
}

pub(crate) fn cmd_whoami(engine: &Engine, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(&summary(engine))?);
        return Ok(());
    }
    match engine.profile() {
        Some(p) => {
            let name = p.display_name.as_deref().unwrap_or(&p.id);
            println!("{name} <{}> ({})", p.email, state_label(engine.state()));
            if !p.preferred_cuisines.is_empty() {
                println!("  Cuisines: {}", p.preferred_cuisines.join(", "));
            }
        }
        None => println!("Guest (not signed in)"),
    }
    Ok(())
}
