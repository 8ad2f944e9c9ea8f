use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::PathBuf;
use std::time::Duration;

pub const AI_URL_VAR: &str = "PANTRY_CHEF_AI_URL";
pub const STORE_URL_VAR: &str = "PANTRY_CHEF_STORE_URL";
pub const STORE_KEY_VAR: &str = "PANTRY_CHEF_STORE_KEY";

pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const AI_TIMEOUT: Duration = Duration::from_secs(60);
pub const STORE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreConfig {
    pub base_url: String,
    pub api_key: String,
}

pub struct Config {
    pub db_path: PathBuf,
    pub ai_url: Option<String>,
    pub store: Option<StoreConfig>,
}

impl Config {
    pub fn load() -> Result<Self> {
        // A missing .env is normal
        let _ = dotenvy::dotenv();

        let proj_dirs = ProjectDirs::from("", "", "pantry-chef")
            .context("Could not determine home directory")?;

        let data_dir = proj_dirs.data_dir().to_path_buf();
        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {}", data_dir.display()))?;

        let (ai_url, store) = from_lookup(|k| std::env::var(k).ok());

        Ok(Config {
            db_path: data_dir.join("pantry-chef.db"),
            ai_url,
            store,
        })
    }

    pub fn require_ai_url(&self) -> Result<&str> {
        self.ai_url
            .as_deref()
            .with_context(|| format!("{AI_URL_VAR} is not set; the recipe service is unavailable"))
    }
}

/// Resolve endpoints from a variable lookup. Blank values count as unset;
/// the store needs both its URL and key.
fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> (Option<String>, Option<StoreConfig>) {
    let get = |k: &str| {
        lookup(k)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };
    let store = match (get(STORE_URL_VAR), get(STORE_KEY_VAR)) {
        (Some(base_url), Some(api_key)) => Some(StoreConfig {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
        }),
        _ => None,
    };
    (get(AI_URL_VAR), store)
}
