use async_trait::async_trait;
use chrono::Utc;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::chef::HttpReply;
use crate::error::{RemoteError, TransportError};
use crate::models::{PantryItem, PopularRecipe, Recipe, SearchEvent, UserProfile};

pub const PROFILES: &str = "/user_profiles";
pub const INGREDIENTS: &str = "/user_ingredients";
pub const SAVED_RECIPES: &str = "/user_saved_recipes";
pub const SEARCH_EVENTS: &str = "/search_events";
pub const SEARCH_COUNTS: &str = "/recipe_search_counts";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Delete,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RestRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Comma-separated unique key for merge-by-key upserts.
    pub merge_on: Option<String>,
}

/// Platform HTTP access to the remote store. The CLI implements this with reqwest.
#[async_trait]
pub trait RestTransport: Send + Sync {
    async fn send(&self, request: RestRequest) -> Result<HttpReply, TransportError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct RequestOptions {
    pub method: Method,
    pub body: Option<Value>,
    pub merge_on: Option<String>,
}

impl RequestOptions {
    #[must_use]
    pub fn get() -> Self {
        Self {
            method: Method::Get,
            body: None,
            merge_on: None,
        }
    }

    #[must_use]
    pub fn delete() -> Self {
        Self {
            method: Method::Delete,
            body: None,
            merge_on: None,
        }
    }

    #[must_use]
    pub fn insert(body: Value) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            merge_on: None,
        }
    }

    #[must_use]
    pub fn upsert(body: Value, key: &str) -> Self {
        Self {
            method: Method::Post,
            body: Some(body),
            merge_on: Some(key.to_string()),
        }
    }
}

/// `column=eq.value`
#[must_use]
pub fn eq(column: &str, value: &str) -> (String, String) {
    (column.to_string(), format!("eq.{value}"))
}

// --- Row shapes ---

#[derive(Debug, Serialize, Deserialize)]
struct ProfileRow {
    id: String,
    email: String,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    has_completed_onboarding: bool,
    #[serde(default)]
    preferred_cuisines: Vec<String>,
    #[serde(default, skip_deserializing)]
    updated_at: String,
}

impl ProfileRow {
    fn from_profile(p: &UserProfile) -> Self {
        Self {
            id: p.id.clone(),
            email: p.email.clone(),
            display_name: p.display_name.clone(),
            has_completed_onboarding: p.has_completed_onboarding,
            preferred_cuisines: p.preferred_cuisines.clone(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }

    fn into_profile(self) -> UserProfile {
        UserProfile {
            id: self.id,
            email: self.email,
            display_name: self.display_name,
            has_completed_onboarding: self.has_completed_onboarding,
            preferred_cuisines: self.preferred_cuisines,
        }
    }
}

#[derive(Debug, Serialize)]
struct IngredientRow<'a> {
    user_id: &'a str,
    name: &'a str,
    quantity: &'a str,
}

#[derive(Debug, Serialize)]
struct SavedRecipeRow<'a> {
    user_id: &'a str,
    recipe_name: &'a str,
    recipe_data: &'a Recipe,
}

#[derive(Debug, Deserialize)]
struct SavedRecipeData {
    recipe_data: Value,
}

#[derive(Debug, Deserialize)]
struct CountRow {
    #[serde(default)]
    search_count: u32,
}

/// REST store client. Writes with a `merge_on` key replace whole rows; there
/// are no partial updates.
pub struct RemoteStore<T> {
    transport: T,
}

impl<T: RestTransport> RemoteStore<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// The one request primitive. Non-2xx fails with status and body text;
    /// an empty 2xx body is `Ok(None)`.
    pub async fn request(
        &self,
        path: &str,
        query: Vec<(String, String)>,
        options: RequestOptions,
    ) -> Result<Option<Value>, RemoteError> {
        let reply = self
            .transport
            .send(RestRequest {
                method: options.method,
                path: path.to_string(),
                query,
                body: options.body,
                merge_on: options.merge_on,
            })
            .await?;

        if !reply.is_success() {
            return Err(RemoteError::Status {
                status: reply.status,
                body: reply.body,
            });
        }
        if reply.body.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&reply.body)
            .map(Some)
            .map_err(|e| RemoteError::Decode(e.to_string()))
    }

    /// GET rows, defaulting to an empty list when the store has none.
    async fn fetch_rows<R: DeserializeOwned>(
        &self,
        path: &str,
        query: Vec<(String, String)>,
    ) -> Result<Vec<R>, RemoteError> {
        match self.request(path, query, RequestOptions::get()).await? {
            None | Some(Value::Null) => Ok(Vec::new()),
            Some(v) => serde_json::from_value(v).map_err(|e| RemoteError::Decode(e.to_string())),
        }
    }

    // --- Profile ---

    pub async fn save_profile(&self, profile: &UserProfile) -> Result<(), RemoteError> {
        let row = json!([ProfileRow::from_profile(profile)]);
        self.request(PROFILES, Vec::new(), RequestOptions::upsert(row, "id"))
            .await?;
        Ok(())
    }

    pub async fn fetch_profile(&self, user_id: &str) -> Result<Option<UserProfile>, RemoteError> {
        let rows: Vec<ProfileRow> = self.fetch_rows(PROFILES, vec![eq("id", user_id)]).await?;
        Ok(rows.into_iter().next().map(ProfileRow::into_profile))
    }

    // --- Pantry ---

    /// Destructive full replace: delete every row for the user, then insert
    /// `items`. An empty slice leaves the remote pantry empty.
    pub async fn replace_pantry(
        &self,
        user_id: &str,
        items: &[PantryItem],
    ) -> Result<(), RemoteError> {
        self.request(
            INGREDIENTS,
            vec![eq("user_id", user_id)],
            RequestOptions::delete(),
        )
        .await?;
        if items.is_empty() {
            return Ok(());
        }
        let rows: Vec<IngredientRow> = items
            .iter()
            .map(|i| IngredientRow {
                user_id,
                name: &i.name,
                quantity: &i.quantity,
            })
            .collect();
        self.request(
            INGREDIENTS,
            Vec::new(),
            RequestOptions::upsert(json!(rows), "user_id,name"),
        )
        .await?;
        Ok(())
    }

    /// Rows that do not decode are skipped rather than failing the whole read.
    pub async fn fetch_pantry(&self, user_id: &str) -> Result<Vec<PantryItem>, RemoteError> {
        let rows: Vec<Value> = self
            .fetch_rows(
                INGREDIENTS,
                vec![
                    eq("user_id", user_id),
                    ("select".to_string(), "name,quantity".to_string()),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                serde_json::from_value(row)
                    .inspect_err(|e| tracing::warn!(error = %e, "skipping undecodable pantry row"))
                    .ok()
            })
            .collect())
    }

    // --- Saved recipes ---

    /// Same delete-then-insert contract as [`Self::replace_pantry`].
    pub async fn replace_saved_recipes(
        &self,
        user_id: &str,
        recipes: &[Recipe],
    ) -> Result<(), RemoteError> {
        self.request(
            SAVED_RECIPES,
            vec![eq("user_id", user_id)],
            RequestOptions::delete(),
        )
        .await?;
        if recipes.is_empty() {
            return Ok(());
        }
        let rows: Vec<SavedRecipeRow> = recipes
            .iter()
            .map(|r| SavedRecipeRow {
                user_id,
                recipe_name: &r.recipe_name,
                recipe_data: r,
            })
            .collect();
        self.request(
            SAVED_RECIPES,
            Vec::new(),
            RequestOptions::upsert(json!(rows), "user_id,recipe_name"),
        )
        .await?;
        Ok(())
    }

    /// Rows whose stored recipe no longer decodes are skipped.
    pub async fn fetch_saved_recipes(&self, user_id: &str) -> Result<Vec<Recipe>, RemoteError> {
        let rows: Vec<SavedRecipeData> = self
            .fetch_rows(
                SAVED_RECIPES,
                vec![
                    eq("user_id", user_id),
                    ("select".to_string(), "recipe_data".to_string()),
                ],
            )
            .await?;
        Ok(rows
            .into_iter()
            .filter_map(|row| {
                serde_json::from_value(row.recipe_data)
                    .inspect_err(|e| tracing::warn!(error = %e, "skipping undecodable saved recipe"))
                    .ok()
            })
            .collect())
    }

    // --- Search popularity ---

    pub async fn append_search_event(&self, event: &SearchEvent) -> Result<(), RemoteError> {
        self.request(
            SEARCH_EVENTS,
            Vec::new(),
            RequestOptions::insert(json!([event])),
        )
        .await?;
        Ok(())
    }

    /// Read, increment, write. Not atomic: two concurrent bumps of the same
    /// name can both read N and both write N+1. Best-effort counter.
    pub async fn bump_popularity_counter(&self, recipe_name: &str) -> Result<u32, RemoteError> {
        let rows: Vec<CountRow> = self
            .fetch_rows(
                SEARCH_COUNTS,
                vec![
                    eq("recipe_name", recipe_name),
                    ("select".to_string(), "search_count".to_string()),
                ],
            )
            .await?;
        let next = rows.first().map_or(0, |r| r.search_count).saturating_add(1);
        let row = json!([{
            "recipe_name": recipe_name,
            "search_count": next,
            "updated_at": Utc::now().to_rfc3339(),
        }]);
        self.request(
            SEARCH_COUNTS,
            Vec::new(),
            RequestOptions::upsert(row, "recipe_name"),
        )
        .await?;
        Ok(next)
    }

    pub async fn fetch_popular(&self, limit: u32) -> Result<Vec<PopularRecipe>, RemoteError> {
        self.fetch_rows(
            SEARCH_COUNTS,
            vec![
                ("select".to_string(), "recipe_name,search_count".to_string()),
                ("order".to_string(), "search_count.desc".to_string()),
                ("limit".to_string(), limit.to_string()),
            ],
        )
        .await
    }
}
