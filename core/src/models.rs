use anyhow::{Result, bail};
use serde::{Deserialize, Serialize};

pub const GUEST_NAMESPACE: &str = "guest";
pub const DEFAULT_LANGUAGE: &str = "en";
pub const SPICINESS_RANGE: std::ops::RangeInclusive<u8> = 1..=5;

// --- Pantry ---

/// One pantry entry. Identity is the exact, case-sensitive `name`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PantryItem {
    pub name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub quantity: String,
}

/// Treat an explicit `null` like a missing field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

impl PantryItem {
    pub fn new(name: impl Into<String>, quantity: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            quantity: quantity.into(),
        }
    }
}

/// Insert or overwrite by name. Returns true when the item was new.
pub fn upsert_pantry_item(pantry: &mut Vec<PantryItem>, item: PantryItem) -> bool {
    if let Some(existing) = pantry.iter_mut().find(|p| p.name == item.name) {
        existing.quantity = item.quantity;
        false
    } else {
        pantry.push(item);
        true
    }
}

#[must_use]
pub fn pantry_names(pantry: &[PantryItem]) -> Vec<String> {
    pantry.iter().map(|p| p.name.clone()).collect()
}

// --- Recipes ---

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Easy => write!(f, "Easy"),
            Self::Medium => write!(f, "Medium"),
            Self::Hard => write!(f, "Hard"),
        }
    }
}

impl std::str::FromStr for Difficulty {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "easy" => Ok(Self::Easy),
            "medium" => Ok(Self::Medium),
            "hard" => Ok(Self::Hard),
            _ => bail!("Invalid difficulty '{s}'. Must be one of: easy, medium, hard"),
        }
    }
}

impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Substitution {
    pub missing: String,
    pub substitute: String,
}

/// A generated recipe. Partial (overview only) until `is_details_loaded` is set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipe {
    pub recipe_name: String,
    #[serde(default)]
    pub english_recipe_name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub cuisine: String,
    #[serde(default)]
    pub cook_time: u32,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_spiciness")]
    pub spiciness: u8,
    #[serde(default)]
    pub calories: u32,
    #[serde(default)]
    pub servings: u32,
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub missing_ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
    #[serde(default)]
    pub is_details_loaded: bool,
}

fn default_spiciness() -> u8 {
    *SPICINESS_RANGE.start()
}

impl Recipe {
    /// Strip any detail fields the backend may have volunteered and mark the
    /// recipe partial. Spiciness is clamped into range.
    #[must_use]
    pub fn into_overview(mut self) -> Self {
        self.instructions.clear();
        self.substitutions.clear();
        self.is_details_loaded = false;
        self.spiciness = self
            .spiciness
            .clamp(*SPICINESS_RANGE.start(), *SPICINESS_RANGE.end());
        self
    }

    /// Merge a Stage-B response into this overview and mark it loaded.
    pub fn apply_details(&mut self, details: RecipeDetails) {
        if !details.ingredients.is_empty() {
            self.ingredients = details.ingredients;
        }
        self.instructions = details.instructions;
        self.substitutions = details.substitutions;
        self.is_details_loaded = true;
    }
}

/// Payload of a `getRecipeDetails` result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeDetails {
    #[serde(default)]
    pub ingredients: Vec<String>,
    #[serde(default)]
    pub instructions: Vec<String>,
    #[serde(default)]
    pub substitutions: Vec<Substitution>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeFilters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cuisine: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub servings: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spiciness: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<Difficulty>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_cook_time: Option<u32>,
}

pub fn validate_filters(filters: &RecipeFilters) -> Result<()> {
    if let Some(s) = filters.spiciness {
        if !SPICINESS_RANGE.contains(&s) {
            bail!("Spiciness must be between 1 and 5 (got {s})");
        }
    }
    if filters.servings == Some(0) {
        bail!("Servings must be greater than 0");
    }
    if filters.max_cook_time == Some(0) {
        bail!("Max cook time must be greater than 0");
    }
    if filters.cuisine.as_deref().is_some_and(|c| c.trim().is_empty()) {
        bail!("Cuisine filter must not be empty");
    }
    Ok(())
}

/// Add the recipe if absent, remove it if present. Returns whether it is saved afterwards.
pub fn toggle_saved(saved: &mut Vec<Recipe>, recipe: &Recipe) -> bool {
    if let Some(pos) = saved
        .iter()
        .position(|r| r.recipe_name == recipe.recipe_name)
    {
        saved.remove(pos);
        false
    } else {
        saved.push(recipe.clone());
        true
    }
}

// --- Chat ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Chef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

// --- Profile and settings ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default)]
    pub has_completed_onboarding: bool,
    #[serde(default)]
    pub preferred_cuisines: Vec<String>,
}

impl UserProfile {
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            display_name: None,
            has_completed_onboarding: false,
            preferred_cuisines: Vec::new(),
        }
    }

    /// Take onboarding state from `other` where this profile has none.
    /// Onboarding is never undone; cuisines are filled only when empty.
    pub fn absorb_onboarding(&mut self, other: &UserProfile) {
        self.has_completed_onboarding |= other.has_completed_onboarding;
        if self.preferred_cuisines.is_empty() {
            self.preferred_cuisines.clone_from(&other.preferred_cuisines);
        }
        if self.display_name.is_none() {
            self.display_name.clone_from(&other.display_name);
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Settings {
    pub language: String,
    #[serde(default)]
    pub preferred_cuisines: Vec<String>,
    #[serde(default)]
    pub has_completed_onboarding: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            preferred_cuisines: Vec::new(),
            has_completed_onboarding: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShoppingItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quantity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_recipe: Option<String>,
    #[serde(default)]
    pub checked: bool,
}

// --- Search telemetry ---

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    pub recipe_name: String,
    pub search_term: String,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PopularRecipe {
    pub recipe_name: String,
    pub search_count: u32,
}

/// Parse a comma-separated cuisine list, dropping blanks and duplicates.
#[must_use]
pub fn parse_cuisine_list(s: &str) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    for c in s.split(',').map(str::trim).filter(|c| !c.is_empty()) {
        if !out.iter().any(|o| o.eq_ignore_ascii_case(c)) {
            out.push(c.to_string());
        }
    }
    out
}
