use crate::chef::{ChefClient, ChefTransport};
use crate::error::AiError;
use crate::models::{Recipe, RecipeDetails, RecipeFilters};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BoardState {
    Empty,
    Loaded,
    /// Stage A succeeded with zero candidates.
    NoMatches,
    Failed,
}

/// Everything Stage B needs, captured when the detail request is issued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetailTicket {
    generation: u64,
    index: usize,
    pub recipe_name: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetailApply {
    Merged,
    /// The request failed; the overview card is untouched.
    Failed,
    /// The board moved on (new search, cleared) before the reply arrived.
    Stale,
}

/// Stage A fills the board with partial recipes; Stage B runs once per
/// recipe on first inspection and is merged into the card.
#[derive(Debug)]
pub struct RecipeBoard {
    generation: u64,
    recipes: Vec<Recipe>,
    state: BoardState,
}

impl Default for RecipeBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl RecipeBoard {
    #[must_use]
    pub fn new() -> Self {
        Self {
            generation: 0,
            recipes: Vec::new(),
            state: BoardState::Empty,
        }
    }

    #[must_use]
    pub fn recipes(&self) -> &[Recipe] {
        &self.recipes
    }

    #[must_use]
    pub fn state(&self) -> BoardState {
        self.state
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Recipe> {
        self.recipes.get(index)
    }

    pub fn clear(&mut self) {
        self.generation += 1;
        self.recipes.clear();
        self.state = BoardState::Empty;
    }

    /// Run Stage A. On failure the board stays empty: no partial results.
    pub async fn search<T: ChefTransport>(
        &mut self,
        chef: &ChefClient<T>,
        pantry_names: &[String],
        priority_names: &[String],
        filters: &RecipeFilters,
        language: &str,
    ) -> Result<&[Recipe], AiError> {
        self.clear();
        match chef
            .get_overview(pantry_names, priority_names, filters, language)
            .await
        {
            Ok(recipes) => {
                self.state = if recipes.is_empty() {
                    BoardState::NoMatches
                } else {
                    BoardState::Loaded
                };
                tracing::info!(count = recipes.len(), "recipe overview loaded");
                self.recipes = recipes;
                Ok(&self.recipes)
            }
            Err(e) => {
                self.state = BoardState::Failed;
                Err(e)
            }
        }
    }

    /// `None` when the slot does not exist or its details are already loaded.
    #[must_use]
    pub fn begin_detail(&self, index: usize) -> Option<DetailTicket> {
        let recipe = self.recipes.get(index)?;
        if recipe.is_details_loaded {
            return None;
        }
        Some(DetailTicket {
            generation: self.generation,
            index,
            recipe_name: recipe.recipe_name.clone(),
        })
    }

    /// Merge a Stage-B outcome. Replies for a superseded board are dropped.
    pub fn apply_details(
        &mut self,
        ticket: &DetailTicket,
        outcome: &Result<RecipeDetails, AiError>,
    ) -> DetailApply {
        if ticket.generation != self.generation {
            tracing::debug!(recipe = %ticket.recipe_name, "dropping detail reply for old search");
            return DetailApply::Stale;
        }
        let Some(recipe) = self.recipes.get_mut(ticket.index) else {
            return DetailApply::Stale;
        };
        if recipe.recipe_name != ticket.recipe_name {
            return DetailApply::Stale;
        }
        match outcome {
            Ok(details) => {
                recipe.apply_details(details.clone());
                DetailApply::Merged
            }
            Err(e) => {
                tracing::warn!(recipe = %ticket.recipe_name, error = %e, "recipe details failed");
                DetailApply::Failed
            }
        }
    }

    /// Inspect a card, fetching details the first time only.
    pub async fn inspect<T: ChefTransport>(
        &mut self,
        chef: &ChefClient<T>,
        index: usize,
        pantry_names: &[String],
        language: &str,
    ) -> Result<&Recipe, AiError> {
        if let Some(ticket) = self.begin_detail(index) {
            let outcome = chef
                .get_details(&ticket.recipe_name, pantry_names, language)
                .await;
            self.apply_details(&ticket, &outcome);
            outcome?;
        }
        self.recipes
            .get(index)
            .ok_or_else(|| AiError::NonRetryable(format!("no recipe at position {}", index + 1)))
    }
}
