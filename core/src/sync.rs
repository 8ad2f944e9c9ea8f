use std::sync::atomic::{AtomicBool, Ordering};

use anyhow::Result;

use crate::cache::{CollectionKind, LocalCache};
use crate::error::RemoteError;
use crate::events::{EventBus, SessionEvent, SubscriptionId};
use crate::models::{
    PantryItem, PopularRecipe, Recipe, SearchEvent, Settings, ShoppingItem, UserProfile,
    toggle_saved, upsert_pantry_item,
};
use crate::remote::{RemoteStore, RestTransport};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    LocalLoaded,
    RemoteReconciling,
    Synced,
}

/// What happened to the remote copy after a local mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Pushed,
    /// Gate still closed; the remote snapshot has not landed yet.
    Deferred,
    /// Guest session or no remote store configured.
    LocalOnly,
    /// The push was attempted and failed; the local copy is kept.
    Failed,
}

/// Outcome of one remote read during reconciliation.
#[derive(Debug, Clone, PartialEq)]
pub enum Fetched<V> {
    Remote(V),
    Unavailable(RemoteError),
    NotConfigured,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileTicket {
    epoch: u64,
    profile: UserProfile,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshot {
    epoch: u64,
    /// The profile as written back, after merging the stored row into it.
    pub profile: Option<UserProfile>,
    pub pantry: Fetched<Vec<PantryItem>>,
    pub saved_recipes: Fetched<Vec<Recipe>>,
}

/// Local-first session state. The cache loads before any remote call and
/// pushes wait until the remote snapshot has landed.
pub struct SyncEngine<T> {
    cache: LocalCache,
    remote: Option<RemoteStore<T>>,
    warned_unconfigured: AtomicBool,
    events: EventBus<SessionEvent>,
    state: SessionState,
    /// Bumped on every session change; replies tagged with an older epoch are dropped.
    epoch: u64,
    profile: Option<UserProfile>,
    settings: Settings,
    pantry: Vec<PantryItem>,
    saved_recipes: Vec<Recipe>,
    shopping_list: Vec<ShoppingItem>,
    pantry_loaded: bool,
    saved_recipes_loaded: bool,
}

impl<T: RestTransport> SyncEngine<T> {
    /// Start with no session, showing whatever the guest namespace holds.
    pub fn new(cache: LocalCache, remote: Option<RemoteStore<T>>) -> Self {
        let mut engine = Self {
            cache,
            remote,
            warned_unconfigured: AtomicBool::new(false),
            events: EventBus::new(),
            state: SessionState::NoSession,
            epoch: 0,
            profile: None,
            settings: Settings::default(),
            pantry: Vec::new(),
            saved_recipes: Vec::new(),
            shopping_list: Vec::new(),
            pantry_loaded: false,
            saved_recipes_loaded: false,
        };
        engine.load_local(None);
        engine
    }

    // --- Accessors ---

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    #[must_use]
    pub fn user_id(&self) -> Option<&str> {
        self.profile.as_ref().map(|p| p.id.as_str())
    }

    #[must_use]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[must_use]
    pub fn pantry(&self) -> &[PantryItem] {
        &self.pantry
    }

    #[must_use]
    pub fn saved_recipes(&self) -> &[Recipe] {
        &self.saved_recipes
    }

    #[must_use]
    pub fn shopping_list(&self) -> &[ShoppingItem] {
        &self.shopping_list
    }

    #[must_use]
    pub fn pantry_loaded(&self) -> bool {
        self.pantry_loaded
    }

    #[must_use]
    pub fn saved_recipes_loaded(&self) -> bool {
        self.saved_recipes_loaded
    }

    #[must_use]
    pub fn is_saved(&self, recipe_name: &str) -> bool {
        self.saved_recipes
            .iter()
            .any(|r| r.recipe_name == recipe_name)
    }

    #[must_use]
    pub fn has_remote(&self) -> bool {
        self.remote.is_some()
    }

    pub fn subscribe(
        &mut self,
        handler: impl FnMut(&SessionEvent) + Send + 'static,
    ) -> SubscriptionId {
        self.events.subscribe(handler)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// The remote store, warning once per engine when none is configured.
    fn remote(&self) -> Option<&RemoteStore<T>> {
        if self.remote.is_none() && !self.warned_unconfigured.swap(true, Ordering::Relaxed) {
            tracing::warn!("remote store not configured, running local-only");
        }
        self.remote.as_ref()
    }

    fn load_local(&mut self, user_id: Option<&str>) {
        self.settings = self.cache.load(CollectionKind::Settings, user_id);
        self.pantry = self.cache.load(CollectionKind::Pantry, user_id);
        self.saved_recipes = self.cache.load(CollectionKind::SavedRecipes, user_id);
        self.shopping_list = self.cache.load(CollectionKind::ShoppingList, user_id);
    }

    // --- Session lifecycle ---

    /// Login, signup or session restore. Loads the user's cached collections
    /// synchronously; no remote call happens here.
    pub fn begin_session(&mut self, mut profile: UserProfile) -> Result<()> {
        self.epoch += 1;
        self.pantry_loaded = false;
        self.saved_recipes_loaded = false;
        self.load_local(Some(&profile.id));

        // A fresh login profile is blank and must not erase what this user
        // already set up on this device.
        profile.has_completed_onboarding |= self.settings.has_completed_onboarding;
        if profile.preferred_cuisines.is_empty() {
            profile
                .preferred_cuisines
                .clone_from(&self.settings.preferred_cuisines);
        }
        self.mirror_profile_into_settings(&profile);

        self.cache.store_session(&profile)?;
        let user_id = profile.id.clone();
        tracing::info!(%user_id, "session established from local cache");
        self.profile = Some(profile);
        self.state = SessionState::LocalLoaded;
        self.events.publish(&SessionEvent::SignedIn { user_id });
        Ok(())
    }

    fn mirror_profile_into_settings(&mut self, profile: &UserProfile) {
        self.settings.has_completed_onboarding |= profile.has_completed_onboarding;
        if self.settings.preferred_cuisines.is_empty() {
            self.settings
                .preferred_cuisines
                .clone_from(&profile.preferred_cuisines);
        }
    }

    /// Re-establish the last session recorded in the cache, if any.
    pub fn restore_session(&mut self) -> Result<bool> {
        match self.cache.load_session() {
            Some(profile) => {
                self.begin_session(profile)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Reset in-memory state and close the gates. Cached collections stay
    /// on disk for the next login of the same user.
    pub fn logout(&mut self) -> Result<()> {
        let user_id = self.profile.take().map(|p| p.id);
        self.epoch += 1;
        self.state = SessionState::NoSession;
        self.pantry_loaded = false;
        self.saved_recipes_loaded = false;
        self.settings = Settings::default();
        self.pantry.clear();
        self.saved_recipes.clear();
        self.shopping_list.clear();
        self.cache.clear_session()?;
        tracing::info!(?user_id, "signed out");
        self.events.publish(&SessionEvent::SignedOut { user_id });
        Ok(())
    }

    // --- Reconciliation ---

    /// Enter `RemoteReconciling`. `None` without a session.
    pub fn start_reconcile(&mut self) -> Option<ReconcileTicket> {
        let profile = self.profile.clone()?;
        self.state = SessionState::RemoteReconciling;
        Some(ReconcileTicket {
            epoch: self.epoch,
            profile,
        })
    }

    /// Read the stored profile and both collections concurrently, then
    /// upsert the merged profile. Each failure is absorbed on its own.
    pub async fn fetch_remote(&self, ticket: &ReconcileTicket) -> RemoteSnapshot {
        let Some(remote) = self.remote() else {
            return RemoteSnapshot {
                epoch: ticket.epoch,
                profile: None,
                pantry: Fetched::NotConfigured,
                saved_recipes: Fetched::NotConfigured,
            };
        };
        let user_id = ticket.profile.id.as_str();

        let (stored, pantry, saved) = tokio::join!(
            remote.fetch_profile(user_id),
            remote.fetch_pantry(user_id),
            remote.fetch_saved_recipes(user_id),
        );

        // The upsert is skipped when the stored row could not be read, so an
        // unreadable row is never overwritten with a partial profile.
        let mut profile = ticket.profile.clone();
        match stored {
            Ok(stored) => {
                if let Some(stored) = stored {
                    profile.absorb_onboarding(&stored);
                }
                if let Err(e) = remote.save_profile(&profile).await {
                    tracing::warn!(%user_id, error = %e, "profile upsert failed");
                }
            }
            Err(e) => tracing::warn!(%user_id, error = %e, "stored profile unavailable"),
        }
        let pantry = pantry.map_or_else(
            |e| {
                tracing::warn!(%user_id, error = %e, "remote pantry unavailable");
                Fetched::Unavailable(e)
            },
            Fetched::Remote,
        );
        let saved_recipes = saved.map_or_else(
            |e| {
                tracing::warn!(%user_id, error = %e, "remote saved recipes unavailable");
                Fetched::Unavailable(e)
            },
            Fetched::Remote,
        );

        RemoteSnapshot {
            epoch: ticket.epoch,
            profile: Some(profile),
            pantry,
            saved_recipes,
        }
    }

    /// Let the remote snapshot win and open both gates. Returns false, and
    /// changes nothing, if the session changed while the fetch was in flight.
    pub fn finish_reconcile(&mut self, snapshot: RemoteSnapshot) -> Result<bool> {
        if snapshot.epoch != self.epoch || self.state != SessionState::RemoteReconciling {
            tracing::debug!("dropping remote snapshot for a session that is gone");
            return Ok(false);
        }
        let user_id = self.user_id().map(str::to_string);
        let uid = user_id.as_deref();

        if let Some(profile) = snapshot.profile {
            self.mirror_profile_into_settings(&profile);
            self.cache.store(CollectionKind::Settings, uid, &self.settings)?;
            self.cache.store_session(&profile)?;
            self.profile = Some(profile);
        }

        match snapshot.pantry {
            Fetched::Remote(items) => {
                self.cache.store(CollectionKind::Pantry, uid, &items)?;
                self.pantry = items;
            }
            // Remote has nothing we can see; the cached copy is left for the next session.
            Fetched::Unavailable(_) => self.pantry.clear(),
            Fetched::NotConfigured => {}
        }
        match snapshot.saved_recipes {
            Fetched::Remote(recipes) => {
                self.cache
                    .store(CollectionKind::SavedRecipes, uid, &recipes)?;
                self.saved_recipes = recipes;
            }
            Fetched::Unavailable(_) => self.saved_recipes.clear(),
            Fetched::NotConfigured => {}
        }

        self.pantry_loaded = true;
        self.saved_recipes_loaded = true;
        self.state = SessionState::Synced;
        if let Some(user_id) = user_id {
            tracing::info!(%user_id, "session synced");
            self.events.publish(&SessionEvent::Synced { user_id });
        }
        Ok(true)
    }

    /// `start_reconcile`, `fetch_remote`, `finish_reconcile` in one go.
    pub async fn reconcile(&mut self) -> Result<bool> {
        let Some(ticket) = self.start_reconcile() else {
            return Ok(false);
        };
        let snapshot = self.fetch_remote(&ticket).await;
        self.finish_reconcile(snapshot)
    }

    // --- Pushes ---

    async fn push_pantry(&self) -> PushOutcome {
        let Some(user_id) = self.user_id() else {
            return PushOutcome::LocalOnly;
        };
        let Some(remote) = self.remote() else {
            return PushOutcome::LocalOnly;
        };
        if !self.pantry_loaded {
            tracing::debug!(%user_id, "pantry push deferred until remote snapshot lands");
            return PushOutcome::Deferred;
        }
        match remote.replace_pantry(user_id, &self.pantry).await {
            Ok(()) => PushOutcome::Pushed,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "pantry push failed");
                PushOutcome::Failed
            }
        }
    }

    async fn push_saved_recipes(&self) -> PushOutcome {
        let Some(user_id) = self.user_id() else {
            return PushOutcome::LocalOnly;
        };
        let Some(remote) = self.remote() else {
            return PushOutcome::LocalOnly;
        };
        if !self.saved_recipes_loaded {
            tracing::debug!(%user_id, "saved recipes push deferred until remote snapshot lands");
            return PushOutcome::Deferred;
        }
        match remote
            .replace_saved_recipes(user_id, &self.saved_recipes)
            .await
        {
            Ok(()) => PushOutcome::Pushed,
            Err(e) => {
                tracing::warn!(%user_id, error = %e, "saved recipes push failed");
                PushOutcome::Failed
            }
        }
    }

    async fn push_profile(&self) -> PushOutcome {
        let Some(profile) = self.profile.as_ref() else {
            return PushOutcome::LocalOnly;
        };
        let Some(remote) = self.remote() else {
            return PushOutcome::LocalOnly;
        };
        match remote.save_profile(profile).await {
            Ok(()) => PushOutcome::Pushed,
            Err(e) => {
                tracing::warn!(user_id = %profile.id, error = %e, "profile upsert failed");
                PushOutcome::Failed
            }
        }
    }

    fn persist(&self, kind: CollectionKind) -> Result<()> {
        let uid = self.user_id();
        match kind {
            CollectionKind::Settings => self.cache.store(kind, uid, &self.settings),
            CollectionKind::Pantry => self.cache.store(kind, uid, &self.pantry),
            CollectionKind::SavedRecipes => self.cache.store(kind, uid, &self.saved_recipes),
            CollectionKind::ShoppingList => self.cache.store(kind, uid, &self.shopping_list),
        }
    }

    // --- Pantry ---

    pub async fn upsert_pantry_item(&mut self, item: PantryItem) -> Result<PushOutcome> {
        upsert_pantry_item(&mut self.pantry, item);
        self.persist(CollectionKind::Pantry)?;
        Ok(self.push_pantry().await)
    }

    /// Bulk last-write-wins merge, e.g. from a scanned receipt.
    pub async fn merge_pantry_items(&mut self, items: Vec<PantryItem>) -> Result<PushOutcome> {
        for item in items {
            upsert_pantry_item(&mut self.pantry, item);
        }
        self.persist(CollectionKind::Pantry)?;
        Ok(self.push_pantry().await)
    }

    pub async fn remove_pantry_item(&mut self, name: &str) -> Result<PushOutcome> {
        self.pantry.retain(|p| p.name != name);
        self.persist(CollectionKind::Pantry)?;
        Ok(self.push_pantry().await)
    }

    /// Destructive: the pantry becomes exactly `items`, locally and remotely.
    pub async fn replace_pantry(&mut self, items: Vec<PantryItem>) -> Result<PushOutcome> {
        self.pantry = Vec::with_capacity(items.len());
        for item in items {
            upsert_pantry_item(&mut self.pantry, item);
        }
        self.persist(CollectionKind::Pantry)?;
        Ok(self.push_pantry().await)
    }

    // --- Saved recipes ---

    pub async fn toggle_saved_recipe(&mut self, recipe: &Recipe) -> Result<PushOutcome> {
        toggle_saved(&mut self.saved_recipes, recipe);
        self.persist(CollectionKind::SavedRecipes)?;
        Ok(self.push_saved_recipes().await)
    }

    pub async fn remove_saved_recipe(&mut self, recipe_name: &str) -> Result<PushOutcome> {
        self.saved_recipes.retain(|r| r.recipe_name != recipe_name);
        self.persist(CollectionKind::SavedRecipes)?;
        Ok(self.push_saved_recipes().await)
    }

    // --- Shopping list (local only) ---

    pub fn add_to_shopping_list(&mut self, item: ShoppingItem) -> Result<()> {
        if let Some(existing) = self.shopping_list.iter_mut().find(|s| s.name == item.name) {
            *existing = item;
        } else {
            self.shopping_list.push(item);
        }
        self.persist(CollectionKind::ShoppingList)
    }

    /// Add each of the recipe's missing ingredients not already listed.
    pub fn add_missing_ingredients(&mut self, recipe: &Recipe) -> Result<usize> {
        let mut added = 0;
        for name in &recipe.missing_ingredients {
            if self.shopping_list.iter().any(|s| &s.name == name) {
                continue;
            }
            self.shopping_list.push(ShoppingItem {
                name: name.clone(),
                quantity: None,
                from_recipe: Some(recipe.recipe_name.clone()),
                checked: false,
            });
            added += 1;
        }
        self.persist(CollectionKind::ShoppingList)?;
        Ok(added)
    }

    /// Flip the checked flag. Returns false if no item has that name.
    pub fn toggle_shopping_item(&mut self, name: &str) -> Result<bool> {
        let Some(item) = self.shopping_list.iter_mut().find(|s| s.name == name) else {
            return Ok(false);
        };
        item.checked = !item.checked;
        self.persist(CollectionKind::ShoppingList)?;
        Ok(true)
    }

    pub fn remove_shopping_item(&mut self, name: &str) -> Result<bool> {
        let before = self.shopping_list.len();
        self.shopping_list.retain(|s| s.name != name);
        if self.shopping_list.len() == before {
            return Ok(false);
        }
        self.persist(CollectionKind::ShoppingList)?;
        Ok(true)
    }

    pub fn clear_checked_items(&mut self) -> Result<usize> {
        let before = self.shopping_list.len();
        self.shopping_list.retain(|s| !s.checked);
        self.persist(CollectionKind::ShoppingList)?;
        Ok(before - self.shopping_list.len())
    }

    // --- Settings and profile mirror ---

    pub fn set_language(&mut self, language: &str) -> Result<()> {
        language.clone_into(&mut self.settings.language);
        self.persist(CollectionKind::Settings)
    }

    pub async fn set_preferred_cuisines(&mut self, cuisines: Vec<String>) -> Result<PushOutcome> {
        if let Some(profile) = self.profile.as_mut() {
            profile.preferred_cuisines.clone_from(&cuisines);
        }
        self.settings.preferred_cuisines = cuisines;
        self.persist(CollectionKind::Settings)?;
        self.store_session_profile()?;
        Ok(self.push_profile().await)
    }

    pub async fn complete_onboarding(&mut self, cuisines: Vec<String>) -> Result<PushOutcome> {
        if let Some(profile) = self.profile.as_mut() {
            profile.has_completed_onboarding = true;
            profile.preferred_cuisines.clone_from(&cuisines);
        }
        self.settings.has_completed_onboarding = true;
        self.settings.preferred_cuisines = cuisines;
        self.persist(CollectionKind::Settings)?;
        self.store_session_profile()?;
        Ok(self.push_profile().await)
    }

    fn store_session_profile(&self) -> Result<()> {
        match self.profile.as_ref() {
            Some(profile) => self.cache.store_session(profile),
            None => Ok(()),
        }
    }

    // --- Search telemetry ---

    /// Append a search event, then bump the recipe's counter. Best effort:
    /// failures are logged and dropped.
    pub async fn record_recipe_view(&self, recipe_name: &str, search_term: &str) {
        let Some(remote) = self.remote() else {
            return;
        };
        let event = SearchEvent {
            user_id: self.user_id().map(str::to_string),
            recipe_name: recipe_name.to_string(),
            search_term: search_term.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        if let Err(e) = remote.append_search_event(&event).await {
            tracing::warn!(recipe = recipe_name, error = %e, "search event not recorded");
        }
        match remote.bump_popularity_counter(recipe_name).await {
            Ok(count) => tracing::debug!(recipe = recipe_name, count, "popularity bumped"),
            Err(e) => tracing::warn!(recipe = recipe_name, error = %e, "popularity not bumped"),
        }
    }

    /// Most searched recipes, or nothing if the store is unreachable.
    pub async fn popular_recipes(&self, limit: u32) -> Vec<PopularRecipe> {
        let Some(remote) = self.remote() else {
            return Vec::new();
        };
        remote.fetch_popular(limit).await.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "popular recipes unavailable");
            Vec::new()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Difficulty;
    use crate::remote::{INGREDIENTS, PROFILES, SAVED_RECIPES, SEARCH_COUNTS, SEARCH_EVENTS};
    use crate::testing::FakeStore;
    use serde_json::json;
    use std::sync::{Arc, Mutex};

    fn engine() -> (FakeStore, SyncEngine<FakeStore>) {
        let fake = FakeStore::new();
        let cache = LocalCache::open_in_memory().unwrap();
        (
            fake.clone(),
            SyncEngine::new(cache, Some(RemoteStore::new(fake))),
        )
    }

    fn local_only() -> SyncEngine<FakeStore> {
        SyncEngine::new(LocalCache::open_in_memory().unwrap(), None)
    }

    fn alice() -> UserProfile {
        UserProfile::new("alice", "alice@example.com")
    }

    fn recipe(name: &str) -> Recipe {
        Recipe {
            recipe_name: name.to_string(),
            english_recipe_name: name.to_string(),
            description: String::new(),
            cuisine: "Korean".to_string(),
            cook_time: 30,
            difficulty: Difficulty::Easy,
            spiciness: 3,
            calories: 450,
            servings: 2,
            ingredients: vec!["kimchi".to_string()],
            missing_ingredients: vec!["gochugaru".to_string(), "scallion".to_string()],
            instructions: vec!["Simmer".to_string()],
            substitutions: vec![],
            is_details_loaded: true,
        }
    }

    fn seed_remote_pantry(fake: &FakeStore, user: &str, name: &str, qty: &str) {
        fake.seed(
            INGREDIENTS,
            json!({"user_id": user, "name": name, "quantity": qty}),
        );
    }

    #[test]
    fn test_begin_session_loads_local_without_remote_calls() {
        let (fake, mut engine) = engine();
        engine
            .cache
            .store(
                CollectionKind::Pantry,
                Some("alice"),
                &vec![PantryItem::new("Egg", "2")],
            )
            .unwrap();

        engine.begin_session(alice()).unwrap();

        assert_eq!(engine.state(), SessionState::LocalLoaded);
        assert_eq!(engine.pantry(), &[PantryItem::new("Egg", "2")]);
        assert!(!engine.pantry_loaded());
        assert!(!engine.saved_recipes_loaded());
        assert!(fake.requests_for(INGREDIENTS).is_empty());
        assert!(fake.requests_for(PROFILES).is_empty());
    }

    #[tokio::test]
    async fn test_reconcile_remote_wins_and_opens_gates() {
        let (fake, mut engine) = engine();
        seed_remote_pantry(&fake, "alice", "Rice", "1kg");
        engine
            .cache
            .store(
                CollectionKind::Pantry,
                Some("alice"),
                &vec![PantryItem::new("Egg", "2")],
            )
            .unwrap();

        engine.begin_session(alice()).unwrap();
        assert!(engine.reconcile().await.unwrap());

        assert_eq!(engine.state(), SessionState::Synced);
        assert!(engine.pantry_loaded());
        assert!(engine.saved_recipes_loaded());
        assert_eq!(engine.pantry(), &[PantryItem::new("Rice", "1kg")]);
        // Remote result is written back to the local cache
        let cached: Vec<PantryItem> = engine.cache.load(CollectionKind::Pantry, Some("alice"));
        assert_eq!(cached, vec![PantryItem::new("Rice", "1kg")]);
        // Profile row upserted during reconciliation
        assert_eq!(fake.row_count(PROFILES), 1);
    }

    #[tokio::test]
    async fn test_no_remote_write_while_gate_closed() {
        let (fake, mut engine) = engine();
        engine.begin_session(alice()).unwrap();

        let outcome = engine
            .upsert_pantry_item(PantryItem::new("Egg", "2"))
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::Deferred);
        let outcome = engine.toggle_saved_recipe(&recipe("Kimchi Stew")).await.unwrap();
        assert_eq!(outcome, PushOutcome::Deferred);

        assert_eq!(fake.writes_to(INGREDIENTS), 0);
        assert_eq!(fake.writes_to(SAVED_RECIPES), 0);
        // Still persisted locally right away
        let cached: Vec<PantryItem> = engine.cache.load(CollectionKind::Pantry, Some("alice"));
        assert_eq!(cached, vec![PantryItem::new("Egg", "2")]);
    }

    #[tokio::test]
    async fn test_mutation_during_reconcile_is_not_pushed() {
        let (fake, mut engine) = engine();
        seed_remote_pantry(&fake, "alice", "Rice", "1kg");
        engine.begin_session(alice()).unwrap();

        let ticket = engine.start_reconcile().unwrap();
        assert_eq!(engine.state(), SessionState::RemoteReconciling);
        let snapshot = engine.fetch_remote(&ticket).await;

        let outcome = engine
            .upsert_pantry_item(PantryItem::new("Egg", "2"))
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::Deferred);
        assert_eq!(fake.writes_to(INGREDIENTS), 0);

        assert!(engine.finish_reconcile(snapshot).unwrap());
        assert_eq!(engine.pantry(), &[PantryItem::new("Rice", "1kg")]);
        assert_eq!(fake.writes_to(INGREDIENTS), 0);
    }

    #[tokio::test]
    async fn test_push_after_sync_replaces_remote() {
        let (fake, mut engine) = engine();
        seed_remote_pantry(&fake, "alice", "Rice", "1kg");
        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();

        let outcome = engine
            .upsert_pantry_item(PantryItem::new("Egg", "2"))
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::Pushed);

        let remote = RemoteStore::new(fake.clone());
        let mut names: Vec<String> = remote
            .fetch_pantry("alice")
            .await
            .unwrap()
            .into_iter()
            .map(|p| p.name)
            .collect();
        names.sort();
        assert_eq!(names, vec!["Egg", "Rice"]);
    }

    #[tokio::test]
    async fn test_replace_pantry_empty_clears_remote() {
        let (fake, mut engine) = engine();
        seed_remote_pantry(&fake, "alice", "Egg", "2");
        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();

        engine.replace_pantry(Vec::new()).await.unwrap();

        assert!(engine.pantry().is_empty());
        assert_eq!(fake.row_count(INGREDIENTS), 0);
    }

    #[tokio::test]
    async fn test_fetch_failures_are_absorbed_independently() {
        let (fake, mut engine) = engine();
        fake.seed(
            SAVED_RECIPES,
            json!({"user_id": "alice", "recipe_name": "Kimchi Stew", "recipe_data": recipe("Kimchi Stew")}),
        );
        fake.fail_path(INGREDIENTS, 503, "Service Unavailable");
        engine
            .cache
            .store(
                CollectionKind::Pantry,
                Some("alice"),
                &vec![PantryItem::new("Egg", "2")],
            )
            .unwrap();

        engine.begin_session(alice()).unwrap();
        assert!(engine.reconcile().await.unwrap());

        assert_eq!(engine.state(), SessionState::Synced);
        assert!(engine.pantry().is_empty());
        assert_eq!(engine.saved_recipes().len(), 1);
        assert!(engine.pantry_loaded());
        // The cached copy is not overwritten by the failed read
        let cached: Vec<PantryItem> = engine.cache.load(CollectionKind::Pantry, Some("alice"));
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_offline_push_fails_softly() {
        let (fake, mut engine) = engine();
        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();
        fake.set_offline(true);

        let outcome = engine
            .upsert_pantry_item(PantryItem::new("Egg", "2"))
            .await
            .unwrap();

        assert_eq!(outcome, PushOutcome::Failed);
        assert_eq!(engine.pantry(), &[PantryItem::new("Egg", "2")]);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_dropped_after_user_switch() {
        let (fake, mut engine) = engine();
        seed_remote_pantry(&fake, "alice", "Rice", "1kg");
        engine.begin_session(alice()).unwrap();
        let ticket = engine.start_reconcile().unwrap();
        let snapshot = engine.fetch_remote(&ticket).await;

        engine.logout().unwrap();
        engine
            .begin_session(UserProfile::new("bob", "bob@example.com"))
            .unwrap();

        assert!(!engine.finish_reconcile(snapshot).unwrap());
        assert!(engine.pantry().is_empty());
        assert!(!engine.pantry_loaded());
        assert_eq!(engine.state(), SessionState::LocalLoaded);
    }

    #[tokio::test]
    async fn test_logout_resets_memory_but_keeps_cache() {
        let (_, mut engine) = engine();
        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();
        engine
            .upsert_pantry_item(PantryItem::new("Egg", "2"))
            .await
            .unwrap();

        engine.logout().unwrap();

        assert_eq!(engine.state(), SessionState::NoSession);
        assert!(engine.pantry().is_empty());
        assert!(!engine.pantry_loaded());
        assert!(!engine.saved_recipes_loaded());
        assert!(engine.profile().is_none());
        assert!(!engine.restore_session().unwrap());

        let cached: Vec<PantryItem> = engine.cache.load(CollectionKind::Pantry, Some("alice"));
        assert_eq!(cached, vec![PantryItem::new("Egg", "2")]);
    }

    #[tokio::test]
    async fn test_relogin_keeps_remote_onboarding() {
        let (fake, mut engine) = engine();
        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();
        engine
            .complete_onboarding(vec!["Thai".to_string()])
            .await
            .unwrap();
        engine.logout().unwrap();

        // A fresh login carries a blank profile
        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();

        let profile = engine.profile().unwrap();
        assert!(profile.has_completed_onboarding);
        assert_eq!(profile.preferred_cuisines, vec!["Thai"]);
        let rows = fake.rows(PROFILES);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["has_completed_onboarding"], json!(true));
        assert_eq!(rows[0]["preferred_cuisines"], json!(["Thai"]));
    }

    #[tokio::test]
    async fn test_login_on_new_device_adopts_stored_profile() {
        let (fake, mut engine) = engine();
        fake.seed(
            PROFILES,
            json!({
                "id": "alice",
                "email": "alice@example.com",
                "has_completed_onboarding": true,
                "preferred_cuisines": ["Thai"]
            }),
        );

        engine.begin_session(alice()).unwrap();
        assert!(!engine.settings().has_completed_onboarding);
        engine.reconcile().await.unwrap();

        assert!(engine.settings().has_completed_onboarding);
        assert_eq!(engine.settings().preferred_cuisines, vec!["Thai"]);
        assert!(engine.profile().unwrap().has_completed_onboarding);
        let rows = fake.rows(PROFILES);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["has_completed_onboarding"], json!(true));
        assert_eq!(rows[0]["preferred_cuisines"], json!(["Thai"]));
    }

    #[tokio::test]
    async fn test_unreadable_profile_row_is_not_overwritten() {
        let (fake, mut engine) = engine();
        fake.fail_path(PROFILES, 500, r#"{"message":"boom"}"#);

        engine.begin_session(alice()).unwrap();
        assert!(engine.reconcile().await.unwrap());

        assert_eq!(engine.state(), SessionState::Synced);
        assert_eq!(fake.writes_to(PROFILES), 0);
    }

    #[tokio::test]
    async fn test_null_remote_quantity_does_not_drop_pantry() {
        let (fake, mut engine) = engine();
        fake.seed(
            INGREDIENTS,
            json!({"user_id": "alice", "name": "Egg", "quantity": null}),
        );
        seed_remote_pantry(&fake, "alice", "Rice", "1kg");

        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();
        assert_eq!(
            engine.pantry(),
            &[PantryItem::new("Egg", ""), PantryItem::new("Rice", "1kg")]
        );

        engine
            .upsert_pantry_item(PantryItem::new("Milk", "1L"))
            .await
            .unwrap();
        let mut names: Vec<String> = fake
            .rows(INGREDIENTS)
            .iter()
            .map(|r| r["name"].as_str().unwrap().to_string())
            .collect();
        names.sort();
        assert_eq!(names, vec!["Egg", "Milk", "Rice"]);
    }

    #[test]
    fn test_users_never_see_each_other() {
        let (_, mut engine) = engine();
        engine
            .cache
            .store(
                CollectionKind::Pantry,
                Some("alice"),
                &vec![PantryItem::new("Egg", "2")],
            )
            .unwrap();

        engine
            .begin_session(UserProfile::new("bob", "bob@example.com"))
            .unwrap();
        assert!(engine.pantry().is_empty());
    }

    #[test]
    fn test_restore_session() {
        let (_, mut engine) = engine();
        engine.begin_session(alice()).unwrap();

        let cache = std::mem::replace(&mut engine.cache, LocalCache::open_in_memory().unwrap());
        let mut restored: SyncEngine<FakeStore> = SyncEngine::new(cache, None);
        assert!(restored.restore_session().unwrap());
        assert_eq!(restored.user_id(), Some("alice"));
        assert_eq!(restored.state(), SessionState::LocalLoaded);
    }

    #[tokio::test]
    async fn test_guest_mutations_stay_local() {
        let (fake, mut engine) = engine();
        let outcome = engine
            .upsert_pantry_item(PantryItem::new("Egg", "2"))
            .await
            .unwrap();

        assert_eq!(outcome, PushOutcome::LocalOnly);
        assert_eq!(fake.writes_to(INGREDIENTS), 0);
        let cached: Vec<PantryItem> = engine.cache.load(CollectionKind::Pantry, None);
        assert_eq!(cached.len(), 1);
    }

    #[tokio::test]
    async fn test_unconfigured_remote_keeps_local_state() {
        let mut engine = local_only();
        engine
            .cache
            .store(
                CollectionKind::Pantry,
                Some("alice"),
                &vec![PantryItem::new("Egg", "2")],
            )
            .unwrap();
        engine.begin_session(alice()).unwrap();

        assert!(engine.reconcile().await.unwrap());
        assert_eq!(engine.pantry(), &[PantryItem::new("Egg", "2")]);

        let outcome = engine
            .upsert_pantry_item(PantryItem::new("Milk", "1L"))
            .await
            .unwrap();
        assert_eq!(outcome, PushOutcome::LocalOnly);
        assert!(engine.popular_recipes(5).await.is_empty());
    }

    #[tokio::test]
    async fn test_session_events_published() {
        let (_, mut engine) = engine();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let s = seen.clone();
        let id = engine.subscribe(move |e| s.lock().unwrap().push(e.clone()));

        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();
        engine.logout().unwrap();
        assert!(engine.unsubscribe(id));
        engine.begin_session(alice()).unwrap();

        let seen = seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![
                SessionEvent::SignedIn {
                    user_id: "alice".to_string()
                },
                SessionEvent::Synced {
                    user_id: "alice".to_string()
                },
                SessionEvent::SignedOut {
                    user_id: Some("alice".to_string())
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_toggle_saved_recipe_after_sync() {
        let (fake, mut engine) = engine();
        engine.begin_session(alice()).unwrap();
        engine.reconcile().await.unwrap();

        engine.toggle_saved_recipe(&recipe("Kimchi Stew")).await.unwrap();
        assert!(engine.is_saved("Kimchi Stew"));
        assert_eq!(fake.row_count(SAVED_RECIPES), 1);

        engine.toggle_saved_recipe(&recipe("Kimchi Stew")).await.unwrap();
        assert!(!engine.is_saved("Kimchi Stew"));
        assert_eq!(fake.row_count(SAVED_RECIPES), 0);
    }

    #[tokio::test]
    async fn test_onboarding_mirrors_into_profile() {
        let (fake, mut engine) = engine();
        engine.begin_session(alice()).unwrap();

        let outcome = engine
            .complete_onboarding(vec!["Thai".to_string(), "Korean".to_string()])
            .await
            .unwrap();

        assert_eq!(outcome, PushOutcome::Pushed);
        assert!(engine.settings().has_completed_onboarding);
        let profile = engine.profile().unwrap();
        assert!(profile.has_completed_onboarding);
        assert_eq!(profile.preferred_cuisines, vec!["Thai", "Korean"]);

        let rows = fake.rows(PROFILES);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0]["has_completed_onboarding"], json!(true));
    }

    #[test]
    fn test_shopping_list_operations() {
        let mut engine = local_only();
        let added = engine.add_missing_ingredients(&recipe("Kimchi Stew")).unwrap();
        assert_eq!(added, 2);
        // Already listed items are not duplicated
        assert_eq!(engine.add_missing_ingredients(&recipe("Kimchi Stew")).unwrap(), 0);

        assert!(engine.toggle_shopping_item("scallion").unwrap());
        assert!(!engine.toggle_shopping_item("caviar").unwrap());
        assert_eq!(engine.clear_checked_items().unwrap(), 1);
        assert_eq!(engine.shopping_list().len(), 1);
        assert_eq!(
            engine.shopping_list()[0].from_recipe.as_deref(),
            Some("Kimchi Stew")
        );
        assert!(engine.remove_shopping_item("gochugaru").unwrap());
        assert!(engine.shopping_list().is_empty());
    }

    #[tokio::test]
    async fn test_record_recipe_view_counts_sequential_searches() {
        let (fake, mut engine) = engine();
        fake.seed(
            SEARCH_COUNTS,
            json!({"recipe_name": "Kimchi Stew", "search_count": 5}),
        );
        engine.begin_session(alice()).unwrap();

        engine.record_recipe_view("Kimchi Stew", "kimchi").await;
        engine.record_recipe_view("Kimchi Stew", "kimchi").await;

        assert_eq!(fake.row_count(SEARCH_EVENTS), 2);
        assert_eq!(fake.rows(SEARCH_COUNTS)[0]["search_count"], json!(7));
        let popular = engine.popular_recipes(10).await;
        assert_eq!(popular[0].search_count, 7);
    }

    #[tokio::test]
    async fn test_record_recipe_view_absorbs_failures() {
        let (fake, engine) = engine();
        fake.set_offline(true);
        engine.record_recipe_view("Kimchi Stew", "kimchi").await;
        assert!(engine.popular_recipes(10).await.is_empty());
    }
}
