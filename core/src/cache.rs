use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::models::{GUEST_NAMESPACE, UserProfile};

const SESSION_KEY: &str = "session-current";

/// The user-scoped collections kept in the local cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CollectionKind {
    Settings,
    Pantry,
    SavedRecipes,
    ShoppingList,
}

impl CollectionKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Settings => "settings",
            Self::Pantry => "pantry",
            Self::SavedRecipes => "saved-recipes",
            Self::ShoppingList => "shopping-list",
        }
    }
}

/// `{collection}-{userId|guest}`
#[must_use]
pub fn cache_key(kind: CollectionKind, user_id: Option<&str>) -> String {
    format!("{}-{}", kind.as_str(), user_id.unwrap_or(GUEST_NAMESPACE))
}

/// JSON snapshots keyed by string, backed by SQLite.
pub struct LocalCache {
    conn: Connection,
}

impl LocalCache {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open cache database: {}", path.display()))?;
        let cache = LocalCache { conn };
        cache.migrate()?;
        Ok(cache)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = LocalCache { conn };
        cache.migrate()?;
        Ok(cache)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS cache_entries (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Raw entries ---

    pub fn put_raw(&self, key: &str, value: &str) -> Result<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO cache_entries (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_raw(&self, key: &str) -> Result<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM cache_entries WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn delete_raw(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM cache_entries WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    // --- Typed collections ---

    /// Load a collection snapshot. Absent, unreadable or undecodable entries
    /// yield `T::default()`; this never fails.
    pub fn load<T: DeserializeOwned + Default>(
        &self,
        kind: CollectionKind,
        user_id: Option<&str>,
    ) -> T {
        let key = cache_key(kind, user_id);
        match self.get_raw(&key) {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_else(|e| {
                tracing::warn!(%key, error = %e, "discarding corrupt cache entry");
                T::default()
            }),
            Ok(None) => T::default(),
            Err(e) => {
                tracing::warn!(%key, error = %e, "failed to read cache entry");
                T::default()
            }
        }
    }

    pub fn store<T: Serialize>(
        &self,
        kind: CollectionKind,
        user_id: Option<&str>,
        value: &T,
    ) -> Result<()> {
        let key = cache_key(kind, user_id);
        let raw = serde_json::to_string(value)
            .with_context(|| format!("Failed to serialize cache entry {key}"))?;
        self.put_raw(&key, &raw)
    }

    // --- Session ---

    pub fn store_session(&self, profile: &UserProfile) -> Result<()> {
        let raw = serde_json::to_string(profile)?;
        self.put_raw(SESSION_KEY, &raw)
    }

    /// The last established session, if any. A corrupt entry reads as no session.
    #[must_use]
    pub fn load_session(&self) -> Option<UserProfile> {
        let raw = self.get_raw(SESSION_KEY).ok().flatten()?;
        serde_json::from_str(&raw)
            .inspect_err(|e| tracing::warn!(error = %e, "discarding corrupt session entry"))
            .ok()
    }

    pub fn clear_session(&self) -> Result<bool> {
        self.delete_raw(SESSION_KEY)
    }
}
