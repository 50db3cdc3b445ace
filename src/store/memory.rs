//! In-memory store with an optional JSON snapshot file.
//!
//! Tables live in `RwLock<HashMap>`s; every mutation rewrites the snapshot
//! so a restart picks up where the previous process left off.

use super::{ResetTokenRow, Store, StoreError, StoreResult};
use crate::types::{GameStats, User, UserId};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;

/// Schema version for snapshot format compatibility
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// A serializable snapshot of every table in the store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreSnapshot {
    /// Schema version for forward compatibility
    pub schema_version: u32,
    /// Snapshot timestamp (ISO8601)
    pub saved_at: String,
    pub users: HashMap<UserId, User>,
    pub stats: HashMap<UserId, GameStats>,
    pub reset_tokens: HashMap<UserId, ResetTokenRow>,
}

impl StoreSnapshot {
    /// Validate the snapshot before loading it
    pub fn validate(&self) -> Result<(), String> {
        if self.schema_version > SNAPSHOT_SCHEMA_VERSION {
            return Err(format!(
                "Snapshot schema version {} is newer than supported version {}. \
                 Please update the server.",
                self.schema_version, SNAPSHOT_SCHEMA_VERSION
            ));
        }

        for (user_id, token) in &self.reset_tokens {
            if !self.users.contains_key(user_id) {
                return Err(format!(
                    "Reset token for user '{}' has no matching user record",
                    token.user_id
                ));
            }
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct MemoryStore {
    users: RwLock<HashMap<UserId, User>>,
    stats: RwLock<HashMap<UserId, GameStats>>,
    reset_tokens: RwLock<HashMap<UserId, ResetTokenRow>>,
    snapshot_path: Option<PathBuf>,
}

impl MemoryStore {
    /// Create an empty store with no persistence.
    pub fn new() -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            stats: RwLock::new(HashMap::new()),
            reset_tokens: RwLock::new(HashMap::new()),
            snapshot_path: None,
        }
    }

    /// Create a store persisted to `path`, loading an existing snapshot
    /// when one is present.
    pub async fn with_snapshot(path: PathBuf) -> StoreResult<Self> {
        let mut store = Self::new();
        store.snapshot_path = Some(path.clone());

        match tokio::fs::read_to_string(&path).await {
            Ok(contents) => {
                let snapshot: StoreSnapshot = serde_json::from_str(&contents)
                    .map_err(|e| StoreError::Unavailable(format!("corrupt snapshot: {}", e)))?;
                snapshot.validate().map_err(StoreError::Unavailable)?;

                tracing::info!(
                    "Loaded store snapshot from {} ({} users)",
                    path.display(),
                    snapshot.users.len()
                );
                store.users = RwLock::new(snapshot.users);
                store.stats = RwLock::new(snapshot.stats);
                store.reset_tokens = RwLock::new(snapshot.reset_tokens);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!("No store snapshot at {}, starting fresh", path.display());
            }
            Err(e) => {
                return Err(StoreError::Unavailable(format!(
                    "failed to read snapshot: {}",
                    e
                )));
            }
        }

        Ok(store)
    }

    /// Write the current tables to the snapshot file, if one is configured.
    async fn persist(&self) -> StoreResult<()> {
        let Some(path) = &self.snapshot_path else {
            return Ok(());
        };

        let snapshot = StoreSnapshot {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            saved_at: chrono::Utc::now().to_rfc3339(),
            users: self.users.read().await.clone(),
            stats: self.stats.read().await.clone(),
            reset_tokens: self.reset_tokens.read().await.clone(),
        };

        let json = serde_json::to_string_pretty(&snapshot)
            .map_err(|e| StoreError::Unavailable(format!("snapshot serialization: {}", e)))?;
        tokio::fs::write(path, json)
            .await
            .map_err(|e| StoreError::Unavailable(format!("snapshot write: {}", e)))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn create_user(&self, user: User) -> StoreResult<()> {
        {
            let mut users = self.users.write().await;

            if users.values().any(|u| u.username == user.username) {
                return Err(StoreError::Conflict("Username already exists".to_string()));
            }
            if users.values().any(|u| u.email == user.email) {
                return Err(StoreError::Conflict("Email already exists".to_string()));
            }

            users.insert(user.id.clone(), user);
        }
        self.persist().await
    }

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>> {
        Ok(self
            .users
            .read()
            .await
            .values()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn update_credential(&self, user_id: &UserId, password_hash: String) -> StoreResult<()> {
        {
            let mut users = self.users.write().await;
            let user = users.get_mut(user_id).ok_or_else(|| {
                StoreError::Unavailable(format!("credential update for unknown user {}", user_id))
            })?;
            user.password_hash = password_hash;
        }
        self.persist().await
    }

    async fn get_stats(&self, user_id: &UserId) -> StoreResult<Option<GameStats>> {
        Ok(self.stats.read().await.get(user_id).cloned())
    }

    async fn save_stats(&self, user_id: &UserId, stats: GameStats) -> StoreResult<()> {
        self.stats.write().await.insert(user_id.clone(), stats);
        self.persist().await
    }

    async fn upsert_reset_token(&self, row: ResetTokenRow) -> StoreResult<()> {
        // Keyed by user id, so a second issue replaces the first in place.
        self.reset_tokens
            .write()
            .await
            .insert(row.user_id.clone(), row);
        self.persist().await
    }

    async fn get_reset_token(&self, token_hash: &str) -> StoreResult<Option<ResetTokenRow>> {
        Ok(self
            .reset_tokens
            .read()
            .await
            .values()
            .find(|t| t.token_hash == token_hash)
            .cloned())
    }

    async fn delete_reset_token(&self, user_id: &UserId) -> StoreResult<()> {
        self.reset_tokens.write().await.remove(user_id);
        self.persist().await
    }
}
