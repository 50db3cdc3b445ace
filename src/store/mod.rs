//! Persistence seam for accounts, statistics, and reset tokens.
//!
//! The rest of the crate only sees the [`Store`] trait; the backing engine
//! is opaque. [`MemoryStore`] is the bundled implementation, optionally
//! persisted to a JSON snapshot file.

mod memory;

pub use memory::{MemoryStore, StoreSnapshot, SNAPSHOT_SCHEMA_VERSION};

use crate::types::{GameStats, User, UserId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write (message is user-facing)
    #[error("{0}")]
    Conflict(String),

    /// The storage capability itself failed; callers may retry
    #[error("storage unavailable: {0}")]
    Unavailable(String),
}

/// A pending password reset. At most one row exists per user; the token
/// itself is stored hashed so the row never contains a usable credential.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetTokenRow {
    pub user_id: UserId,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Row store with uniqueness constraints on username, email, and
/// one reset token per user.
#[async_trait]
pub trait Store: Send + Sync {
    /// Insert a new account. Fails with [`StoreError::Conflict`] when the
    /// username or email is already taken.
    async fn create_user(&self, user: User) -> StoreResult<()>;

    async fn get_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    async fn get_user_by_email(&self, email: &str) -> StoreResult<Option<User>>;

    /// Replace a user's stored credential hash.
    async fn update_credential(&self, user_id: &UserId, password_hash: String) -> StoreResult<()>;

    /// Stats for a user, `None` when nothing has been recorded yet.
    async fn get_stats(&self, user_id: &UserId) -> StoreResult<Option<GameStats>>;

    async fn save_stats(&self, user_id: &UserId, stats: GameStats) -> StoreResult<()>;

    /// Insert-or-replace the reset token row for `row.user_id` as one
    /// operation. Implementations must key on the user id directly rather
    /// than read-then-write, so concurrent issuance for the same user can
    /// never leave two rows behind.
    async fn upsert_reset_token(&self, row: ResetTokenRow) -> StoreResult<()>;

    /// Look up a reset token row by its token hash.
    async fn get_reset_token(&self, token_hash: &str) -> StoreResult<Option<ResetTokenRow>>;

    async fn delete_reset_token(&self, user_id: &UserId) -> StoreResult<()>;
}
