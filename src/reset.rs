//! Password-reset token lifecycle: issue, expire, consume.
//!
//! A token moves through `Active -> {Consumed, Expired}`; at most one is
//! live per user because issuance upserts on the user id. Tokens are
//! random 256-bit values handed to the user once and stored only as a
//! SHA-256 hash. Expiry is checked at consume time, never swept.

use crate::auth::{self, AuthError};
use crate::store::{ResetTokenRow, Store, StoreError};
use crate::types::UserId;
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// Wall-clock seam so expiry is testable.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Errors surfaced by `consume`. NotFound and Expired are expected
/// control-flow outcomes for the caller, not faults.
#[derive(Debug, thiserror::Error)]
pub enum ResetError {
    #[error("reset token not found")]
    NotFound,

    #[error("reset token expired")]
    Expired,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Auth(#[from] AuthError),
}

pub struct ResetService {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
    ttl: Duration,
}

impl ResetService {
    pub fn new(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self {
            store,
            clock,
            ttl: Duration::hours(1),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// 32 random bytes, hex-encoded. 256 bits of entropy.
    fn generate_token() -> String {
        let mut bytes = [0u8; 32];
        rand::rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }

    fn hash_token(token: &str) -> String {
        hex::encode(Sha256::digest(token.as_bytes()))
    }

    /// Issue a reset token for a user, superseding any existing one.
    ///
    /// Returns the plaintext token; only its hash is stored. Email
    /// delivery is a separate concern and never affects issuance.
    pub async fn issue(&self, user_id: &UserId) -> Result<String, StoreError> {
        let token = Self::generate_token();
        let row = ResetTokenRow {
            user_id: user_id.clone(),
            token_hash: Self::hash_token(&token),
            expires_at: self.clock.now() + self.ttl,
        };
        self.store.upsert_reset_token(row).await?;

        tracing::info!("Issued password reset token for user {}", user_id);
        Ok(token)
    }

    /// Consume a token: verify it, rotate the owner's credential, and
    /// delete the row so the token is single-use. An expired row is
    /// deleted on the way out.
    pub async fn consume(&self, token: &str, new_password: &str) -> Result<UserId, ResetError> {
        let row = self
            .store
            .get_reset_token(&Self::hash_token(token))
            .await?
            .ok_or(ResetError::NotFound)?;

        if row.expires_at < self.clock.now() {
            self.store.delete_reset_token(&row.user_id).await?;
            tracing::debug!("Discarded expired reset token for user {}", row.user_id);
            return Err(ResetError::Expired);
        }

        let password_hash = auth::hash_password(new_password)?;
        self.store
            .update_credential(&row.user_id, password_hash)
            .await?;
        self.store.delete_reset_token(&row.user_id).await?;

        tracing::info!("Password reset completed for user {}", row.user_id);
        Ok(row.user_id)
    }
}
