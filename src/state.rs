//! Shared application state: the store, the mail sender, the reset
//! service, and the in-memory session table that carries each user's
//! live match.

use crate::auth::{self, UserInfo, ValidationPolicy};
use crate::email::{DisclosurePolicy, Email, EmailConfig, EmailSender};
use crate::game::{self, RandomSource, ThreadRngSource};
use crate::reset::{Clock, ResetError, ResetService, SystemClock};
use crate::store::{Store, StoreError};
use crate::types::{
    GameConfig, GameStats, MatchState, PlayerSlot, RoundOutcome, SessionToken, User, UserId,
};
use rand::RngCore;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// An authenticated connection and its match in progress.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: SessionToken,
    pub user: UserInfo,
    pub match_state: MatchState,
}

/// Errors from session-scoped operations
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("invalid session token")]
    Unauthorized,

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Everything a round produces, returned to the caller in one piece.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RollReport {
    pub outcome: RoundOutcome,
    pub match_state: MatchState,
    pub match_winner: Option<PlayerSlot>,
    pub stats: GameStats,
}

/// What happened to a forgot-password request, before the disclosure
/// policy decides how much of it the end user gets to see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetRequestOutcome {
    /// Token issued and the email handed to the relay
    Sent,
    /// Token issued but delivery failed or no relay is configured
    SendFailed,
    /// No account with that address; nothing was issued
    UnknownEmail,
}

/// Shared application state
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub mailer: Option<Arc<dyn EmailSender>>,
    pub reset: ResetService,
    pub rng: Arc<dyn RandomSource>,
    pub config: GameConfig,
    pub validation: ValidationPolicy,
    pub reset_link_base: String,
    pub disclosure: DisclosurePolicy,
    sessions: RwLock<HashMap<SessionToken, Session>>,
}

/// Generate a random session token (128 bits, hex)
fn generate_session_token() -> SessionToken {
    let mut bytes = [0u8; 16];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

impl AppState {
    pub fn new(store: Arc<dyn Store>) -> Self {
        let reset = ResetService::new(store.clone(), Arc::new(SystemClock));
        Self {
            store,
            mailer: None,
            reset,
            rng: Arc::new(ThreadRngSource),
            config: GameConfig::default(),
            validation: ValidationPolicy::Lenient,
            reset_link_base: EmailConfig::default().reset_link_base,
            disclosure: DisclosurePolicy::Generic,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// Attach the configured mail sender and disclosure/link settings.
    pub fn with_email(mut self, config: &EmailConfig) -> Self {
        self.mailer = config
            .build_sender()
            .map(|sender| Arc::new(sender) as Arc<dyn EmailSender>);
        self.reset_link_base = config.reset_link_base.clone();
        self.disclosure = config.disclosure;
        self
    }

    pub fn with_mailer(mut self, mailer: Arc<dyn EmailSender>) -> Self {
        self.mailer = Some(mailer);
        self
    }

    pub fn with_game_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_validation(mut self, policy: ValidationPolicy) -> Self {
        self.validation = policy;
        self
    }

    /// Swap the wall clock used for token expiry (tests pin time with this).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.reset = ResetService::new(self.store.clone(), clock);
        self
    }

    pub fn with_rng(mut self, rng: Arc<dyn RandomSource>) -> Self {
        self.rng = rng;
        self
    }

    // ===== Accounts =====

    /// Create an account and log it in. The error string is user-facing.
    pub async fn signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Session, String> {
        self.validation.validate_signup(username, email, password)?;

        let password_hash = auth::hash_password(password).map_err(|e| {
            tracing::error!("Password hashing failed during signup: {}", e);
            "Error creating account".to_string()
        })?;

        let user = User {
            id: ulid::Ulid::new().to_string(),
            username: username.trim().to_string(),
            email: email.trim().to_string(),
            password_hash,
            created_at: chrono::Utc::now(),
        };

        match self.store.create_user(user.clone()).await {
            Ok(()) => {
                tracing::info!("Created account {} ({})", user.username, user.id);
                Ok(self.create_session(&user).await)
            }
            Err(StoreError::Conflict(message)) => Err(message),
            Err(e) => {
                tracing::error!("Signup failed: {}", e);
                Err("Error creating account".to_string())
            }
        }
    }

    /// Verify credentials and open a session. Wrong username and wrong
    /// password produce the same message.
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, String> {
        if username.is_empty() || password.is_empty() {
            return Err("Username and password are required".to_string());
        }

        let user = match self.store.get_user_by_username(username).await {
            Ok(user) => user,
            Err(e) => {
                tracing::error!("Login lookup failed: {}", e);
                return Err("Error logging in".to_string());
            }
        };

        match user {
            Some(user) if auth::verify_password(password, &user.password_hash) => {
                Ok(self.create_session(&user).await)
            }
            _ => Err("Invalid username or password".to_string()),
        }
    }

    // ===== Sessions =====

    /// Open a session for a user with a fresh match.
    pub async fn create_session(&self, user: &User) -> Session {
        let session = Session {
            token: generate_session_token(),
            user: UserInfo {
                id: user.id.clone(),
                username: user.username.clone(),
            },
            match_state: MatchState::default(),
        };

        self.sessions
            .write()
            .await
            .insert(session.token.clone(), session.clone());
        session
    }

    pub async fn session(&self, token: &str) -> Option<Session> {
        self.sessions.read().await.get(token).cloned()
    }

    /// Drop a session. Returns whether one existed.
    pub async fn end_session(&self, token: &str) -> bool {
        self.sessions.write().await.remove(token).is_some()
    }

    /// Drop every session belonging to a user (after a password reset).
    pub async fn end_sessions_for_user(&self, user_id: &UserId) {
        self.sessions
            .write()
            .await
            .retain(|_, session| session.user.id != *user_id);
    }

    // ===== Game flow =====

    /// Play one round for a session: roll, apply to the match, check for a
    /// match winner, fold the outcome into the lifetime stats, persist.
    pub async fn roll_for_session(&self, token: &str) -> Result<RollReport, SessionError> {
        let outcome = game::roll_round(self.rng.as_ref());

        let (user_id, match_state) = {
            let mut sessions = self.sessions.write().await;
            let session = sessions.get_mut(token).ok_or(SessionError::Unauthorized)?;
            session.match_state = game::apply_outcome(&session.match_state, &outcome);
            (session.user.id.clone(), session.match_state.clone())
        };

        let match_winner = game::check_match_winner(&match_state, self.config.win_threshold);
        if let Some(winner) = match_winner {
            tracing::info!(
                "Match won by {:?} at {}:{} after {} rounds",
                winner,
                match_state.player_one_score,
                match_state.player_two_score,
                match_state.round_count
            );
        }

        let current = self.store.get_stats(&user_id).await?.unwrap_or_default();
        let stats = game::record_stats(&current, &outcome);
        self.store.save_stats(&user_id, stats.clone()).await?;

        Ok(RollReport {
            outcome,
            match_state,
            match_winner,
            stats,
        })
    }

    /// Reset the session's match to zero. Lifetime stats are untouched.
    pub async fn reset_match(&self, token: &str) -> Result<MatchState, SessionError> {
        let mut sessions = self.sessions.write().await;
        let session = sessions.get_mut(token).ok_or(SessionError::Unauthorized)?;
        session.match_state = MatchState::default();
        Ok(session.match_state.clone())
    }

    /// Lifetime stats for a user, all zeroes when none are recorded yet.
    pub async fn stats_for(&self, user_id: &UserId) -> Result<GameStats, StoreError> {
        Ok(self.store.get_stats(user_id).await?.unwrap_or_default())
    }

    // ===== Password reset =====

    /// Handle a forgot-password request. Issues (or reissues) a token for
    /// a known address and hands the email off per the disclosure policy;
    /// a send failure never undoes issuance.
    pub async fn request_password_reset(
        &self,
        email: &str,
    ) -> Result<ResetRequestOutcome, StoreError> {
        let Some(user) = self.store.get_user_by_email(email.trim()).await? else {
            tracing::debug!("Password reset requested for unknown email");
            return Ok(ResetRequestOutcome::UnknownEmail);
        };

        let token = self.reset.issue(&user.id).await?;

        let message = Email {
            to: user.email.clone(),
            subject: "Dicee Battle password reset".to_string(),
            body: format!(
                "Hi {},\n\nSomeone requested a password reset for your account. \
                 Use this link within the next hour:\n\n{}?token={}\n\n\
                 If this wasn't you, you can ignore this email.",
                user.username, self.reset_link_base, token
            ),
        };

        let Some(mailer) = self.mailer.clone() else {
            tracing::warn!(
                "No mail relay configured; dropping password reset email for user {}",
                user.id
            );
            return Ok(ResetRequestOutcome::SendFailed);
        };

        match self.disclosure {
            DisclosurePolicy::Generic => {
                // Detached send; the request has already succeeded.
                tokio::spawn(async move {
                    if let Err(e) = mailer.send(message).await {
                        tracing::warn!("Password reset email failed: {}", e);
                    }
                });
                Ok(ResetRequestOutcome::Sent)
            }
            DisclosurePolicy::ReportFailure => match mailer.send(message).await {
                Ok(()) => Ok(ResetRequestOutcome::Sent),
                Err(e) => {
                    tracing::warn!("Password reset email failed: {}", e);
                    Ok(ResetRequestOutcome::SendFailed)
                }
            },
        }
    }

    /// Finish a reset: consume the token, rotate the credential, and log
    /// the user out everywhere.
    pub async fn complete_password_reset(
        &self,
        token: &str,
        new_password: &str,
    ) -> Result<UserId, ResetError> {
        let user_id = self.reset.consume(token, new_password).await?;
        self.end_sessions_for_user(&user_id).await;
        Ok(user_id)
    }
}
