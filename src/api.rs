//! HTTP API endpoints.
//!
//! Thin axum handlers over [`AppState`]; responses follow the
//! `{success, message, ...}` JSON shape throughout. Business-rule
//! rejections (bad credentials, taken username, stale token) come back as
//! `success: false` with a user-facing message; only missing auth and
//! infrastructure failures use non-200 statuses.

use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::auth::UserInfo;
use crate::email::DisclosurePolicy;
use crate::reset::ResetError;
use crate::state::{AppState, ResetRequestOutcome, RollReport, Session, SessionError};
use crate::types::{GameStats, MatchState};

/// Answer for forgot-password that never reveals whether the address exists
const GENERIC_RESET_MESSAGE: &str = "If that email is registered, a reset link has been sent";

#[derive(Debug, Serialize)]
struct ApiMessage {
    success: bool,
    message: String,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SessionResponse {
    success: bool,
    message: String,
    session_token: String,
    user: UserInfo,
}

#[derive(Debug, Serialize)]
struct UserResponse {
    success: bool,
    user: UserInfo,
}

#[derive(Debug, Serialize)]
struct StatsResponse {
    success: bool,
    stats: GameStats,
}

#[derive(Debug, Serialize)]
struct RollResponse {
    success: bool,
    #[serde(flatten)]
    report: RollReport,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct MatchResetResponse {
    success: bool,
    match_state: MatchState,
}

fn ok_message(message: &str) -> Response {
    Json(ApiMessage {
        success: true,
        message: message.to_string(),
    })
    .into_response()
}

fn fail_message(message: impl Into<String>) -> Response {
    Json(ApiMessage {
        success: false,
        message: message.into(),
    })
    .into_response()
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(ApiMessage {
            success: false,
            message: "Not logged in".to_string(),
        }),
    )
        .into_response()
}

fn store_unavailable(e: impl std::fmt::Display) -> Response {
    tracing::error!("Store operation failed: {}", e);
    (
        StatusCode::SERVICE_UNAVAILABLE,
        Json(ApiMessage {
            success: false,
            message: "Storage is temporarily unavailable, please retry".to_string(),
        }),
    )
        .into_response()
}

/// Extract the bearer token from the Authorization header
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

async fn require_session(state: &AppState, headers: &HeaderMap) -> Result<Session, Response> {
    let Some(token) = bearer_token(headers) else {
        return Err(unauthorized());
    };
    state.session(token).await.ok_or_else(unauthorized)
}

fn session_response(message: &str, session: Session) -> Response {
    Json(SessionResponse {
        success: true,
        message: message.to_string(),
        session_token: session.token,
        user: session.user,
    })
    .into_response()
}

/// POST /api/signup
pub async fn signup(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SignupRequest>,
) -> Response {
    match state.signup(&req.username, &req.email, &req.password).await {
        Ok(session) => session_response("Account created successfully", session),
        Err(message) => fail_message(message),
    }
}

/// POST /api/login
pub async fn login(State(state): State<Arc<AppState>>, Json(req): Json<LoginRequest>) -> Response {
    match state.login(&req.username, &req.password).await {
        Ok(session) => session_response("Login successful", session),
        Err(message) => fail_message(message),
    }
}

/// POST /api/logout
pub async fn logout(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match bearer_token(&headers) {
        Some(token) if state.end_session(token).await => ok_message("Logged out successfully"),
        _ => unauthorized(),
    }
}

/// GET /api/user
pub async fn current_user(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    match require_session(&state, &headers).await {
        Ok(session) => Json(UserResponse {
            success: true,
            user: session.user,
        })
        .into_response(),
        Err(response) => response,
    }
}

/// GET /api/stats
pub async fn stats(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let session = match require_session(&state, &headers).await {
        Ok(session) => session,
        Err(response) => return response,
    };

    match state.stats_for(&session.user.id).await {
        Ok(stats) => Json(StatsResponse {
            success: true,
            stats,
        })
        .into_response(),
        Err(e) => store_unavailable(e),
    }
}

/// POST /api/roll — play one round for the session's match
pub async fn roll(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };

    match state.roll_for_session(token).await {
        Ok(report) => Json(RollResponse {
            success: true,
            report,
        })
        .into_response(),
        Err(SessionError::Unauthorized) => unauthorized(),
        Err(SessionError::Store(e)) => store_unavailable(e),
    }
}

/// POST /api/match/reset — zero the session's match scores
pub async fn reset_match(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Response {
    let Some(token) = bearer_token(&headers) else {
        return unauthorized();
    };

    match state.reset_match(token).await {
        Ok(match_state) => Json(MatchResetResponse {
            success: true,
            match_state,
        })
        .into_response(),
        Err(SessionError::Unauthorized) => unauthorized(),
        Err(SessionError::Store(e)) => store_unavailable(e),
    }
}

/// POST /api/forgot-password
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ForgotPasswordRequest>,
) -> Response {
    if req.email.trim().is_empty() {
        return fail_message("Email is required");
    }

    match state.request_password_reset(&req.email).await {
        Ok(outcome) => match (state.disclosure, outcome) {
            (DisclosurePolicy::ReportFailure, ResetRequestOutcome::SendFailed) => {
                fail_message("Failed to send reset email, please try again later")
            }
            // Unknown addresses and detached sends all get the same answer.
            _ => ok_message(GENERIC_RESET_MESSAGE),
        },
        Err(e) => store_unavailable(e),
    }
}

/// POST /api/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ResetPasswordRequest>,
) -> Response {
    if let Err(message) = state.validation.validate_password(&req.password) {
        return fail_message(message);
    }

    match state.complete_password_reset(&req.token, &req.password).await {
        Ok(_) => ok_message("Password has been reset, please log in"),
        Err(ResetError::NotFound) => fail_message("Invalid reset token"),
        Err(ResetError::Expired) => fail_message("Reset token has expired, request a new one"),
        Err(ResetError::Store(e)) => store_unavailable(e),
        Err(ResetError::Auth(e)) => {
            tracing::error!("Credential rotation failed: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(ApiMessage {
                    success: false,
                    message: "Error resetting password".to_string(),
                }),
            )
                .into_response()
        }
    }
}

/// Build the API router over shared state.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/signup", post(signup))
        .route("/api/login", post(login))
        .route("/api/logout", post(logout))
        .route("/api/user", get(current_user))
        .route("/api/stats", get(stats))
        .route("/api/roll", post(roll))
        .route("/api/match/reset", post(reset_match))
        .route("/api/forgot-password", post(forgot_password))
        .route("/api/reset-password", post(reset_password))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token_parsing() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Bearer abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), Some("abc123"));

        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic abc123".parse().unwrap());
        assert_eq!(bearer_token(&headers), None);

        assert_eq!(bearer_token(&HeaderMap::new()), None);
    }
}
