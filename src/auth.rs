//! Credential hashing and signup/reset input validation.
//!
//! Hashing goes through bcrypt and is otherwise opaque to the rest of the
//! crate. Validation strictness is a single toggle instead of parallel code
//! paths: `Lenient` matches the original required-fields checks, `Strict`
//! additionally validates the email shape and raises the password floor.

use crate::types::UserId;
use serde::Serialize;

/// Errors that can occur during credential operations
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hash(#[from] bcrypt::BcryptError),
}

/// Hash a plaintext password for storage.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    Ok(bcrypt::hash(password, bcrypt::DEFAULT_COST)?)
}

/// Compare a plaintext password against a stored hash.
/// A malformed stored hash counts as a mismatch rather than an error.
pub fn verify_password(password: &str, password_hash: &str) -> bool {
    bcrypt::verify(password, password_hash).unwrap_or(false)
}

/// Identity attached to an authenticated session.
#[derive(Debug, Clone, Serialize)]
pub struct UserInfo {
    pub id: UserId,
    pub username: String,
}

/// Input validation strictness
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidationPolicy {
    Lenient,
    Strict,
}

impl ValidationPolicy {
    /// Load policy from the STRICT_VALIDATION environment variable
    pub fn from_env() -> Self {
        match std::env::var("STRICT_VALIDATION") {
            Ok(v) if v != "0" && v.to_lowercase() != "false" => Self::Strict,
            _ => Self::Lenient,
        }
    }

    pub fn min_password_len(&self) -> usize {
        match self {
            Self::Lenient => 6,
            Self::Strict => 8,
        }
    }

    /// Validate signup input. The error string is a user-facing message.
    pub fn validate_signup(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<(), String> {
        if username.trim().is_empty() || email.trim().is_empty() || password.is_empty() {
            return Err("All fields are required".to_string());
        }
        if *self == Self::Strict && !plausible_email(email) {
            return Err("Invalid email address".to_string());
        }
        self.validate_password(password)
    }

    /// Validate a new password (signup or reset).
    pub fn validate_password(&self, password: &str) -> Result<(), String> {
        if password.len() < self.min_password_len() {
            return Err(format!(
                "Password must be at least {} characters",
                self.min_password_len()
            ));
        }
        Ok(())
    }
}

/// Cheap structural check: one '@' with a non-empty local part and a domain
/// containing a dot. Deliverability is the mail relay's problem.
fn plausible_email(email: &str) -> bool {
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && domain.contains('.')
        && !domain.contains('@')
}
