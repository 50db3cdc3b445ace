//! Outbound email seam.
//!
//! Delivery is best-effort: reset-token issuance never depends on a send
//! succeeding. The production sender posts to an HTTP mail relay; when no
//! relay is configured the server boots without one and logs a warning.

use async_trait::async_trait;
use serde::Serialize;

/// Errors that can occur while sending mail
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    #[error("mail relay request failed: {0}")]
    Transport(String),

    #[error("mail relay returned status {0}")]
    Status(u16),
}

/// A message handed to the relay. Plain text only.
#[derive(Debug, Clone, Serialize)]
pub struct Email {
    pub to: String,
    pub subject: String,
    pub body: String,
}

#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send(&self, email: Email) -> Result<(), EmailError>;

    /// Get the name of this sender (for logging)
    fn name(&self) -> &str;
}

/// Sender that POSTs JSON to an HTTP mail relay (Mailgun/Resend style API).
pub struct HttpMailer {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

#[derive(Serialize)]
struct RelayPayload<'a> {
    from: &'a str,
    to: &'a str,
    subject: &'a str,
    text: &'a str,
}

impl HttpMailer {
    pub fn new(api_url: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl EmailSender for HttpMailer {
    async fn send(&self, email: Email) -> Result<(), EmailError> {
        let payload = RelayPayload {
            from: &self.from,
            to: &email.to,
            subject: &email.subject,
            text: &email.body,
        };

        let mut request = self.client.post(&self.api_url).json(&payload);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(EmailError::Status(response.status().as_u16()));
        }

        tracing::debug!("Mail relay accepted message for {}", email.to);
        Ok(())
    }

    fn name(&self) -> &str {
        "http-relay"
    }
}

/// How the forgot-password endpoint reports email delivery to the end user.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisclosurePolicy {
    /// Always answer with the generic "if registered, a link has been sent"
    /// message, detaching the send entirely. Never reveals whether the
    /// address is registered.
    Generic,
    /// Await the send and report a delivery failure to the caller. Still
    /// answers generically for unknown addresses.
    ReportFailure,
}

/// Configuration for outbound email
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// Mail relay endpoint (None = sending disabled)
    pub api_url: Option<String>,
    /// Bearer token for the relay, if it requires one
    pub api_key: Option<String>,
    /// From address for all outbound mail
    pub from: String,
    /// Base URL the reset token is appended to when building the link
    pub reset_link_base: String,
    pub disclosure: DisclosurePolicy,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            from: "dicebattle@localhost".to_string(),
            reset_link_base: "http://localhost:3000/reset-password.html".to_string(),
            disclosure: DisclosurePolicy::Generic,
        }
    }
}

impl EmailConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let nonempty = |value: String| {
            let trimmed = value.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        };

        let api_url = std::env::var("MAIL_API_URL").ok().and_then(nonempty);
        let api_key = std::env::var("MAIL_API_KEY").ok().and_then(nonempty);
        let from = std::env::var("MAIL_FROM")
            .ok()
            .and_then(nonempty)
            .unwrap_or_else(|| "dicebattle@localhost".to_string());
        let reset_link_base = std::env::var("RESET_LINK_BASE")
            .ok()
            .and_then(nonempty)
            .unwrap_or_else(|| "http://localhost:3000/reset-password.html".to_string());

        let disclosure = match std::env::var("MAIL_REPORT_FAILURES") {
            Ok(v) if v != "0" && v.to_lowercase() != "false" => DisclosurePolicy::ReportFailure,
            _ => DisclosurePolicy::Generic,
        };

        Self {
            api_url,
            api_key,
            from,
            reset_link_base,
            disclosure,
        }
    }

    /// Build the configured sender. `None` when no relay is set up; the
    /// server still runs, reset emails just go nowhere.
    pub fn build_sender(&self) -> Option<HttpMailer> {
        let api_url = self.api_url.clone()?;
        Some(HttpMailer::new(
            api_url,
            self.api_key.clone(),
            self.from.clone(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear_mail_env() {
        for key in [
            "MAIL_API_URL",
            "MAIL_API_KEY",
            "MAIL_FROM",
            "RESET_LINK_BASE",
            "MAIL_REPORT_FAILURES",
        ] {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial]
    fn test_default_config_has_no_sender() {
        clear_mail_env();
        let config = EmailConfig::from_env();
        assert!(config.api_url.is_none());
        assert!(config.build_sender().is_none());
        assert_eq!(config.disclosure, DisclosurePolicy::Generic);
    }

    #[test]
    #[serial]
    fn test_config_from_env() {
        clear_mail_env();
        std::env::set_var("MAIL_API_URL", "https://relay.example/send");
        std::env::set_var("MAIL_FROM", "noreply@dicebattle.example");
        std::env::set_var("MAIL_REPORT_FAILURES", "1");

        let config = EmailConfig::from_env();
        assert_eq!(
            config.api_url.as_deref(),
            Some("https://relay.example/send")
        );
        assert_eq!(config.from, "noreply@dicebattle.example");
        assert_eq!(config.disclosure, DisclosurePolicy::ReportFailure);
        assert!(config.build_sender().is_some());

        clear_mail_env();
    }

    #[test]
    #[serial]
    fn test_blank_env_values_are_ignored() {
        clear_mail_env();
        std::env::set_var("MAIL_API_URL", "   ");

        let config = EmailConfig::from_env();
        assert!(config.api_url.is_none());

        clear_mail_env();
    }
}
