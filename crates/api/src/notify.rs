//! Login notification emails via SMTP.
//!
//! [`Notifier`] wraps the `lettre` async SMTP transport to send a
//! plain-text alert when a new session is opened on an account.
//! Configuration is loaded from environment variables; if `SMTP_HOST`
//! is not set, delivery is disabled and login proceeds silently.
//! Sending is fire-and-forget: a mail failure is logged, never surfaced
//! to the login response.

use portal_db::models::session::Session;

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

/// Error type for email delivery failures.
#[derive(Debug, thiserror::Error)]
pub enum EmailError {
    /// SMTP transport-level failure (authentication, connection, etc.).
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    /// The recipient or sender address could not be parsed.
    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    /// The MIME message could not be assembled.
    #[error("Email build error: {0}")]
    Build(String),
}

// ---------------------------------------------------------------------------
// EmailConfig
// ---------------------------------------------------------------------------

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender address when `SMTP_FROM` is not set.
const DEFAULT_FROM_ADDRESS: &str = "noreply@portal.local";

/// Configuration for the SMTP email delivery service.
#[derive(Debug, Clone)]
pub struct EmailConfig {
    /// SMTP server hostname.
    pub smtp_host: String,
    /// SMTP server port (defaults to 587).
    pub smtp_port: u16,
    /// RFC 5322 "From" address.
    pub from_address: String,
    /// Optional SMTP username.
    pub smtp_user: Option<String>,
    /// Optional SMTP password.
    pub smtp_password: Option<String>,
}

impl EmailConfig {
    /// Load configuration from environment variables.
    ///
    /// Returns `None` if `SMTP_HOST` is not set, signalling that email
    /// delivery is not configured and should be skipped.
    ///
    /// | Variable        | Required | Default                 |
    /// |-----------------|----------|-------------------------|
    /// | `SMTP_HOST`     | yes      | --                      |
    /// | `SMTP_PORT`     | no       | `587`                   |
    /// | `SMTP_FROM`     | no       | `noreply@portal.local`  |
    /// | `SMTP_USER`     | no       | --                      |
    /// | `SMTP_PASSWORD` | no       | --                      |
    pub fn from_env() -> Option<Self> {
        let smtp_host = std::env::var("SMTP_HOST").ok()?;
        Some(Self {
            smtp_host,
            smtp_port: std::env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            from_address: std::env::var("SMTP_FROM")
                .unwrap_or_else(|_| DEFAULT_FROM_ADDRESS.to_string()),
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
        })
    }
}

// ---------------------------------------------------------------------------
// Notifier
// ---------------------------------------------------------------------------

/// Sends login alert emails via SMTP, when configured.
pub struct Notifier {
    config: Option<EmailConfig>,
}

impl Notifier {
    /// Create a notifier with explicit configuration.
    pub fn new(config: Option<EmailConfig>) -> Self {
        Self { config }
    }

    /// Create a notifier from the environment; disabled without `SMTP_HOST`.
    pub fn from_env() -> Self {
        Self::new(EmailConfig::from_env())
    }

    /// A notifier that never sends anything, for tests.
    pub fn disabled() -> Self {
        Self::new(None)
    }

    /// Send a "new sign-in" alert for a freshly created session.
    ///
    /// Spawned into the background; the caller's response does not wait
    /// on SMTP. A failure is logged at warn level.
    pub fn login_alert(&self, to_email: String, username: String, session: &Session) {
        let Some(config) = self.config.clone() else {
            return;
        };

        let when = session.created_at;
        let device = session.device.clone().unwrap_or_else(|| "unknown device".into());
        let ip = session.ip_address.clone().unwrap_or_else(|| "unknown address".into());

        tokio::spawn(async move {
            if let Err(err) = deliver(&config, &to_email, &username, when, &device, &ip).await {
                tracing::warn!(to = %to_email, error = %err, "Failed to send login alert email");
            }
        });
    }
}

/// Send one login alert message over SMTP.
async fn deliver(
    config: &EmailConfig,
    to_email: &str,
    username: &str,
    when: portal_core::types::Timestamp,
    device: &str,
    ip: &str,
) -> Result<(), EmailError> {
    use lettre::{
        message::header::ContentType, transport::smtp::authentication::Credentials,
        AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    };

    let subject = "New sign-in to your account".to_string();
    let body = format!(
        "Hello {username},\n\n\
         A new sign-in to your account was detected.\n\n\
         Time: {when}\n\
         Device: {device}\n\
         IP address: {ip}\n\n\
         If this was you, no action is needed. Otherwise, terminate the\n\
         session from your account's session list and change your password."
    );

    let email = Message::builder()
        .from(config.from_address.parse()?)
        .to(to_email.parse()?)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body)
        .map_err(|e| EmailError::Build(e.to_string()))?;

    let mut transport_builder =
        AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port);

    if let (Some(user), Some(pass)) = (&config.smtp_user, &config.smtp_password) {
        transport_builder =
            transport_builder.credentials(Credentials::new(user.clone(), pass.clone()));
    }

    let mailer = transport_builder.build();
    mailer.send(email).await?;

    tracing::info!(to = to_email, "Login alert email sent");
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_error_display_build() {
        let err = EmailError::Build("missing body".to_string());
        assert_eq!(err.to_string(), "Email build error: missing body");
    }

    #[test]
    fn email_error_display_address() {
        let addr_err: Result<lettre::Address, _> = "not-an-email".parse();
        let err = EmailError::Address(addr_err.unwrap_err());
        assert!(err.to_string().contains("Email address parse error"));
    }
}
