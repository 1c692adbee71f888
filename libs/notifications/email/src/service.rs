//! High-level email sending facade
//!
//! Combines a provider with the template engine so callers work in terms of
//! "send a password reset to this user" rather than raw emails.

use crate::error::{NotificationError, NotificationResult};
use crate::models::{Email, EmailPriority};
use crate::provider::{EmailProvider, SendResult};
use crate::templates::TemplateEngine;
use serde_json::json;
use std::sync::Arc;
use tracing::{info, instrument};

/// Mailer configuration
#[derive(Debug, Clone)]
pub struct MailerConfig {
    /// Base URL of the frontend, used to build links in emails
    pub frontend_url: String,
    /// Application name shown in email copy
    pub app_name: String,
    /// How long password reset links stay valid
    pub password_reset_expiry_minutes: u64,
}

impl Default for MailerConfig {
    fn default() -> Self {
        Self {
            frontend_url: "http://localhost:3000".to_string(),
            app_name: "Bazaar".to_string(),
            password_reset_expiry_minutes: 15,
        }
    }
}

impl MailerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            frontend_url: std::env::var("FRONTEND_URL").unwrap_or(defaults.frontend_url),
            app_name: std::env::var("APP_NAME").unwrap_or(defaults.app_name),
            password_reset_expiry_minutes: std::env::var("PASSWORD_RESET_EXPIRY_MINUTES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.password_reset_expiry_minutes),
        }
    }
}

/// Sends templated transactional emails through a provider
pub struct Mailer {
    provider: Arc<dyn EmailProvider>,
    templates: TemplateEngine,
    config: MailerConfig,
}

impl Mailer {
    pub fn new(provider: Arc<dyn EmailProvider>, config: MailerConfig) -> NotificationResult<Self> {
        Ok(Self {
            provider,
            templates: TemplateEngine::new()?,
            config,
        })
    }

    /// Send a welcome email to a newly registered user
    #[instrument(skip(self))]
    pub async fn send_welcome(&self, to: &str, name: &str) -> NotificationResult<SendResult> {
        let rendered = self.templates.render(
            "welcome",
            &json!({
                "name": name,
                "app_name": self.config.app_name,
            }),
        )?;

        let mut email = Email::new(to, rendered.subject);
        email.body_text = rendered.body_text;
        email.body_html = rendered.body_html;

        let result = self.provider.send(&email).await?;
        info!(to, provider = result.provider, "welcome email sent");
        Ok(result)
    }

    /// Send a password reset email carrying a one-time token link
    #[instrument(skip(self, token))]
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> NotificationResult<SendResult> {
        if token.is_empty() {
            return Err(NotificationError::InvalidInput(
                "reset token must not be empty".to_string(),
            ));
        }

        let reset_link = format!("{}/reset-password/{}", self.config.frontend_url, token);
        let rendered = self.templates.render(
            "password_reset",
            &json!({
                "name": name,
                "app_name": self.config.app_name,
                "reset_link": reset_link,
                "expiry_minutes": self.config.password_reset_expiry_minutes,
            }),
        )?;

        let mut email = Email::new(to, rendered.subject).with_priority(EmailPriority::High);
        email.body_text = rendered.body_text;
        email.body_html = rendered.body_html;

        let result = self.provider.send(&email).await?;
        info!(to, provider = result.provider, "password reset email sent");
        Ok(result)
    }

    /// Notify a user that their password was changed
    #[instrument(skip(self))]
    pub async fn send_password_changed(
        &self,
        to: &str,
        name: &str,
    ) -> NotificationResult<SendResult> {
        let rendered = self.templates.render(
            "password_changed",
            &json!({
                "name": name,
                "app_name": self.config.app_name,
            }),
        )?;

        let mut email = Email::new(to, rendered.subject);
        email.body_text = rendered.body_text;
        email.body_html = rendered.body_html;

        let result = self.provider.send(&email).await?;
        info!(to, provider = result.provider, "password changed email sent");
        Ok(result)
    }

    /// Check the underlying provider's health
    pub async fn health_check(&self) -> NotificationResult<()> {
        self.provider.health_check().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::MockEmailProvider;

    fn mailer_with_mock() -> (Mailer, MockEmailProvider) {
        let provider = MockEmailProvider::new();
        let mailer = Mailer::new(
            Arc::new(provider.clone()),
            MailerConfig {
                frontend_url: "https://shop.example.com".to_string(),
                app_name: "Bazaar".to_string(),
                password_reset_expiry_minutes: 15,
            },
        )
        .unwrap();
        (mailer, provider)
    }

    #[tokio::test]
    async fn welcome_email_reaches_recipient() {
        let (mailer, provider) = mailer_with_mock();

        mailer.send_welcome("alice@example.com", "Alice").await.unwrap();

        assert!(provider.was_sent_to("alice@example.com"));
        let sent = provider.sent_emails();
        assert_eq!(sent[0].subject, "Welcome to Bazaar, Alice!");
    }

    #[tokio::test]
    async fn password_reset_email_contains_token_link() {
        let (mailer, provider) = mailer_with_mock();

        mailer
            .send_password_reset("bob@example.com", "Bob", "abc123")
            .await
            .unwrap();

        let sent = provider.sent_emails();
        let text = sent[0].body_text.as_ref().unwrap();
        assert!(text.contains("https://shop.example.com/reset-password/abc123"));
        assert_eq!(sent[0].priority, EmailPriority::High);
    }

    #[tokio::test]
    async fn password_reset_rejects_empty_token() {
        let (mailer, provider) = mailer_with_mock();

        let err = mailer
            .send_password_reset("bob@example.com", "Bob", "")
            .await
            .unwrap_err();

        assert!(matches!(err, NotificationError::InvalidInput(_)));
        assert_eq!(provider.sent_count(), 0);
    }

    #[tokio::test]
    async fn provider_failure_propagates() {
        let mailer = Mailer::new(
            Arc::new(MockEmailProvider::failing()),
            MailerConfig::default(),
        )
        .unwrap();

        let err = mailer
            .send_password_changed("carol@example.com", "Carol")
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::ProviderError(_)));
    }
}
