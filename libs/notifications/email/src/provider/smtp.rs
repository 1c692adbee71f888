use crate::error::{NotificationError, NotificationResult};
use crate::models::Email;
use crate::provider::{EmailProvider, SendResult};
use async_trait::async_trait;
use lettre::message::{header::ContentType, Mailbox, MultiPart, SinglePart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::{debug, info};

/// SMTP server configuration
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    pub from_address: String,
    pub from_name: String,
    /// Use STARTTLS (false for local dev servers like MailHog)
    pub use_tls: bool,
}

impl SmtpConfig {
    /// Configuration for a local MailHog instance
    pub fn mailhog() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 1025,
            username: None,
            password: None,
            from_address: "noreply@localhost".to_string(),
            from_name: "Bazaar Dev".to_string(),
            use_tls: false,
        }
    }

    /// Load configuration from environment variables
    pub fn from_env() -> NotificationResult<Self> {
        let host = std::env::var("SMTP_HOST")
            .map_err(|_| NotificationError::ConfigError("SMTP_HOST not set".to_string()))?;
        let port = std::env::var("SMTP_PORT")
            .unwrap_or_else(|_| "587".to_string())
            .parse::<u16>()
            .map_err(|_| NotificationError::ConfigError("invalid SMTP_PORT".to_string()))?;
        let from_address = std::env::var("SMTP_FROM_ADDRESS")
            .map_err(|_| NotificationError::ConfigError("SMTP_FROM_ADDRESS not set".to_string()))?;

        Ok(Self {
            host,
            port,
            username: std::env::var("SMTP_USERNAME").ok(),
            password: std::env::var("SMTP_PASSWORD").ok(),
            from_address,
            from_name: std::env::var("SMTP_FROM_NAME").unwrap_or_else(|_| "Bazaar".to_string()),
            use_tls: std::env::var("SMTP_USE_TLS")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(true),
        })
    }
}

/// SMTP email provider using lettre
pub struct SmtpProvider {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    config: SmtpConfig,
}

impl SmtpProvider {
    /// Create a new SMTP provider from configuration
    pub fn new(config: SmtpConfig) -> NotificationResult<Self> {
        let mut builder = if config.use_tls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| NotificationError::ConfigError(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };

        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            config,
        })
    }

    /// Create a provider pointed at a local MailHog instance
    pub fn mailhog() -> NotificationResult<Self> {
        Self::new(SmtpConfig::mailhog())
    }

    /// Create a provider from environment variables
    pub fn from_env() -> NotificationResult<Self> {
        Self::new(SmtpConfig::from_env()?)
    }

    fn build_message(&self, email: &Email) -> NotificationResult<Message> {
        let from: Mailbox = email
            .from
            .as_deref()
            .map(|f| f.parse())
            .unwrap_or_else(|| {
                format!("{} <{}>", self.config.from_name, self.config.from_address).parse()
            })
            .map_err(|e| NotificationError::InvalidInput(format!("invalid from address: {e}")))?;

        let to: Mailbox = email
            .to
            .parse()
            .map_err(|e| NotificationError::InvalidInput(format!("invalid to address: {e}")))?;

        let mut builder = Message::builder()
            .from(from)
            .to(to)
            .subject(&email.subject);

        for cc in &email.cc {
            let mailbox: Mailbox = cc
                .parse()
                .map_err(|e| NotificationError::InvalidInput(format!("invalid cc address: {e}")))?;
            builder = builder.cc(mailbox);
        }

        for bcc in &email.bcc {
            let mailbox: Mailbox = bcc.parse().map_err(|e| {
                NotificationError::InvalidInput(format!("invalid bcc address: {e}"))
            })?;
            builder = builder.bcc(mailbox);
        }

        if let Some(reply_to) = &email.reply_to {
            let mailbox: Mailbox = reply_to.parse().map_err(|e| {
                NotificationError::InvalidInput(format!("invalid reply-to address: {e}"))
            })?;
            builder = builder.reply_to(mailbox);
        }

        let message = match (&email.body_text, &email.body_html) {
            (Some(text), Some(html)) => builder
                .multipart(
                    MultiPart::alternative()
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_PLAIN)
                                .body(text.clone()),
                        )
                        .singlepart(
                            SinglePart::builder()
                                .header(ContentType::TEXT_HTML)
                                .body(html.clone()),
                        ),
                )
                .map_err(|e| NotificationError::InvalidInput(e.to_string()))?,
            (None, Some(html)) => builder
                .header(ContentType::TEXT_HTML)
                .body(html.clone())
                .map_err(|e| NotificationError::InvalidInput(e.to_string()))?,
            (Some(text), None) => builder
                .header(ContentType::TEXT_PLAIN)
                .body(text.clone())
                .map_err(|e| NotificationError::InvalidInput(e.to_string()))?,
            (None, None) => {
                return Err(NotificationError::InvalidInput(
                    "email has no body".to_string(),
                ))
            }
        };

        Ok(message)
    }
}

#[async_trait]
impl EmailProvider for SmtpProvider {
    async fn send(&self, email: &Email) -> NotificationResult<SendResult> {
        debug!(email_id = %email.id, to = %email.to, "sending email via SMTP");

        let message = self.build_message(email)?;

        let response = self
            .transport
            .send(message)
            .await
            .map_err(|e| NotificationError::ProviderError(e.to_string()))?;

        info!(
            email_id = %email.id,
            to = %email.to,
            code = %response.code(),
            "email sent"
        );

        Ok(SendResult {
            message_id: email.id.clone(),
            provider: self.name().to_string(),
        })
    }

    async fn health_check(&self) -> NotificationResult<()> {
        let connected = self
            .transport
            .test_connection()
            .await
            .map_err(|e| NotificationError::ProviderError(e.to_string()))?;

        if connected {
            Ok(())
        } else {
            Err(NotificationError::ProviderError(
                "SMTP connection test failed".to_string(),
            ))
        }
    }

    fn name(&self) -> &'static str {
        "smtp"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mailhog_config_uses_local_defaults() {
        let config = SmtpConfig::mailhog();
        assert_eq!(config.host, "localhost");
        assert_eq!(config.port, 1025);
        assert!(!config.use_tls);
        assert!(config.username.is_none());
    }

    #[test]
    fn build_message_requires_a_body() {
        let provider = SmtpProvider::mailhog().unwrap();
        let email = Email::new("user@example.com", "hello");
        let err = provider.build_message(&email).unwrap_err();
        assert!(matches!(err, NotificationError::InvalidInput(_)));
    }

    #[test]
    fn build_message_with_text_and_html() {
        let provider = SmtpProvider::mailhog().unwrap();
        let email = Email::new("user@example.com", "hello")
            .with_text("plain")
            .with_html("<p>rich</p>");
        assert!(provider.build_message(&email).is_ok());
    }

    #[test]
    fn build_message_rejects_invalid_recipient() {
        let provider = SmtpProvider::mailhog().unwrap();
        let email = Email::new("not-an-address", "hello").with_text("body");
        let err = provider.build_message(&email).unwrap_err();
        assert!(matches!(err, NotificationError::InvalidInput(_)));
    }
}
