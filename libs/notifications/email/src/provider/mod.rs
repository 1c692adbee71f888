pub mod mock;
pub mod smtp;

use crate::error::NotificationResult;
use crate::models::Email;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use mock::MockEmailProvider;
pub use smtp::{SmtpConfig, SmtpProvider};

/// Result of a send operation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendResult {
    /// Provider-specific message ID
    pub message_id: String,
    /// Provider that handled the send
    pub provider: String,
}

/// Trait for email delivery providers
#[async_trait]
pub trait EmailProvider: Send + Sync {
    /// Send an email
    async fn send(&self, email: &Email) -> NotificationResult<SendResult>;

    /// Check if the provider is healthy
    async fn health_check(&self) -> NotificationResult<()>;

    /// Provider name for logging
    fn name(&self) -> &'static str;
}
