use crate::error::{NotificationError, NotificationResult};
use crate::models::Email;
use crate::provider::{EmailProvider, SendResult};
use async_trait::async_trait;
use std::sync::{Arc, Mutex};
use tracing::debug;

/// In-memory provider for tests. Records every email it is asked to send.
#[derive(Clone, Default)]
pub struct MockEmailProvider {
    sent: Arc<Mutex<Vec<Email>>>,
    fail: bool,
}

impl MockEmailProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose sends always fail
    pub fn failing() -> Self {
        Self {
            sent: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    /// All emails sent so far
    pub fn sent_emails(&self) -> Vec<Email> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of emails sent
    pub fn sent_count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }

    /// Clear recorded emails
    pub fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    /// Whether any email was sent to the given address
    pub fn was_sent_to(&self, address: &str) -> bool {
        self.sent.lock().unwrap().iter().any(|e| e.to == address)
    }
}

#[async_trait]
impl EmailProvider for MockEmailProvider {
    async fn send(&self, email: &Email) -> NotificationResult<SendResult> {
        if self.fail {
            return Err(NotificationError::ProviderError(
                "mock provider configured to fail".to_string(),
            ));
        }

        debug!(email_id = %email.id, to = %email.to, "recording mock send");
        self.sent.lock().unwrap().push(email.clone());

        Ok(SendResult {
            message_id: email.id.clone(),
            provider: self.name().to_string(),
        })
    }

    async fn health_check(&self) -> NotificationResult<()> {
        if self.fail {
            Err(NotificationError::ProviderError(
                "mock provider configured to fail".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn records_sent_emails() {
        let provider = MockEmailProvider::new();
        let email = Email::new("user@example.com", "welcome").with_text("hi");

        let result = provider.send(&email).await.unwrap();
        assert_eq!(result.provider, "mock");
        assert_eq!(provider.sent_count(), 1);
        assert!(provider.was_sent_to("user@example.com"));
        assert!(!provider.was_sent_to("other@example.com"));
    }

    #[tokio::test]
    async fn clear_resets_recorded_emails() {
        let provider = MockEmailProvider::new();
        provider
            .send(&Email::new("a@example.com", "x").with_text("y"))
            .await
            .unwrap();
        provider.clear();
        assert_eq!(provider.sent_count(), 0);
    }

    #[tokio::test]
    async fn failing_provider_rejects_sends() {
        let provider = MockEmailProvider::failing();
        let err = provider
            .send(&Email::new("a@example.com", "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, NotificationError::ProviderError(_)));
        assert!(provider.health_check().await.is_err());
    }
}
