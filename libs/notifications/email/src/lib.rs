//! Email notification library
//!
//! Transactional email delivery with pluggable providers and
//! Handlebars templates.
//!
//! ## Components
//!
//! - **Email Models**: `Email`, `EmailPriority` for email data
//! - **Providers**: SMTP via lettre, and Mock (for tests)
//! - **Templates**: Handlebars-based `TemplateEngine`
//! - **Service**: `Mailer` facade that renders a template and sends it
//!
//! ## Usage
//!
//! ```ignore
//! use email::{Mailer, MailerConfig, SmtpProvider};
//!
//! let provider = SmtpProvider::from_env()?;
//! let mailer = Mailer::new(provider, MailerConfig::default())?;
//! mailer.send_password_reset("user@example.com", "Alice", "token123").await?;
//! ```

pub mod error;
pub mod models;
pub mod provider;
pub mod service;
pub mod templates;

// Re-export main types
pub use error::{NotificationError, NotificationResult};
pub use models::{Email, EmailPriority};
pub use provider::{EmailProvider, MockEmailProvider, SendResult, SmtpConfig, SmtpProvider};
pub use service::{Mailer, MailerConfig};
pub use templates::{EmailTemplate, RenderedTemplate, TemplateEngine};
