//! Shared application state passed to all request handlers.

use std::sync::Arc;

use axum_helpers::JwtAuth;
use email::Mailer;
use media::CloudinaryStore;
use mongodb::{Client, Database};

/// Shared application state.
///
/// Cloned per handler (inexpensive Arc clones).
#[derive(Clone)]
pub struct AppState {
    /// Application configuration loaded from environment variables
    pub config: crate::config::Config,
    /// MongoDB client (cloneable, shares underlying connection pool)
    pub mongo_client: Client,
    /// MongoDB database instance
    pub db: Database,
    /// Stateless JWT signer/verifier
    pub jwt_auth: JwtAuth,
    /// Cloudinary-backed asset store for avatar uploads
    pub media: Arc<CloudinaryStore>,
    /// Transactional mailer; None when SMTP is not configured
    pub mailer: Option<Arc<Mailer>>,
}
