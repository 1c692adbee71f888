//! Users API routes
//!
//! Wires the users domain to HTTP routes with the shared JWT auth,
//! Cloudinary store, and optional mailer.

use axum::Router;
use domain_users::{UserService, handlers, mongodb::MongoUserRepository};

use crate::state::AppState;

/// Create users router
pub fn router(state: &AppState) -> Router {
    let repository = MongoUserRepository::new(state.db.clone());

    let service = UserService::new(
        repository,
        state.jwt_auth.clone(),
        state.media.clone(),
        state.mailer.clone(),
    );

    handlers::router(service, state.jwt_auth.clone())
}
