//! Users Domain
//!
//! Accounts, JWT authentication with refresh tokens, the password reset
//! flow, avatar uploads, addresses, and the shopping cart, backed by
//! MongoDB.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  ← HTTP endpoints, auth cookies
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Service   │  ← Business logic, password hashing, cart upsert
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │ Repository  │  ← Data access (trait + MongoDB implementation)
//! └──────┬──────┘
//!        │
//! ┌──────▼──────┐
//! │   Models    │  ← Entities, DTOs
//! └─────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,no_run
//! use domain_users::{handlers, mongodb::MongoUserRepository, service::UserService};
//! use axum_helpers::{JwtAuth, JwtConfig};
//! use media::MockMediaStore;
//! use mongodb::Client;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let client = Client::with_uri_str("mongodb://localhost:27017").await?;
//! let db = client.database("bazaar");
//!
//! let jwt_auth = JwtAuth::new(&JwtConfig::new("a-secret-of-at-least-32-characters!!"));
//! let repository = MongoUserRepository::new(db);
//! let service = UserService::new(
//!     repository,
//!     jwt_auth.clone(),
//!     Arc::new(MockMediaStore::new()),
//!     None,
//! );
//!
//! let router = handlers::router(service, jwt_auth);
//! # Ok(())
//! # }
//! ```

pub mod error;
pub mod handlers;
pub mod models;
pub mod mongodb;
pub mod repository;
pub mod service;

// Re-export commonly used types
pub use error::{UserError, UserResult};
pub use handlers::ApiDoc;
pub use models::{
    AddAddressRequest, Address, AuthResponse, AuthTokens, Avatar, CartLine, LoginRequest,
    RegisterRequest, ResetPasswordRequest, Role, UpdateCart, UpdatePasswordRequest, UpdateProfile,
    User, UserResponse,
};
pub use repository::UserRepository;
pub use service::UserService;
