use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::UserResult;
use crate::models::{Address, Avatar, CartLine, User};

/// Repository trait for user persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn create(&self, user: User) -> UserResult<User>;
    async fn get_by_id(&self, id: Uuid) -> UserResult<Option<User>>;
    async fn get_by_email(&self, email: &str) -> UserResult<Option<User>>;
    async fn list(&self) -> UserResult<Vec<User>>;

    /// Replace the stored document with the given user
    async fn update(&self, user: User) -> UserResult<User>;

    async fn email_exists(&self, email: &str) -> UserResult<bool>;

    /// Store (or clear) the user's current refresh token
    async fn set_refresh_token(&self, id: Uuid, token: Option<String>) -> UserResult<()>;

    /// Find the user with this id whose stored refresh token matches
    async fn find_by_refresh_token(&self, id: Uuid, token: &str) -> UserResult<Option<User>>;

    /// Store a password reset token hash and its expiry
    async fn set_password_reset(
        &self,
        id: Uuid,
        token_hash: String,
        expires: DateTime<Utc>,
    ) -> UserResult<()>;

    /// Find the user holding an unexpired reset token hash
    async fn find_by_reset_token(
        &self,
        token_hash: &str,
        now: DateTime<Utc>,
    ) -> UserResult<Option<User>>;

    /// Cart lines for a user, None if the user does not exist
    async fn get_cart(&self, id: Uuid) -> UserResult<Option<Vec<CartLine>>>;

    /// Overwrite the quantity of the cart line matching (product, color)
    async fn set_cart_line_quantity(
        &self,
        id: Uuid,
        product: Uuid,
        color: &str,
        quantity: i32,
    ) -> UserResult<()>;

    /// Append a new cart line
    async fn push_cart_line(&self, id: Uuid, line: CartLine) -> UserResult<()>;

    async fn push_address(&self, id: Uuid, address: Address) -> UserResult<()>;

    async fn set_avatar(&self, id: Uuid, avatar: Avatar) -> UserResult<()>;
}
