//! User service - business logic layer
//!
//! Owns authentication (register/login/refresh/logout), the password reset
//! flow, profile and address management, avatar upload, and the cart upsert.
//! The cart upsert is last-writer-wins keyed on (product, color): a matching
//! line has its quantity overwritten, never incremented.

use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use axum_helpers::JwtAuth;
use chrono::{Duration, Utc};
use email::Mailer;
use media::MediaStore;
use rand::RngExt;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;
use validator::Validate;

use crate::error::{UserError, UserResult};
use crate::models::{
    AddAddressRequest, Address, AuthTokens, Avatar, CartLine, LoginRequest, RegisterRequest,
    UpdateCart, UpdatePasswordRequest, UpdateProfile, User, UserResponse,
};
use crate::repository::UserRepository;

/// How long password reset tokens stay valid
const PASSWORD_RESET_TTL_MINUTES: i64 = 15;

pub struct UserService<R: UserRepository> {
    repository: Arc<R>,
    jwt_auth: JwtAuth,
    media: Arc<dyn MediaStore>,
    /// Optional mailer; when absent, email sends are skipped with a warning
    mailer: Option<Arc<Mailer>>,
}

impl<R: UserRepository> UserService<R> {
    pub fn new(
        repository: R,
        jwt_auth: JwtAuth,
        media: Arc<dyn MediaStore>,
        mailer: Option<Arc<Mailer>>,
    ) -> Self {
        Self {
            repository: Arc::new(repository),
            jwt_auth,
            media,
            mailer,
        }
    }

    // ---- Auth ----

    /// Register a new account and issue tokens
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn register(&self, input: RegisterRequest) -> UserResult<AuthTokens> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        if self.repository.email_exists(&input.email).await? {
            return Err(UserError::DuplicateEmail(input.email));
        }

        let password_hash = self.hash_password(&input.password)?;
        let user = User::new(input.email, input.first_name, input.last_name, password_hash);
        let created = self.repository.create(user).await?;

        // Welcome email failure never fails registration
        if let Some(ref mailer) = self.mailer {
            if let Err(e) = mailer
                .send_welcome(&created.email, &created.full_name())
                .await
            {
                tracing::warn!(email = %created.email, error = %e, "failed to send welcome email");
            }
        }

        self.issue_tokens(created).await
    }

    /// Verify credentials, rotate the refresh token, and issue tokens
    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn login(&self, input: LoginRequest) -> UserResult<AuthTokens> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let user = self
            .repository
            .get_by_email(&input.email)
            .await?
            .ok_or(UserError::InvalidCredentials)?;

        if !self.verify_password(&input.password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        self.issue_tokens(user).await
    }

    /// Mint a fresh access token from a refresh token.
    ///
    /// The token must carry a valid signature and match the one stored on
    /// the user document.
    #[instrument(skip(self, refresh_token))]
    pub async fn refresh(&self, refresh_token: &str) -> UserResult<String> {
        let claims = self
            .jwt_auth
            .verify_token(refresh_token)
            .map_err(|_| UserError::InvalidRefreshToken)?;

        let user_id = claims
            .sub
            .parse::<Uuid>()
            .map_err(|_| UserError::InvalidRefreshToken)?;

        let user = self
            .repository
            .find_by_refresh_token(user_id, refresh_token)
            .await?
            .ok_or(UserError::InvalidRefreshToken)?;

        self.create_access_token(&user)
    }

    /// Clear the stored refresh token
    #[instrument(skip(self, refresh_token))]
    pub async fn logout(&self, refresh_token: &str) -> UserResult<()> {
        // An unverifiable token still results in cleared cookies upstream
        if let Ok(claims) = self.jwt_auth.verify_token(refresh_token) {
            if let Ok(user_id) = claims.sub.parse::<Uuid>() {
                self.repository.set_refresh_token(user_id, None).await?;
            }
        }
        Ok(())
    }

    async fn issue_tokens(&self, user: User) -> UserResult<AuthTokens> {
        let access_token = self.create_access_token(&user)?;
        let refresh_token = self
            .jwt_auth
            .create_refresh_token(
                &user.id.to_string(),
                &user.email,
                &user.full_name(),
                &[user.role.to_string()],
            )
            .map_err(|e| UserError::Internal(format!("Failed to create token: {}", e)))?;

        self.repository
            .set_refresh_token(user.id, Some(refresh_token.clone()))
            .await?;

        Ok(AuthTokens {
            user: user.into(),
            access_token,
            refresh_token,
        })
    }

    fn create_access_token(&self, user: &User) -> UserResult<String> {
        self.jwt_auth
            .create_access_token(
                &user.id.to_string(),
                &user.email,
                &user.full_name(),
                &[user.role.to_string()],
            )
            .map_err(|e| UserError::Internal(format!("Failed to create token: {}", e)))
    }

    // ---- Password reset ----

    /// Start a password reset: store a hashed one-time token and email the
    /// plain token as a link.
    #[instrument(skip(self))]
    pub async fn forgot_password(&self, email: &str) -> UserResult<()> {
        let user = self
            .repository
            .get_by_email(email)
            .await?
            .ok_or_else(|| UserError::Validation(format!("User with email '{}' not found", email)))?;

        let mut token_bytes = [0u8; 32];
        rand::rng().fill(&mut token_bytes);
        let token = const_hex::encode(token_bytes);
        let token_hash = const_hex::encode(Sha256::digest(token.as_bytes()));

        let expires = Utc::now() + Duration::minutes(PASSWORD_RESET_TTL_MINUTES);
        self.repository
            .set_password_reset(user.id, token_hash, expires)
            .await?;

        if let Some(ref mailer) = self.mailer {
            mailer
                .send_password_reset(&user.email, &user.full_name(), &token)
                .await
                .map_err(|e| UserError::Email(e.to_string()))?;
        } else {
            tracing::warn!(email = %user.email, "no mailer configured, skipping reset email");
        }

        Ok(())
    }

    /// Complete a password reset with the emailed token
    #[instrument(skip(self, token, new_password))]
    pub async fn reset_password(&self, token: &str, new_password: &str) -> UserResult<()> {
        if new_password.len() < 8 {
            return Err(UserError::Validation(
                "Password must be at least 8 characters".to_string(),
            ));
        }

        let token_hash = const_hex::encode(Sha256::digest(token.as_bytes()));

        let mut user = self
            .repository
            .find_by_reset_token(&token_hash, Utc::now())
            .await?
            .ok_or(UserError::InvalidResetToken)?;

        user.password_hash = self.hash_password(new_password)?;
        user.password_reset_token = None;
        user.password_reset_expires = None;
        user.password_changed_at = Some(Utc::now());
        user.updated_at = Utc::now();

        self.repository.update(user).await?;
        Ok(())
    }

    /// Change password for an authenticated user
    #[instrument(skip(self, input))]
    pub async fn update_password(
        &self,
        user_id: Uuid,
        input: UpdatePasswordRequest,
    ) -> UserResult<()> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        if input.current_password == input.new_password {
            return Err(UserError::Validation(
                "New password must be different from the current password".to_string(),
            ));
        }

        let mut user = self
            .repository
            .get_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))?;

        if !self.verify_password(&input.current_password, &user.password_hash)? {
            return Err(UserError::InvalidCredentials);
        }

        user.password_hash = self.hash_password(&input.new_password)?;
        user.password_changed_at = Some(Utc::now());
        user.updated_at = Utc::now();

        let updated = self.repository.update(user).await?;

        if let Some(ref mailer) = self.mailer {
            if let Err(e) = mailer
                .send_password_changed(&updated.email, &updated.full_name())
                .await
            {
                tracing::warn!(email = %updated.email, error = %e, "failed to send password changed email");
            }
        }

        Ok(())
    }

    // ---- Profile ----

    #[instrument(skip(self))]
    pub async fn get_user(&self, id: Uuid) -> UserResult<UserResponse> {
        let user = self
            .repository
            .get_by_id(id)
            .await?
            .ok_or(UserError::NotFound(id))?;
        Ok(user.into())
    }

    #[instrument(skip(self))]
    pub async fn list_users(&self) -> UserResult<Vec<UserResponse>> {
        let users = self.repository.list().await?;
        Ok(users.into_iter().map(|u| u.into()).collect())
    }

    #[instrument(skip(self, input))]
    pub async fn update_profile(
        &self,
        user_id: Uuid,
        input: UpdateProfile,
    ) -> UserResult<UserResponse> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        if input.first_name.is_none() && input.last_name.is_none() && input.phone.is_none() {
            return Err(UserError::Validation("No fields to update".to_string()));
        }

        let mut user = self
            .repository
            .get_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))?;

        if let Some(first_name) = input.first_name {
            user.first_name = first_name;
        }
        if let Some(last_name) = input.last_name {
            user.last_name = last_name;
        }
        if let Some(phone) = input.phone {
            user.phone = Some(phone);
        }
        user.updated_at = Utc::now();

        let updated = self.repository.update(user).await?;
        Ok(updated.into())
    }

    #[instrument(skip(self, input))]
    pub async fn add_address(
        &self,
        user_id: Uuid,
        input: AddAddressRequest,
    ) -> UserResult<UserResponse> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        self.repository
            .get_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))?;

        self.repository
            .push_address(
                user_id,
                Address {
                    address: input.address,
                },
            )
            .await?;

        self.get_user(user_id).await
    }

    /// Replace the user's avatar. The previous asset is destroyed first.
    #[instrument(skip(self, bytes), fields(size = bytes.len()))]
    pub async fn upload_avatar(
        &self,
        user_id: Uuid,
        bytes: Vec<u8>,
        filename: &str,
        content_type: &str,
    ) -> UserResult<UserResponse> {
        let user = self
            .repository
            .get_by_id(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))?;

        if let Some(ref old) = user.avatar {
            if let Err(e) = self.media.delete(&old.public_id).await {
                tracing::warn!(public_id = %old.public_id, error = %e, "failed to delete previous avatar");
            }
        }

        let asset = self
            .media
            .upload(bytes, filename, content_type)
            .await
            .map_err(|e| UserError::Media(e.to_string()))?;

        self.repository
            .set_avatar(
                user_id,
                Avatar {
                    url: asset.url,
                    public_id: asset.public_id,
                },
            )
            .await?;

        self.get_user(user_id).await
    }

    // ---- Cart ----

    /// Upsert a cart line keyed on (product, color).
    ///
    /// A matching line has its quantity overwritten with the requested
    /// value; without a match a new line is appended. Returns the updated
    /// cart. The read-then-write sequence is not isolated, so concurrent
    /// updates to the same cart can lose writes (last writer wins).
    #[instrument(skip(self, input), fields(product = %input.product, color = %input.color))]
    pub async fn update_cart(&self, user_id: Uuid, input: UpdateCart) -> UserResult<Vec<CartLine>> {
        input
            .validate()
            .map_err(|e| UserError::Validation(e.to_string()))?;

        let cart = self
            .repository
            .get_cart(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))?;

        let existing = cart
            .iter()
            .any(|line| line.product == input.product && line.color == input.color);

        if existing {
            self.repository
                .set_cart_line_quantity(user_id, input.product, &input.color, input.quantity)
                .await?;
        } else {
            self.repository
                .push_cart_line(
                    user_id,
                    CartLine {
                        product: input.product,
                        quantity: input.quantity,
                        color: input.color,
                    },
                )
                .await?;
        }

        self.repository
            .get_cart(user_id)
            .await?
            .ok_or(UserError::NotFound(user_id))
    }

    // ---- Password helpers ----

    fn hash_password(&self, password: &str) -> UserResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let argon2 = Argon2::default();

        argon2
            .hash_password(password.as_bytes(), &salt)
            .map(|hash| hash.to_string())
            .map_err(|e| UserError::PasswordHash(e.to_string()))
    }

    fn verify_password(&self, password: &str, hash: &str) -> UserResult<bool> {
        let parsed_hash =
            PasswordHash::new(hash).map_err(|e| UserError::PasswordHash(e.to_string()))?;

        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }
}

impl<R: UserRepository> Clone for UserService<R> {
    fn clone(&self) -> Self {
        Self {
            repository: Arc::clone(&self.repository),
            jwt_auth: self.jwt_auth.clone(),
            media: Arc::clone(&self.media),
            mailer: self.mailer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockUserRepository;
    use axum_helpers::JwtConfig;
    use email::{MailerConfig, MockEmailProvider};
    use media::MockMediaStore;
    use mockall::Sequence;

    fn jwt() -> JwtAuth {
        JwtAuth::new(&JwtConfig::new("test-secret-string-of-sufficient-length"))
    }

    fn service(repo: MockUserRepository) -> UserService<MockUserRepository> {
        UserService::new(repo, jwt(), Arc::new(MockMediaStore::new()), None)
    }

    fn service_with_mailer(
        repo: MockUserRepository,
    ) -> (UserService<MockUserRepository>, MockEmailProvider) {
        let provider = MockEmailProvider::new();
        let mailer = Mailer::new(Arc::new(provider.clone()), MailerConfig::default()).unwrap();
        (
            UserService::new(repo, jwt(), Arc::new(MockMediaStore::new()), Some(Arc::new(mailer))),
            provider,
        )
    }

    fn test_user(id: Uuid) -> User {
        User::new(
            "ada@example.com".to_string(),
            "Ada".to_string(),
            "Lovelace".to_string(),
            hash("correct horse"),
        )
        .with_id(id)
    }

    impl User {
        fn with_id(mut self, id: Uuid) -> Self {
            self.id = id;
            self
        }
    }

    fn hash(password: &str) -> String {
        let salt = SaltString::generate(&mut OsRng);
        Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .unwrap()
            .to_string()
    }

    fn cart_input(product: Uuid, quantity: i32, color: &str) -> UpdateCart {
        UpdateCart {
            product,
            quantity,
            color: color.to_string(),
        }
    }

    // ---- Cart reconciliation ----

    #[tokio::test]
    async fn empty_cart_gains_exactly_the_requested_line() {
        let user_id = Uuid::now_v7();
        let product = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        let mut seq = Sequence::new();

        repo.expect_get_cart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_| Ok(Some(vec![])));
        repo.expect_push_cart_line()
            .withf(move |_, line| {
                line.product == product && line.quantity == 2 && line.color == "red"
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        repo.expect_get_cart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                Ok(Some(vec![CartLine {
                    product,
                    quantity: 2,
                    color: "red".to_string(),
                }]))
            });

        let cart = service(repo)
            .update_cart(user_id, cart_input(product, 2, "red"))
            .await
            .unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 2);
        assert_eq!(cart[0].color, "red");
    }

    #[tokio::test]
    async fn matching_line_quantity_is_overwritten_not_added() {
        let user_id = Uuid::now_v7();
        let product = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        let mut seq = Sequence::new();

        repo.expect_get_cart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                Ok(Some(vec![CartLine {
                    product,
                    quantity: 2,
                    color: "red".to_string(),
                }]))
            });
        // quantity 5 replaces 2; an additive implementation would write 7
        repo.expect_set_cart_line_quantity()
            .withf(move |_, p, color, quantity| {
                *p == product && color == "red" && *quantity == 5
            })
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _, _, _| Ok(()));
        repo.expect_push_cart_line().times(0);
        repo.expect_get_cart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                Ok(Some(vec![CartLine {
                    product,
                    quantity: 5,
                    color: "red".to_string(),
                }]))
            });

        let cart = service(repo)
            .update_cart(user_id, cart_input(product, 5, "red"))
            .await
            .unwrap();

        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 5);
    }

    #[tokio::test]
    async fn same_product_different_color_appends_a_line() {
        let user_id = Uuid::now_v7();
        let product = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        let mut seq = Sequence::new();

        repo.expect_get_cart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                Ok(Some(vec![CartLine {
                    product,
                    quantity: 2,
                    color: "red".to_string(),
                }]))
            });
        repo.expect_set_cart_line_quantity().times(0);
        repo.expect_push_cart_line()
            .withf(move |_, line| line.color == "blue" && line.quantity == 3)
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        repo.expect_get_cart()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| {
                Ok(Some(vec![
                    CartLine {
                        product,
                        quantity: 2,
                        color: "red".to_string(),
                    },
                    CartLine {
                        product,
                        quantity: 3,
                        color: "blue".to_string(),
                    },
                ]))
            });

        let cart = service(repo)
            .update_cart(user_id, cart_input(product, 3, "blue"))
            .await
            .unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart[0].quantity, 2);
        assert_eq!(cart[1].color, "blue");
    }

    #[tokio::test]
    async fn invalid_cart_input_leaves_the_cart_untouched() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_cart().times(0);
        repo.expect_set_cart_line_quantity().times(0);
        repo.expect_push_cart_line().times(0);

        let err = service(repo)
            .update_cart(user_id, cart_input(Uuid::now_v7(), 0, "red"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));
    }

    #[tokio::test]
    async fn empty_color_is_rejected() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_cart().times(0);

        let err = service(repo)
            .update_cart(user_id, cart_input(Uuid::now_v7(), 1, ""))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));
    }

    #[tokio::test]
    async fn cart_update_for_missing_user_fails_with_not_found() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_cart().returning(|_| Ok(None));
        repo.expect_push_cart_line().times(0);

        let err = service(repo)
            .update_cart(user_id, cart_input(Uuid::now_v7(), 1, "red"))
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::NotFound(_)));
    }

    // ---- Auth ----

    #[tokio::test]
    async fn register_rejects_duplicate_email() {
        let mut repo = MockUserRepository::new();
        repo.expect_email_exists().returning(|_| Ok(true));
        repo.expect_create().times(0);

        let err = service(repo)
            .register(RegisterRequest {
                email: "ada@example.com".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn register_issues_tokens_and_sends_welcome_email() {
        let mut repo = MockUserRepository::new();
        repo.expect_email_exists().returning(|_| Ok(false));
        repo.expect_create().returning(Ok);
        repo.expect_set_refresh_token()
            .withf(|_, token| token.is_some())
            .times(1)
            .returning(|_, _| Ok(()));

        let (service, provider) = service_with_mailer(repo);
        let tokens = service
            .register(RegisterRequest {
                email: "ada@example.com".to_string(),
                first_name: "Ada".to_string(),
                last_name: "Lovelace".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();

        assert!(!tokens.access_token.is_empty());
        assert_ne!(tokens.access_token, tokens.refresh_token);
        assert!(provider.was_sent_to("ada@example.com"));
    }

    #[tokio::test]
    async fn login_with_wrong_password_fails() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .returning(move |_| Ok(Some(test_user(user_id))));
        repo.expect_set_refresh_token().times(0);

        let err = service(repo)
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "wrong".to_string(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_rotates_the_stored_refresh_token() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .returning(move |_| Ok(Some(test_user(user_id))));
        repo.expect_set_refresh_token()
            .withf(move |id, token| *id == user_id && token.is_some())
            .times(1)
            .returning(|_, _| Ok(()));

        let tokens = service(repo)
            .login(LoginRequest {
                email: "ada@example.com".to_string(),
                password: "correct horse".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(tokens.user.email, "ada@example.com");
    }

    #[tokio::test]
    async fn refresh_rejects_a_token_not_stored_on_the_user() {
        let user_id = Uuid::now_v7();
        let auth = jwt();
        let refresh_token = auth
            .create_refresh_token(&user_id.to_string(), "a@example.com", "Ada", &[])
            .unwrap();

        let mut repo = MockUserRepository::new();
        repo.expect_find_by_refresh_token().returning(|_, _| Ok(None));

        let err = service(repo).refresh(&refresh_token).await.unwrap_err();
        assert!(matches!(err, UserError::InvalidRefreshToken));
    }

    #[tokio::test]
    async fn refresh_mints_a_new_access_token_for_a_stored_token() {
        let user_id = Uuid::now_v7();
        let auth = jwt();
        let refresh_token = auth
            .create_refresh_token(&user_id.to_string(), "ada@example.com", "Ada Lovelace", &[])
            .unwrap();

        let mut repo = MockUserRepository::new();
        let stored = refresh_token.clone();
        repo.expect_find_by_refresh_token()
            .withf(move |id, token| *id == user_id && token == stored)
            .returning(move |_, _| Ok(Some(test_user(user_id))));

        let access = service(repo).refresh(&refresh_token).await.unwrap();
        assert!(!access.is_empty());
    }

    // ---- Password flows ----

    #[tokio::test]
    async fn update_password_requires_a_different_password() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id().times(0);

        let err = service(repo)
            .update_password(
                Uuid::now_v7(),
                UpdatePasswordRequest {
                    current_password: "same-password".to_string(),
                    new_password: "same-password".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));
    }

    #[tokio::test]
    async fn update_password_verifies_the_current_password() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_id()
            .returning(move |_| Ok(Some(test_user(user_id))));
        repo.expect_update().times(0);

        let err = service(repo)
            .update_password(
                user_id,
                UpdatePasswordRequest {
                    current_password: "not the password".to_string(),
                    new_password: "new-password-1".to_string(),
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidCredentials));
    }

    #[tokio::test]
    async fn forgot_password_stores_a_hash_and_emails_the_plain_token() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_by_email()
            .returning(move |_| Ok(Some(test_user(user_id))));
        repo.expect_set_password_reset()
            .withf(move |id, token_hash, expires| {
                // sha256 hex digest, and a future expiry
                *id == user_id && token_hash.len() == 64 && *expires > Utc::now()
            })
            .times(1)
            .returning(|_, _, _| Ok(()));

        let (service, provider) = service_with_mailer(repo);
        service.forgot_password("ada@example.com").await.unwrap();

        let sent = provider.sent_emails();
        assert_eq!(sent.len(), 1);
        let body = sent[0].body_text.as_ref().unwrap();
        assert!(body.contains("/reset-password/"));
    }

    #[tokio::test]
    async fn reset_password_with_unknown_token_fails() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_reset_token().returning(|_, _| Ok(None));
        repo.expect_update().times(0);

        let err = service(repo)
            .reset_password("bogus-token", "new-password-1")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::InvalidResetToken));
    }

    #[tokio::test]
    async fn reset_password_clears_reset_fields() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();

        let mut user = test_user(user_id);
        user.password_reset_token = Some("stored-hash".to_string());
        user.password_reset_expires = Some(Utc::now() + Duration::minutes(5));
        repo.expect_find_by_reset_token()
            .returning(move |_, _| Ok(Some(user.clone())));
        repo.expect_update()
            .withf(|user| {
                user.password_reset_token.is_none()
                    && user.password_reset_expires.is_none()
                    && user.password_changed_at.is_some()
            })
            .times(1)
            .returning(Ok);

        service(repo)
            .reset_password("the-plain-token", "new-password-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn reset_password_rejects_short_passwords_before_any_lookup() {
        let mut repo = MockUserRepository::new();
        repo.expect_find_by_reset_token().times(0);

        let err = service(repo)
            .reset_password("the-plain-token", "short")
            .await
            .unwrap_err();
        assert!(matches!(err, UserError::Validation(_)));
    }

    // ---- Avatar ----

    #[tokio::test]
    async fn avatar_upload_destroys_the_previous_asset() {
        let user_id = Uuid::now_v7();
        let media = MockMediaStore::new();

        let mut repo = MockUserRepository::new();
        let mut seq = Sequence::new();
        let mut user = test_user(user_id);
        user.avatar = Some(Avatar {
            url: "https://media.test/old/avatar.png".to_string(),
            public_id: "old-avatar".to_string(),
        });
        repo.expect_get_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(user.clone())));
        repo.expect_set_avatar()
            .withf(|_, avatar| !avatar.public_id.is_empty())
            .times(1)
            .in_sequence(&mut seq)
            .returning(|_, _| Ok(()));
        repo.expect_get_by_id()
            .times(1)
            .in_sequence(&mut seq)
            .returning(move |_| Ok(Some(test_user(user_id))));

        let service = UserService::new(repo, jwt(), Arc::new(media.clone()), None);
        service
            .upload_avatar(user_id, vec![1, 2, 3], "avatar.png", "image/png")
            .await
            .unwrap();

        assert_eq!(media.deleted_ids(), vec!["old-avatar".to_string()]);
        assert_eq!(media.uploaded_assets().len(), 1);
    }
}
