use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// User roles
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Admin => write!(f, "admin"),
        }
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("Unknown role: {}", s)),
        }
    }
}

/// Uploaded avatar reference
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Avatar {
    pub url: String,
    pub public_id: String,
}

/// Shipping address entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Address {
    pub address: String,
}

/// One (product, color, quantity) entry in a user's cart
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct CartLine {
    pub product: Uuid,
    pub quantity: i32,
    pub color: String,
}

/// User entity stored in MongoDB
///
/// Persisted user document. Serialization here is what the typed
/// `Collection<User>` writes to MongoDB, so credential fields must
/// round-trip; API responses go through [`UserResponse`] instead.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    /// Unique identifier (stored as _id in MongoDB)
    #[serde(rename = "_id", alias = "id")]
    pub id: Uuid,
    /// User email (unique)
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    /// Argon2 password hash (never exposed in API responses)
    pub password_hash: String,
    pub role: Role,
    pub phone: Option<String>,
    pub avatar: Option<Avatar>,
    #[serde(default)]
    pub addresses: Vec<Address>,
    #[serde(default)]
    pub carts: Vec<CartLine>,
    /// Currently valid refresh token, rotated on login. Absent from the
    /// document when cleared so the login-match filter never sees nulls.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    /// SHA-256 hash of the outstanding password reset token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_expires: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn new(email: String, first_name: String, last_name: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            email,
            first_name,
            last_name,
            password_hash,
            role: Role::User,
            phone: None,
            avatar: None,
            addresses: Vec::new(),
            carts: Vec::new(),
            refresh_token: None,
            password_reset_token: None,
            password_reset_expires: None,
            password_changed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// User projection returned by the API (no secrets)
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub avatar: Option<Avatar>,
    pub addresses: Vec<Address>,
    pub carts: Vec<CartLine>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            phone: user.phone,
            avatar: user.avatar,
            addresses: user.addresses,
            carts: user.carts,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// DTO for account registration
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// DTO for login
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1))]
    pub password: String,
}

/// Response body for register/login
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
}

/// Outcome of an authentication operation, including the refresh token the
/// handler turns into a cookie
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}

/// DTO for profile updates
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProfile {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

/// DTO for authenticated password change
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdatePasswordRequest {
    #[validate(length(min = 1))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Query parameters for the forgot-password request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema, utoipa::IntoParams)]
pub struct ForgotPasswordQuery {
    #[validate(email)]
    pub email: String,
}

/// DTO for completing a password reset
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct ResetPasswordRequest {
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// DTO for adding an address
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct AddAddressRequest {
    #[validate(length(min = 1, max = 500))]
    pub address: String,
}

/// DTO for the cart upsert
///
/// Quantity always overwrites the matched line; it is never added to the
/// existing value.
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct UpdateCart {
    pub product: Uuid,
    #[validate(range(min = 1))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 100))]
    pub color: String,
}
