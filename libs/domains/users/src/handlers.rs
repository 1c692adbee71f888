use axum::{
    Extension, Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    middleware,
    response::{AppendHeaders, IntoResponse, Response},
    routing::{get, post, put},
};
use axum_helpers::{
    ACCESS_TOKEN_TTL, JwtAuth, JwtClaims, REFRESH_TOKEN_TTL, ValidatedJson,
    errors::responses::{
        BadRequestValidationResponse, InternalServerErrorResponse, NotFoundResponse,
        UnauthorizedResponse,
    },
    jwt_auth_middleware,
};
use serde::Serialize;
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};
use uuid::Uuid;

use crate::error::{UserError, UserResult};
use crate::models::{
    AddAddressRequest, AuthResponse, CartLine, ForgotPasswordQuery, LoginRequest, RegisterRequest,
    ResetPasswordRequest, UpdateCart, UpdatePasswordRequest, UpdateProfile, UserResponse,
};
use crate::repository::UserRepository;
use crate::service::UserService;

/// OpenAPI documentation for the users API
#[derive(OpenApi)]
#[openapi(
    paths(
        register,
        login,
        refresh,
        logout,
        forgot_password,
        reset_password,
        me,
        update_profile,
        update_password,
        add_address,
        update_cart,
        upload_avatar,
        list_users,
    ),
    components(
        schemas(
            RegisterRequest,
            LoginRequest,
            AuthResponse,
            UserResponse,
            UpdateProfile,
            UpdatePasswordRequest,
            ResetPasswordRequest,
            AddAddressRequest,
            UpdateCart,
            CartLine,
            MessageResponse
        ),
        responses(
            NotFoundResponse,
            BadRequestValidationResponse,
            UnauthorizedResponse,
            InternalServerErrorResponse
        )
    ),
    tags(
        (name = "Users", description = "Authentication, profiles, and carts")
    )
)]
pub struct ApiDoc;

#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

/// Create the users router with all HTTP endpoints.
///
/// Routes under /me require a valid access token (header or cookie).
pub fn router<R: UserRepository + 'static>(
    service: UserService<R>,
    jwt_auth: JwtAuth,
) -> Router {
    let shared_service = Arc::new(service);

    let protected = Router::new()
        .route("/", get(list_users))
        .route("/me", get(me).put(update_profile))
        .route("/me/password", put(update_password))
        .route("/me/addresses", post(add_address))
        .route("/me/cart", put(update_cart))
        .route("/me/avatar", put(upload_avatar))
        .route_layer(middleware::from_fn_with_state(
            jwt_auth,
            jwt_auth_middleware,
        ));

    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/refresh", post(refresh))
        .route("/logout", post(logout))
        .route("/forgot-password", get(forgot_password))
        .route("/reset-password/{token}", put(reset_password))
        .merge(protected)
        .with_state(shared_service)
}

/// Check if running in development mode
fn is_development() -> bool {
    std::env::var("APP_ENV")
        .map(|env| env == "development")
        .unwrap_or_else(|_| cfg!(debug_assertions))
}

fn auth_cookie(name: &str, value: &str, max_age: i64) -> UserResult<HeaderValue> {
    let secure_flag = if is_development() { "" } else { " Secure;" };
    let cookie = format!(
        "{}={}; HttpOnly;{} SameSite=Strict; Path=/; Max-Age={}",
        name, value, secure_flag, max_age
    );
    HeaderValue::from_str(&cookie)
        .map_err(|e| UserError::Internal(format!("Failed to create cookie: {}", e)))
}

fn extract_cookie_value(cookies: &str, name: &str) -> Option<String> {
    cookies.split(';').find_map(|cookie| {
        let parts: Vec<&str> = cookie.trim().splitn(2, '=').collect();
        if parts.len() == 2 && parts[0] == name {
            Some(parts[1].to_string())
        } else {
            None
        }
    })
}

fn refresh_token_from_headers(headers: &HeaderMap) -> Option<String> {
    headers
        .get(header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|cookies| extract_cookie_value(cookies, "refresh_token"))
}

fn claims_user_id(claims: &JwtClaims) -> UserResult<Uuid> {
    claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| UserError::InvalidCredentials)
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/register",
    tag = "Users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = AuthResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 409, description = "Email already registered"),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn register<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<RegisterRequest>,
) -> Result<Response, UserError> {
    let tokens = service.register(input).await?;

    let access_cookie = auth_cookie("access_token", &tokens.access_token, ACCESS_TOKEN_TTL)?;
    let refresh_cookie = auth_cookie("refresh_token", &tokens.refresh_token, REFRESH_TOKEN_TTL)?;

    let response = AuthResponse {
        user: tokens.user,
        access_token: tokens.access_token,
    };

    Ok((
        StatusCode::CREATED,
        AppendHeaders([
            (header::SET_COOKIE, access_cookie),
            (header::SET_COOKIE, refresh_cookie),
        ]),
        Json(response),
    )
        .into_response())
}

/// Login with email/password
#[utoipa::path(
    post,
    path = "/login",
    tag = "Users",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = AuthResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn login<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    ValidatedJson(input): ValidatedJson<LoginRequest>,
) -> Result<Response, UserError> {
    let tokens = service.login(input).await?;

    let access_cookie = auth_cookie("access_token", &tokens.access_token, ACCESS_TOKEN_TTL)?;
    let refresh_cookie = auth_cookie("refresh_token", &tokens.refresh_token, REFRESH_TOKEN_TTL)?;

    let response = AuthResponse {
        user: tokens.user,
        access_token: tokens.access_token,
    };

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, access_cookie),
            (header::SET_COOKIE, refresh_cookie),
        ]),
        Json(response),
    )
        .into_response())
}

/// Mint a new access token from the refresh token cookie
#[utoipa::path(
    post,
    path = "/refresh",
    tag = "Users",
    responses(
        (status = 200, description = "New access token issued", body = MessageResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn refresh<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    headers: HeaderMap,
) -> Result<Response, UserError> {
    let refresh_token =
        refresh_token_from_headers(&headers).ok_or(UserError::InvalidRefreshToken)?;

    let access_token = service.refresh(&refresh_token).await?;
    let access_cookie = auth_cookie("access_token", &access_token, ACCESS_TOKEN_TTL)?;

    Ok((
        AppendHeaders([(header::SET_COOKIE, access_cookie)]),
        Json(MessageResponse {
            message: "Access token refreshed".to_string(),
        }),
    )
        .into_response())
}

/// Logout: clear the stored refresh token and both cookies
#[utoipa::path(
    post,
    path = "/logout",
    tag = "Users",
    responses(
        (status = 204, description = "Logged out"),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn logout<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    headers: HeaderMap,
) -> Result<Response, UserError> {
    if let Some(refresh_token) = refresh_token_from_headers(&headers) {
        service.logout(&refresh_token).await?;
    }

    let clear_access = auth_cookie("access_token", "", 0)?;
    let clear_refresh = auth_cookie("refresh_token", "", 0)?;

    Ok((
        AppendHeaders([
            (header::SET_COOKIE, clear_access),
            (header::SET_COOKIE, clear_refresh),
        ]),
        StatusCode::NO_CONTENT,
    )
        .into_response())
}

/// Start a password reset for the given email
#[utoipa::path(
    get,
    path = "/forgot-password",
    tag = "Users",
    params(ForgotPasswordQuery),
    responses(
        (status = 200, description = "Reset email sent", body = MessageResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn forgot_password<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Query(query): Query<ForgotPasswordQuery>,
) -> UserResult<Json<MessageResponse>> {
    service.forgot_password(&query.email).await?;

    Ok(Json(MessageResponse {
        message: "Password reset link sent".to_string(),
    }))
}

/// Complete a password reset with the emailed token
#[utoipa::path(
    put,
    path = "/reset-password/{token}",
    tag = "Users",
    params(
        ("token" = String, Path, description = "Reset token from the email link")
    ),
    request_body = ResetPasswordRequest,
    responses(
        (status = 200, description = "Password reset", body = MessageResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 500, response = InternalServerErrorResponse)
    )
)]
async fn reset_password<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Path(token): Path<String>,
    ValidatedJson(input): ValidatedJson<ResetPasswordRequest>,
) -> UserResult<Json<MessageResponse>> {
    service.reset_password(&token, &input.new_password).await?;

    Ok(Json(MessageResponse {
        message: "Password has been reset".to_string(),
    }))
}

/// Get the authenticated user's profile
#[utoipa::path(
    get,
    path = "/me",
    tag = "Users",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("jwt" = []))
)]
async fn me<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Extension(claims): Extension<JwtClaims>,
) -> UserResult<Json<UserResponse>> {
    let user_id = claims_user_id(&claims)?;
    let user = service.get_user(user_id).await?;
    Ok(Json(user))
}

/// Update the authenticated user's profile
#[utoipa::path(
    put,
    path = "/me",
    tag = "Users",
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("jwt" = []))
)]
async fn update_profile<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(input): ValidatedJson<UpdateProfile>,
) -> UserResult<Json<UserResponse>> {
    let user_id = claims_user_id(&claims)?;
    let user = service.update_profile(user_id, input).await?;
    Ok(Json(user))
}

/// Change the authenticated user's password
#[utoipa::path(
    put,
    path = "/me/password",
    tag = "Users",
    request_body = UpdatePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("jwt" = []))
)]
async fn update_password<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(input): ValidatedJson<UpdatePasswordRequest>,
) -> UserResult<Json<MessageResponse>> {
    let user_id = claims_user_id(&claims)?;
    service.update_password(user_id, input).await?;

    Ok(Json(MessageResponse {
        message: "Password updated".to_string(),
    }))
}

/// Add an address to the authenticated user's profile
#[utoipa::path(
    post,
    path = "/me/addresses",
    tag = "Users",
    request_body = AddAddressRequest,
    responses(
        (status = 200, description = "Address added", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("jwt" = []))
)]
async fn add_address<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(input): ValidatedJson<AddAddressRequest>,
) -> UserResult<Json<UserResponse>> {
    let user_id = claims_user_id(&claims)?;
    let user = service.add_address(user_id, input).await?;
    Ok(Json(user))
}

/// Upsert a cart line and return the full cart.
///
/// Lines are keyed on (product, color); a matching line has its quantity
/// overwritten with the requested value.
#[utoipa::path(
    put,
    path = "/me/cart",
    tag = "Users",
    request_body = UpdateCart,
    responses(
        (status = 200, description = "Updated cart", body = Vec<CartLine>),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("jwt" = []))
)]
async fn update_cart<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Extension(claims): Extension<JwtClaims>,
    ValidatedJson(input): ValidatedJson<UpdateCart>,
) -> UserResult<Json<Vec<CartLine>>> {
    let user_id = claims_user_id(&claims)?;
    let cart = service.update_cart(user_id, input).await?;
    Ok(Json(cart))
}

/// Upload a new avatar image (multipart field "image")
#[utoipa::path(
    put,
    path = "/me/avatar",
    tag = "Users",
    request_body(content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Avatar updated", body = UserResponse),
        (status = 400, response = BadRequestValidationResponse),
        (status = 401, response = UnauthorizedResponse),
        (status = 404, response = NotFoundResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("jwt" = []))
)]
async fn upload_avatar<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
    Extension(claims): Extension<JwtClaims>,
    mut multipart: Multipart,
) -> UserResult<Json<UserResponse>> {
    let user_id = claims_user_id(&claims)?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| UserError::Validation(format!("Invalid multipart body: {}", e)))?
    {
        if field.name() != Some("image") {
            continue;
        }

        let filename = field.file_name().unwrap_or("avatar").to_string();
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| UserError::Validation(format!("Failed to read upload: {}", e)))?;

        if bytes.is_empty() {
            return Err(UserError::Validation("Uploaded file is empty".to_string()));
        }

        let user = service
            .upload_avatar(user_id, bytes.to_vec(), &filename, &content_type)
            .await?;
        return Ok(Json(user));
    }

    Err(UserError::Validation(
        "Missing multipart field 'image'".to_string(),
    ))
}

/// List all users
#[utoipa::path(
    get,
    path = "/",
    tag = "Users",
    responses(
        (status = 200, description = "All users", body = Vec<UserResponse>),
        (status = 401, response = UnauthorizedResponse),
        (status = 500, response = InternalServerErrorResponse)
    ),
    security(("jwt" = []))
)]
async fn list_users<R: UserRepository>(
    State(service): State<Arc<UserService<R>>>,
) -> UserResult<Json<Vec<UserResponse>>> {
    let users = service.list_users().await?;
    Ok(Json(users))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::MockUserRepository;
    use crate::service::UserService;
    use axum::body::Body;
    use axum::http::Request;
    use axum_helpers::JwtConfig;
    use http_body_util::BodyExt;
    use media::MockMediaStore;
    use serde_json::json;
    use tower::ServiceExt;

    fn jwt() -> JwtAuth {
        JwtAuth::new(&JwtConfig::new("test-secret-string-of-sufficient-length"))
    }

    fn app(repo: MockUserRepository) -> Router {
        let jwt_auth = jwt();
        let service = UserService::new(
            repo,
            jwt_auth.clone(),
            Arc::new(MockMediaStore::new()),
            None,
        );
        router(service, jwt_auth)
    }

    fn bearer_token(user_id: Uuid) -> String {
        jwt()
            .create_access_token(&user_id.to_string(), "ada@example.com", "Ada Lovelace", &[])
            .unwrap()
    }

    async fn json_body<T: serde::de::DeserializeOwned>(body: Body) -> T {
        let bytes = body.collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn cart_update_without_token_returns_401() {
        let mut repo = MockUserRepository::new();
        repo.expect_get_cart().times(0);

        let request = Request::builder()
            .method("PUT")
            .uri("/me/cart")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({ "product": Uuid::now_v7(), "quantity": 1, "color": "red" }).to_string(),
            ))
            .unwrap();

        let response = app(repo).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn cart_update_with_missing_color_is_a_client_error() {
        let user_id = Uuid::now_v7();
        let mut repo = MockUserRepository::new();
        repo.expect_get_cart().times(0);
        repo.expect_push_cart_line().times(0);

        let request = Request::builder()
            .method("PUT")
            .uri("/me/cart")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", bearer_token(user_id)))
            .body(Body::from(
                json!({ "product": Uuid::now_v7(), "quantity": 1 }).to_string(),
            ))
            .unwrap();

        let response = app(repo).oneshot(request).await.unwrap();
        assert!(response.status().is_client_error());
    }

    #[tokio::test]
    async fn cart_update_returns_the_reconciled_cart() {
        let user_id = Uuid::now_v7();
        let product = Uuid::now_v7();

        let mut repo = MockUserRepository::new();
        let mut calls = 0;
        repo.expect_get_cart().times(2).returning(move |_| {
            calls += 1;
            let quantity = if calls == 1 { 2 } else { 5 };
            Ok(Some(vec![CartLine {
                product,
                quantity,
                color: "red".to_string(),
            }]))
        });
        repo.expect_set_cart_line_quantity()
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let request = Request::builder()
            .method("PUT")
            .uri("/me/cart")
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {}", bearer_token(user_id)))
            .body(Body::from(
                json!({ "product": product, "quantity": 5, "color": "red" }).to_string(),
            ))
            .unwrap();

        let response = app(repo).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let cart: Vec<CartLine> = json_body(response.into_body()).await;
        assert_eq!(cart.len(), 1);
        assert_eq!(cart[0].quantity, 5);
    }

    #[tokio::test]
    async fn register_sets_auth_cookies() {
        let mut repo = MockUserRepository::new();
        repo.expect_email_exists().returning(|_| Ok(false));
        repo.expect_create().returning(Ok);
        repo.expect_set_refresh_token().returning(|_, _| Ok(()));

        let request = Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "email": "ada@example.com",
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "password": "correct horse"
                })
                .to_string(),
            ))
            .unwrap();

        let response = app(repo).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);

        let cookies: Vec<&str> = response
            .headers()
            .get_all(header::SET_COOKIE)
            .iter()
            .map(|v| v.to_str().unwrap())
            .collect();
        assert!(cookies.iter().any(|c| c.starts_with("access_token=")));
        assert!(cookies.iter().any(|c| c.starts_with("refresh_token=")));
    }

    #[tokio::test]
    async fn register_with_short_password_returns_400() {
        let mut repo = MockUserRepository::new();
        repo.expect_create().times(0);

        let request = Request::builder()
            .method("POST")
            .uri("/register")
            .header("content-type", "application/json")
            .body(Body::from(
                json!({
                    "email": "ada@example.com",
                    "first_name": "Ada",
                    "last_name": "Lovelace",
                    "password": "short"
                })
                .to_string(),
            ))
            .unwrap();

        let response = app(repo).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn cookie_value_is_extracted_by_name() {
        let cookies = "access_token=abc; refresh_token=def; other=ghi";
        assert_eq!(
            extract_cookie_value(cookies, "refresh_token"),
            Some("def".to_string())
        );
        assert_eq!(extract_cookie_value(cookies, "missing"), None);
    }

    #[test]
    fn cookie_values_may_contain_equals_signs() {
        let cookies = "refresh_token=abc==";
        assert_eq!(
            extract_cookie_value(cookies, "refresh_token"),
            Some("abc==".to_string())
        );
    }

    #[test]
    fn auth_cookie_carries_http_only_and_max_age() {
        let cookie = auth_cookie("access_token", "tok", 900).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("access_token=tok;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Max-Age=900"));
    }
}
