use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    Json,
};
use chirpy_common::{Credentials, LoginResponse, TokenResponse, UserDto};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;
use validator::Validate;

use crate::auth::{self, AuthError};
use crate::db::DbPool;
use crate::error::{is_unique_violation, AppError};
use crate::extractors::{AppJson, AuthUser};
use crate::web_server::AppState;

// --- Rows ---

#[derive(sqlx::FromRow, Debug)]
pub struct User {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub hashed_password: String,
    pub is_chirpy_red: bool,
}

impl From<User> for UserDto {
    fn from(user: User) -> Self {
        UserDto {
            id: user.id,
            created_at: user.created_at,
            updated_at: user.updated_at,
            email: user.email,
            is_chirpy_red: user.is_chirpy_red,
        }
    }
}

#[derive(sqlx::FromRow)]
struct RefreshTokenRecord {
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    revoked_at: Option<DateTime<Utc>>,
}

impl RefreshTokenRecord {
    fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.revoked_at.is_none() && self.expires_at > now
    }
}

const USER_COLUMNS: &str = "id, created_at, updated_at, email, hashed_password, is_chirpy_red";

// --- Helpers ---

// bcrypt is deliberately slow; keep it off the async workers.
async fn hash_password(password: String, cost: u32) -> Result<String, AppError> {
    tokio::task::spawn_blocking(move || auth::hash_password(&password, cost))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Password hashing task failed: {e}")))?
        .map_err(AppError::from)
}

async fn check_password(password: String, hashed_password: String) -> Result<(), AppError> {
    tokio::task::spawn_blocking(move || auth::check_password_hash(&password, &hashed_password))
        .await
        .map_err(|e| AppError::InternalServerError(format!("Password check task failed: {e}")))?
        .map_err(AppError::from)
}

fn conflict_on_duplicate_email(e: sqlx::Error) -> AppError {
    if is_unique_violation(&e) {
        AppError::Conflict("User with this email already exists".to_string())
    } else {
        e.into()
    }
}

/// Refresh/revoke read the refresh token from the header; a missing or
/// malformed header is a bad request, not a failed authentication.
fn refresh_token_from(headers: &HeaderMap) -> Result<&str, AppError> {
    auth::get_bearer_token(headers).map_err(|e: AuthError| AppError::BadRequest(e.to_string()))
}

fn access_token_for(user_id: Uuid, state: &AppState) -> Result<String, AppError> {
    let auth_config = &state.app_config.auth;
    Ok(auth::make_jwt(
        user_id,
        auth_config.jwt_secret.expose(),
        Duration::minutes(auth_config.access_token_expires_minutes),
    )?)
}

/// Mints a refresh token for the user and stores its digest. Earlier
/// sessions stay valid until they expire or are revoked.
async fn issue_refresh_token(
    db_pool: &DbPool,
    user_id: Uuid,
    lifetime: Duration,
) -> Result<String, AppError> {
    let refresh_token = auth::make_refresh_token();
    let now = Utc::now();

    sqlx::query(
        "INSERT INTO refresh_tokens (token_hash, created_at, updated_at, user_id, expires_at, revoked_at)
         VALUES ($1, $2, $3, $4, $5, NULL)",
    )
    .bind(auth::hash_refresh_token(&refresh_token))
    .bind(now)
    .bind(now)
    .bind(user_id)
    .bind(now + lifetime)
    .execute(db_pool)
    .await?;

    Ok(refresh_token)
}

// --- API Handlers ---

/// ## Register a new user
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = Credentials,
    responses(
        (status = 201, description = "User created successfully", body = UserDto),
        (status = 400, description = "Invalid data provided"),
        (status = 409, description = "User with this email already exists"),
    )
)]
pub async fn create_user(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> Result<(StatusCode, Json<UserDto>), AppError> {
    payload.validate()?;

    tracing::info!("Registering user with email: {}", &payload.email);
    let hashed_password =
        hash_password(payload.password, state.app_config.auth.password_hash_cost).await?;

    let now = Utc::now();
    let user = sqlx::query_as::<_, User>(&format!(
        "INSERT INTO users (id, created_at, updated_at, email, hashed_password, is_chirpy_red)
         VALUES ($1, $2, $3, $4, $5, FALSE)
         RETURNING {USER_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(now)
    .bind(now)
    .bind(&payload.email)
    .bind(&hashed_password)
    .fetch_one(&state.db_pool)
    .await
    .map_err(conflict_on_duplicate_email)?;

    Ok((StatusCode::CREATED, Json(user.into())))
}

/// ## Change the caller's email and password
#[utoipa::path(
    put,
    path = "/api/users",
    tag = "users",
    request_body = Credentials,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User updated", body = UserDto),
        (status = 400, description = "Invalid data provided"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 409, description = "Email already taken"),
    )
)]
pub async fn update_user(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<Credentials>,
) -> Result<Json<UserDto>, AppError> {
    payload.validate()?;

    tracing::info!("Updating credentials for user {}", user.id);
    let hashed_password =
        hash_password(payload.password, state.app_config.auth.password_hash_cost).await?;

    let updated = sqlx::query_as::<_, User>(&format!(
        "UPDATE users SET email = $1, hashed_password = $2, updated_at = $3
         WHERE id = $4
         RETURNING {USER_COLUMNS}"
    ))
    .bind(&payload.email)
    .bind(&hashed_password)
    .bind(Utc::now())
    .bind(user.id)
    .fetch_optional(&state.db_pool)
    .await
    .map_err(conflict_on_duplicate_email)?
    .ok_or(AppError::NotFound)?;

    Ok(Json(updated.into()))
}

/// ## Login an existing user
/// Returns the user together with an access token and a refresh token.
#[utoipa::path(
    post,
    path = "/api/login",
    tag = "auth",
    request_body = Credentials,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
        (status = 500, description = "Internal server error")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    AppJson(payload): AppJson<Credentials>,
) -> Result<Json<LoginResponse>, AppError> {
    // No shape validation: a malformed email or password is just a failed login.

    tracing::info!("Logging in user with email: {}", &payload.email);
    let user = sqlx::query_as::<_, User>(&format!(
        "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
    ))
    .bind(&payload.email)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    check_password(payload.password, user.hashed_password.clone()).await?;

    let token = access_token_for(user.id, &state)?;
    let refresh_token = issue_refresh_token(
        &state.db_pool,
        user.id,
        Duration::days(state.app_config.auth.refresh_token_expires_days),
    )
    .await?;

    Ok(Json(LoginResponse {
        user: user.into(),
        token,
        refresh_token,
    }))
}

/// ## Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/api/refresh",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Unknown, expired or revoked refresh token")
    )
)]
pub async fn refresh(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<TokenResponse>, AppError> {
    let refresh_token = refresh_token_from(&headers)?;

    let record = sqlx::query_as::<_, RefreshTokenRecord>(
        "SELECT user_id, expires_at, revoked_at FROM refresh_tokens WHERE token_hash = $1",
    )
    .bind(auth::hash_refresh_token(refresh_token))
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    if !record.is_active(Utc::now()) {
        tracing::warn!("Rejected stale refresh token for user {}", record.user_id);
        return Err(AppError::Unauthorized);
    }

    let token = access_token_for(record.user_id, &state)?;
    Ok(Json(TokenResponse { token }))
}

/// ## Revoke a refresh token
#[utoipa::path(
    post,
    path = "/api/revoke",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Refresh token revoked"),
        (status = 400, description = "Missing refresh token"),
        (status = 401, description = "Unknown refresh token")
    )
)]
pub async fn revoke(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let refresh_token = refresh_token_from(&headers)?;
    let now = Utc::now();

    // The first revocation time sticks.
    let result = sqlx::query(
        "UPDATE refresh_tokens SET revoked_at = COALESCE(revoked_at, $1), updated_at = $2
         WHERE token_hash = $3",
    )
    .bind(now)
    .bind(now)
    .bind(auth::hash_refresh_token(refresh_token))
    .execute(&state.db_pool)
    .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::Unauthorized);
    }

    Ok(StatusCode::NO_CONTENT)
}
