use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[cfg(not(target_arch = "wasm32"))]
use sqlx::FromRow;

/// Email and password, used both to register and to log in.
#[derive(Serialize, Deserialize, Clone, Debug, Validate, ToSchema)]
pub struct Credentials {
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    // bcrypt only looks at the first 72 bytes
    #[validate(length(min = 8, max = 72, message = "must be between 8 and 72 characters"))]
    pub password: String,
}

/// Public view of a user. Never carries the password hash.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct UserDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub email: String,
    pub is_chirpy_red: bool,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct LoginResponse {
    #[serde(flatten)]
    pub user: UserDto,
    /// Short-lived access JWT.
    pub token: String,
    /// Opaque long-lived token accepted by `/api/refresh` and `/api/revoke`.
    pub refresh_token: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct TokenResponse {
    pub token: String,
}

#[cfg_attr(not(target_arch = "wasm32"), derive(FromRow))]
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ChirpDto {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub body: String,
    pub user_id: Uuid,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct CreateChirp {
    pub body: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct ValidateChirpRequest {
    pub body: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, ToSchema)]
pub struct ValidateChirpResponse {
    pub cleaned_body: String,
}

/// Payload posted by the payment provider.
#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct WebhookEvent {
    pub event: String,
    #[serde(default)]
    pub data: Option<WebhookData>,
}

#[derive(Serialize, Deserialize, Clone, Debug, ToSchema)]
pub struct WebhookData {
    pub user_id: Uuid,
}

pub const USER_UPGRADED_EVENT: &str = "user.upgraded";
