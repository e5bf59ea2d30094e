use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use base64::engine::{general_purpose, Engine as _};
use bcrypt::{hash, verify};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;
use thiserror::Error;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::AuthUser;
use crate::users::User;
use crate::web_server::AppState;

/// Issuer stamped on, and required from, every access token.
pub const TOKEN_ISSUER: &str = "chirpy";

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("authorization header is missing")]
    MissingAuthHeader,

    #[error("authorization header is malformed")]
    MalformedAuthHeader,

    #[error("password does not match")]
    PasswordMismatch,

    #[error("password hashing failed: {0}")]
    Hashing(#[from] bcrypt::BcryptError),

    #[error("token signing failed: {0}")]
    Signing(jsonwebtoken::errors::Error),

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("token subject is not a user id")]
    InvalidSubject,
}

impl AuthError {
    /// Failures on our side rather than bad input from the caller.
    pub fn is_internal(&self) -> bool {
        matches!(self, AuthError::Hashing(_) | AuthError::Signing(_))
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub iss: String,
    pub sub: String, // user id
    pub iat: i64,
    pub exp: i64,
    pub jti: String, // keeps tokens minted in the same second distinct
}

// --- Passwords ---

pub fn hash_password(password: &str, cost: u32) -> Result<String, AuthError> {
    Ok(hash(password, cost)?)
}

pub fn check_password_hash(password: &str, password_hash: &str) -> Result<(), AuthError> {
    if verify(password, password_hash)? {
        Ok(())
    } else {
        Err(AuthError::PasswordMismatch)
    }
}

// --- Access tokens ---

pub fn make_jwt(user_id: Uuid, secret: &str, expires_in: Duration) -> Result<String, AuthError> {
    let now = Utc::now();
    let claims = Claims {
        iss: TOKEN_ISSUER.to_string(),
        sub: user_id.to_string(),
        iat: now.timestamp(),
        exp: (now + expires_in).timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(AuthError::Signing)
}

/// Checks signature, issuer and expiry (no leeway) and returns the user id.
pub fn validate_jwt(token: &str, secret: &str) -> Result<Uuid, AuthError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[TOKEN_ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.leeway = 0;

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Uuid::parse_str(&token_data.claims.sub).map_err(|_| AuthError::InvalidSubject)
}

// --- Refresh tokens ---

/// 256 random bits, URL-safe. Only [`hash_refresh_token`] of it is persisted.
pub fn make_refresh_token() -> String {
    let mut refresh_token_bytes = [0u8; 32];
    rand::rng().fill_bytes(&mut refresh_token_bytes);
    general_purpose::URL_SAFE_NO_PAD.encode(refresh_token_bytes)
}

pub fn hash_refresh_token(token: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    hex::encode(hasher.finalize())
}

// --- Authorization header ---

fn authorization_credential<'a>(headers: &'a HeaderMap, scheme: &str) -> Result<&'a str, AuthError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::MalformedAuthHeader)?;

    let (given_scheme, credential) = value
        .trim()
        .split_once(' ')
        .ok_or(AuthError::MalformedAuthHeader)?;

    let credential = credential.trim();
    if !given_scheme.eq_ignore_ascii_case(scheme)
        || credential.is_empty()
        || credential.contains(char::is_whitespace)
    {
        return Err(AuthError::MalformedAuthHeader);
    }

    Ok(credential)
}

/// `Authorization: Bearer <token>`
pub fn get_bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    authorization_credential(headers, "Bearer")
}

/// `Authorization: ApiKey <key>`
pub fn get_api_key(headers: &HeaderMap) -> Result<&str, AuthError> {
    authorization_credential(headers, "ApiKey")
}

pub fn api_key_matches(given: &str, expected: &str) -> bool {
    given.as_bytes().ct_eq(expected.as_bytes()).into()
}

// --- Middleware for JWT Authentication ---

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let token = get_bearer_token(request.headers())?;
    let user_id = validate_jwt(token, state.app_config.auth.jwt_secret.expose())?;

    // The token may outlive its user (e.g. after an admin reset).
    let user = sqlx::query_as::<_, User>(
        "SELECT id, created_at, updated_at, email, hashed_password, is_chirpy_red
         FROM users WHERE id = $1",
    )
    .bind(user_id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(AuthUser {
        id: user.id,
        email: user.email,
    });

    Ok(next.run(request).await)
}
