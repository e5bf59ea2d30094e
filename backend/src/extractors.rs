use crate::{error::AppError, web_server::AppState};
use axum::{
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
};
use uuid::Uuid;

/// The caller of a JWT-protected route, as resolved by `auth_middleware`.
#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: Uuid,
    pub email: String,
}

impl FromRequestParts<AppState> for AuthUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match parts.extensions.get::<AuthUser>() {
            Some(user) => Ok(user.clone()),
            None => {
                // Only present when the route sits behind the auth middleware.
                tracing::error!(uri = %parts.uri, "AuthUser requested on an unprotected route");
                Err(AppError::InternalServerError(
                    "Authenticated user unavailable".into(),
                ))
            }
        }
    }
}

/// `Json` body whose rejections render as `AppError`, so malformed payloads
/// get a 400 with the usual `{"error": ...}` body.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct AppJson<T>(pub T);
