use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
};
use chirpy_common::{WebhookEvent, USER_UPGRADED_EVENT};
use chrono::Utc;

use crate::auth;
use crate::error::AppError;
use crate::extractors::AppJson;
use crate::web_server::AppState;

/// ## Payment provider callback
/// Upgrades a user to Chirpy Red. Other events are acknowledged and ignored.
#[utoipa::path(
    post,
    path = "/api/polka/webhooks",
    tag = "webhooks",
    request_body = WebhookEvent,
    responses(
        (status = 204, description = "Event processed or ignored"),
        (status = 400, description = "Upgrade event without user data"),
        (status = 401, description = "Missing or wrong API key"),
        (status = 404, description = "No such user")
    )
)]
pub async fn polka_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    payload: Result<AppJson<WebhookEvent>, AppError>,
) -> Result<StatusCode, AppError> {
    let api_key = auth::get_api_key(&headers)?;
    if !auth::api_key_matches(api_key, state.app_config.webhooks.polka_key.expose()) {
        tracing::warn!("Webhook called with an invalid API key");
        return Err(AppError::Unauthorized);
    }
    let AppJson(payload) = payload?;

    if payload.event != USER_UPGRADED_EVENT {
        tracing::debug!("Ignoring webhook event {:?}", payload.event);
        return Ok(StatusCode::NO_CONTENT);
    }

    let data = payload
        .data
        .ok_or_else(|| AppError::BadRequest("Missing event data".to_string()))?;

    let result = sqlx::query("UPDATE users SET is_chirpy_red = TRUE, updated_at = $1 WHERE id = $2")
        .bind(Utc::now())
        .bind(data.user_id)
        .execute(&state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!("Upgraded user {} to Chirpy Red", data.user_id);
    Ok(StatusCode::NO_CONTENT)
}
