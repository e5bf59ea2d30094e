use std::sync::atomic::Ordering;

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{Html, IntoResponse, Response},
};

use crate::config::Platform;
use crate::error::AppError;
use crate::web_server::AppState;

#[utoipa::path(
    get,
    path = "/api/healthz",
    tag = "admin",
    responses((status = 200, description = "Service is up", body = String, content_type = "text/plain"))
)]
pub async fn healthz() -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        "OK",
    )
}

/// Counts every request that reaches the static file server.
pub async fn count_hits(State(state): State<AppState>, request: Request, next: Next) -> Response {
    state.hits.fetch_add(1, Ordering::Relaxed);
    next.run(request).await
}

pub async fn metrics(State(state): State<AppState>) -> Html<String> {
    let hits = state.hits.load(Ordering::Relaxed);
    Html(format!(
        "<html>
  <body>
    <h1>Welcome, Chirpy Admin</h1>
    <p>Chirpy has been visited {hits} times!</p>
  </body>
</html>"
    ))
}

/// Wipes all users (their chirps and refresh tokens cascade) and the hit
/// counter. Refused outside the dev platform.
pub async fn reset(State(state): State<AppState>) -> Result<StatusCode, AppError> {
    if state.app_config.platform != Platform::Dev {
        tracing::warn!("Refusing reset on platform {:?}", state.app_config.platform);
        return Err(AppError::Forbidden);
    }

    let mut tx = state.db_pool.begin().await?;
    sqlx::query("DELETE FROM chirps").execute(&mut *tx).await?;
    sqlx::query("DELETE FROM refresh_tokens").execute(&mut *tx).await?;
    let deleted = sqlx::query("DELETE FROM users").execute(&mut *tx).await?;
    tx.commit().await?;

    state.hits.store(0, Ordering::Relaxed);
    tracing::info!("Reset: removed {} users", deleted.rows_affected());

    Ok(StatusCode::OK)
}
