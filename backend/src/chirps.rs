use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use chirpy_common::{ChirpDto, CreateChirp, ValidateChirpRequest, ValidateChirpResponse};
use chrono::Utc;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use utoipa::IntoParams;
use uuid::Uuid;

use crate::error::AppError;
use crate::extractors::{AppJson, AuthUser};
use crate::web_server::AppState;

pub const MAX_CHIRP_LENGTH: usize = 140;

const CHIRP_COLUMNS: &str = "id, created_at, updated_at, body, user_id";

static PROFANITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(kerfuffle|sharbert|fornax)\b").expect("profanity pattern is valid")
});

/// Replaces banned words with `****`, leaving everything else untouched.
pub fn clean_body(body: &str) -> String {
    PROFANITY.replace_all(body, "****").into_owned()
}

/// Length check (in characters) followed by [`clean_body`].
pub fn validate_body(body: &str) -> Result<String, AppError> {
    if body.chars().count() > MAX_CHIRP_LENGTH {
        return Err(AppError::BadRequest("Chirp is too long".to_string()));
    }
    Ok(clean_body(body))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListChirpsQuery {
    /// Only return chirps written by this user.
    pub author_id: Option<String>,
    /// `asc` (default) or `desc` by creation time.
    pub sort: Option<String>,
}

impl ListChirpsQuery {
    fn author(&self) -> Result<Option<Uuid>, AppError> {
        match self.author_id.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Uuid::parse_str(raw)
                .map(Some)
                .map_err(|_| AppError::BadRequest("Invalid author ID".to_string())),
        }
    }

    fn descending(&self) -> bool {
        self.sort.as_deref() == Some("desc")
    }
}

fn parse_chirp_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::BadRequest("Invalid chirp ID".to_string()))
}

// --- API Handlers ---

#[utoipa::path(
    post,
    path = "/api/validate_chirp",
    tag = "chirps",
    request_body = ValidateChirpRequest,
    responses(
        (status = 200, description = "Chirp is acceptable", body = ValidateChirpResponse),
        (status = 400, description = "Chirp is too long")
    )
)]
pub async fn validate_chirp(
    AppJson(payload): AppJson<ValidateChirpRequest>,
) -> Result<Json<ValidateChirpResponse>, AppError> {
    let cleaned_body = validate_body(&payload.body)?;
    Ok(Json(ValidateChirpResponse { cleaned_body }))
}

#[utoipa::path(
    post,
    path = "/api/chirps",
    tag = "chirps",
    request_body = CreateChirp,
    security(("bearer_auth" = [])),
    responses(
        (status = 201, description = "Chirp created", body = ChirpDto),
        (status = 400, description = "Chirp is too long"),
        (status = 401, description = "Missing or invalid access token")
    )
)]
pub async fn create_chirp(
    State(state): State<AppState>,
    user: AuthUser,
    AppJson(payload): AppJson<CreateChirp>,
) -> Result<(StatusCode, Json<ChirpDto>), AppError> {
    let body = validate_body(&payload.body)?;

    tracing::info!("Creating chirp for user {}", user.id);
    let now = Utc::now();
    let chirp = sqlx::query_as::<_, ChirpDto>(&format!(
        "INSERT INTO chirps (id, created_at, updated_at, body, user_id)
         VALUES ($1, $2, $3, $4, $5)
         RETURNING {CHIRP_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(now)
    .bind(now)
    .bind(&body)
    .bind(user.id)
    .fetch_one(&state.db_pool)
    .await?;

    Ok((StatusCode::CREATED, Json(chirp)))
}

#[utoipa::path(
    get,
    path = "/api/chirps",
    tag = "chirps",
    params(ListChirpsQuery),
    responses(
        (status = 200, description = "Chirps ordered by creation time", body = [ChirpDto]),
        (status = 400, description = "Invalid author ID")
    )
)]
pub async fn list_chirps(
    State(state): State<AppState>,
    Query(params): Query<ListChirpsQuery>,
) -> Result<Json<Vec<ChirpDto>>, AppError> {
    let author = params.author()?;
    tracing::info!("Fetching chirps (author: {:?}, sort: {:?})", author, params.sort);

    let mut chirps = match author {
        Some(author_id) => {
            sqlx::query_as::<_, ChirpDto>(&format!(
                "SELECT {CHIRP_COLUMNS} FROM chirps WHERE user_id = $1"
            ))
            .bind(author_id)
            .fetch_all(&state.db_pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, ChirpDto>(&format!("SELECT {CHIRP_COLUMNS} FROM chirps"))
                .fetch_all(&state.db_pool)
                .await?
        }
    };

    // Ordered here rather than in SQL so both backends agree on timestamp order.
    if params.descending() {
        chirps.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    } else {
        chirps.sort_by(|a, b| a.created_at.cmp(&b.created_at));
    }

    Ok(Json(chirps))
}

async fn find_chirp(state: &AppState, chirp_id: Uuid) -> Result<ChirpDto, AppError> {
    sqlx::query_as::<_, ChirpDto>(&format!(
        "SELECT {CHIRP_COLUMNS} FROM chirps WHERE id = $1"
    ))
    .bind(chirp_id)
    .fetch_optional(&state.db_pool)
    .await?
    .ok_or(AppError::NotFound)
}

#[utoipa::path(
    get,
    path = "/api/chirps/{chirp_id}",
    tag = "chirps",
    params(("chirp_id" = Uuid, Path, description = "Chirp id")),
    responses(
        (status = 200, description = "The chirp", body = ChirpDto),
        (status = 400, description = "Invalid chirp ID"),
        (status = 404, description = "No such chirp")
    )
)]
pub async fn get_chirp(
    State(state): State<AppState>,
    Path(chirp_id): Path<String>,
) -> Result<Json<ChirpDto>, AppError> {
    let chirp_id = parse_chirp_id(&chirp_id)?;
    tracing::info!("Fetching single chirp with id: {}", chirp_id);

    Ok(Json(find_chirp(&state, chirp_id).await?))
}

/// Only the author may delete a chirp.
#[utoipa::path(
    delete,
    path = "/api/chirps/{chirp_id}",
    tag = "chirps",
    params(("chirp_id" = Uuid, Path, description = "Chirp id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 204, description = "Chirp deleted"),
        (status = 401, description = "Missing or invalid access token"),
        (status = 403, description = "Caller is not the author"),
        (status = 404, description = "No such chirp")
    )
)]
pub async fn delete_chirp(
    State(state): State<AppState>,
    user: AuthUser,
    Path(chirp_id): Path<String>,
) -> Result<StatusCode, AppError> {
    let chirp_id = parse_chirp_id(&chirp_id)?;
    let chirp = find_chirp(&state, chirp_id).await?;

    if chirp.user_id != user.id {
        tracing::warn!(
            "User {} tried to delete chirp {} owned by {}",
            user.id,
            chirp.id,
            chirp.user_id
        );
        return Err(AppError::Forbidden);
    }

    // Scoped to the author again so a concurrent ownership change cannot slip through.
    let result = sqlx::query("DELETE FROM chirps WHERE id = $1 AND user_id = $2")
        .bind(chirp_id)
        .bind(user.id)
        .execute(&state.db_pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(AppError::NotFound);
    }

    tracing::info!("Deleted chirp {}", chirp_id);
    Ok(StatusCode::NO_CONTENT)
}
