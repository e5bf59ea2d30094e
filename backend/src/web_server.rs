use std::{
    net::SocketAddr,
    sync::{atomic::AtomicU64, Arc},
};

use axum::{
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::CorsLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    services::ServeDir,
    trace::TraceLayer,
};
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::{admin, auth, chirps, users, webhooks};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub app_config: AppConfig,
    /// Requests served under `/app/`.
    pub hits: Arc<AtomicU64>,
}

impl AppState {
    pub fn new(db_pool: DbPool, app_config: AppConfig) -> Self {
        Self {
            db_pool,
            app_config,
            hits: Arc::new(AtomicU64::new(0)),
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        admin::healthz,
        users::create_user,
        users::update_user,
        users::login,
        users::refresh,
        users::revoke,
        chirps::validate_chirp,
        chirps::create_chirp,
        chirps::list_chirps,
        chirps::get_chirp,
        chirps::delete_chirp,
        webhooks::polka_webhook,
    ),
    components(schemas(
        chirpy_common::Credentials,
        chirpy_common::UserDto,
        chirpy_common::LoginResponse,
        chirpy_common::TokenResponse,
        chirpy_common::ChirpDto,
        chirpy_common::CreateChirp,
        chirpy_common::ValidateChirpRequest,
        chirpy_common::ValidateChirpResponse,
        chirpy_common::WebhookEvent,
        chirpy_common::WebhookData,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and session tokens"),
        (name = "users", description = "Accounts"),
        (name = "chirps", description = "Short messages"),
        (name = "webhooks", description = "Payment provider callbacks"),
        (name = "admin", description = "Operational endpoints"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub async fn run_server(app_state: AppState) -> std::io::Result<()> {
    let web = &app_state.app_config.web;
    let addr: SocketAddr = format!("{}:{}", web.addr, web.port)
        .parse()
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

    let app = create_router(app_state);
    tracing::info!("Serving API at http://{}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    match config.web.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => CorsLayer::new()
            .allow_origin(origin)
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
            .allow_headers([AUTHORIZATION, CONTENT_TYPE]),
        Err(e) => {
            tracing::warn!(
                "Ignoring invalid CORS origin {:?}: {}",
                config.web.cors_origin,
                e
            );
            CorsLayer::new()
        }
    }
}

pub fn create_router(app_state: AppState) -> Router {
    let require_auth = middleware::from_fn_with_state(app_state.clone(), auth::auth_middleware);

    let public_routes = Router::new()
        .route("/healthz", get(admin::healthz))
        .route("/users", post(users::create_user))
        .route("/login", post(users::login))
        .route("/refresh", post(users::refresh))
        .route("/revoke", post(users::revoke))
        .route("/validate_chirp", post(chirps::validate_chirp))
        .route("/chirps", get(chirps::list_chirps))
        .route("/chirps/{chirp_id}", get(chirps::get_chirp))
        .route("/polka/webhooks", post(webhooks::polka_webhook));

    let protected_routes = Router::new()
        .route("/users", put(users::update_user))
        .route("/chirps", post(chirps::create_chirp))
        .route("/chirps/{chirp_id}", delete(chirps::delete_chirp))
        .route_layer(require_auth);

    let admin_routes = Router::new()
        .route("/metrics", get(admin::metrics))
        .route("/reset", post(admin::reset));

    let static_routes = Router::new()
        .nest_service("/app", ServeDir::new(&app_state.app_config.web.static_dir))
        .layer(middleware::from_fn_with_state(
            app_state.clone(),
            admin::count_hits,
        ));

    let cors = cors_layer(&app_state.app_config);

    Router::new()
        .nest("/api", public_routes.merge(protected_routes))
        .nest("/admin", admin_routes)
        .merge(static_routes)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(app_state)
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
