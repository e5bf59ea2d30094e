// backend/tests/helpers.rs
#![allow(dead_code)]

use chirpy_backend::{
    config::{
        AppConfig, AuthConfig, DatabaseConfig, Platform, SecretString, WebConfig, WebhookConfig,
    },
    web_server::{create_router, AppState},
};
use chirpy_common::{Credentials, LoginResponse, UserDto};
use once_cell::sync::Lazy;
use reqwest::StatusCode;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::net::{Ipv4Addr, SocketAddr};
use std::str::FromStr;
use tokio::net::TcpListener;

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_POLKA_KEY: &str = "f271c81ff7084ee5b99a5091b42d486e";
pub const TEST_PASSWORD: &str = "password123";

static TRACING: Lazy<()> = Lazy::new(|| {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .init();
});

pub fn init_tracing() {
    Lazy::force(&TRACING);
}

pub fn test_config(platform: Platform) -> AppConfig {
    AppConfig {
        web: WebConfig {
            addr: "127.0.0.1".to_string(),
            port: 0,
            cors_origin: "http://localhost:5173".to_string(),
            static_dir: concat!(env!("CARGO_MANIFEST_DIR"), "/../static").to_string(),
        },
        database: DatabaseConfig {
            url: "sqlite::memory:".to_string(),
            max_connections: 1,
        },
        auth: AuthConfig {
            jwt_secret: SecretString::new(TEST_JWT_SECRET),
            access_token_expires_minutes: 60,
            refresh_token_expires_days: 60,
            // Fastest cost bcrypt accepts; keeps the suite quick.
            password_hash_cost: 4,
        },
        webhooks: WebhookConfig {
            polka_key: SecretString::new(TEST_POLKA_KEY),
        },
        platform,
    }
}

/// A fresh, migrated in-memory database. One connection, kept forever, since
/// every SQLite in-memory connection is its own database.
pub async fn test_pool() -> SqlitePool {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);

    let db_pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await
        .expect("Failed to create in-memory database pool.");

    chirpy_backend::db::migrate(&db_pool)
        .await
        .expect("Failed to run migrations on test database.");

    db_pool
}

/// State plus router for `oneshot`-style tests.
pub async fn test_app(platform: Platform) -> (axum::Router, AppState) {
    init_tracing();
    let app_state = AppState::new(test_pool().await, test_config(platform));
    (create_router(app_state.clone()), app_state)
}

/// Spawn a test server and return the address, a reqwest client and the pool.
pub async fn spawn_app() -> (SocketAddr, reqwest::Client, SqlitePool) {
    spawn_app_on(Platform::Dev).await
}

pub async fn spawn_app_on(platform: Platform) -> (SocketAddr, reqwest::Client, SqlitePool) {
    init_tracing();

    let listener = TcpListener::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
    let addr = listener.local_addr().unwrap();

    let db_pool = test_pool().await;
    let app_state = AppState::new(db_pool.clone(), test_config(platform));
    let app = create_router(app_state);

    tokio::spawn(async move {
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    let client = reqwest::Client::builder()
        .redirect(reqwest::redirect::Policy::none())
        .build()
        .unwrap();

    (addr, client, db_pool)
}

pub fn credentials(email: &str) -> Credentials {
    Credentials {
        email: email.to_string(),
        password: TEST_PASSWORD.to_string(),
    }
}

pub async fn register(addr: &SocketAddr, client: &reqwest::Client, email: &str) -> UserDto {
    let response = client
        .post(format!("http://{addr}/api/users"))
        .json(&credentials(email))
        .send()
        .await
        .expect("Failed to register user");
    assert_eq!(response.status(), StatusCode::CREATED, "Registration failed");

    response.json().await.expect("Failed to parse created user")
}

pub async fn login(addr: &SocketAddr, client: &reqwest::Client, email: &str) -> LoginResponse {
    let response = client
        .post(format!("http://{addr}/api/login"))
        .json(&credentials(email))
        .send()
        .await
        .expect("Failed to login user");
    assert_eq!(
        response.status(),
        StatusCode::OK,
        "Login request did not return 200 OK"
    );

    response.json().await.expect("Failed to parse login response")
}

/// Registers `email` and logs in, returning the full login response.
pub async fn register_and_login(
    addr: &SocketAddr,
    client: &reqwest::Client,
    email: &str,
) -> LoginResponse {
    register(addr, client, email).await;
    login(addr, client, email).await
}
