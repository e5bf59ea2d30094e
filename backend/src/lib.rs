// Library half of the backend: the binary in `main.rs` and the integration
// tests both build the server through these modules.
pub mod admin;
pub mod auth;
pub mod chirps;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod users;
pub mod web_server;
pub mod webhooks;
