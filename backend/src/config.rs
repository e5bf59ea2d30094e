use std::fmt;

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::Deserialize;

use dotenvy::dotenv;

/// A string that must never show up in logs.
#[derive(Deserialize, Clone, PartialEq, Eq)]
#[serde(transparent)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for SecretString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("\"<redacted>\"")
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebConfig {
    pub addr: String,
    pub port: u16,
    pub cors_origin: String,
    /// Directory served under `/app/`.
    #[serde(default = "default_static_dir")]
    pub static_dir: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    pub jwt_secret: SecretString,
    #[serde(default = "default_access_token_minutes")]
    pub access_token_expires_minutes: i64,
    #[serde(default = "default_refresh_token_days")]
    pub refresh_token_expires_days: i64,
    #[serde(default = "default_password_hash_cost")]
    pub password_hash_cost: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    pub polka_key: SecretString,
}

/// Deployment flavour. Destructive admin endpoints only work in `dev`.
#[derive(Debug, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Dev,
    #[default]
    #[serde(alias = "prod")]
    Production,
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub web: WebConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub webhooks: WebhookConfig,
    #[serde(default)]
    pub platform: Platform,
}

fn default_max_connections() -> u32 {
    5
}

fn default_static_dir() -> String {
    "static".to_string()
}

fn default_access_token_minutes() -> i64 {
    60
}

fn default_refresh_token_days() -> i64 {
    60
}

fn default_password_hash_cost() -> u32 {
    bcrypt::DEFAULT_COST
}

impl AppConfig {
    /// `Config.toml` for non-sensitive defaults, overridden by `APP_`
    /// variables, e.g. `APP_DATABASE__URL` or `APP_AUTH__JWT_SECRET`.
    pub fn figment() -> Figment {
        Figment::new()
            .merge(Toml::file("Config.toml"))
            .merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_env() -> Result<Self, figment::Error> {
        dotenv().ok();

        let config: Self = Self::figment().extract()?;

        tracing::info!("Configuration loaded successfully, full config: {:?}", config);

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn env_overrides_toml_and_defaults_apply() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "Config.toml",
                r#"
                platform = "dev"

                [web]
                addr = "0.0.0.0"
                port = 8080
                cors_origin = "http://localhost:5173"

                [database]
                url = "sqlite://chirpy.db?mode=rwc"

                [auth]
                jwt_secret = "from-file"

                [webhooks]
                polka_key = "f271c81ff7084ee5b99a5091b42d486e"
                "#,
            )?;
            jail.set_env("APP_AUTH__JWT_SECRET", "from-env");
            jail.set_env("APP_WEB__PORT", "9999");

            let config: AppConfig = AppConfig::figment().extract()?;
            assert_eq!(config.auth.jwt_secret.expose(), "from-env");
            assert_eq!(config.web.port, 9999);
            assert_eq!(config.web.static_dir, "static");
            assert_eq!(config.auth.access_token_expires_minutes, 60);
            assert_eq!(config.auth.refresh_token_expires_days, 60);
            assert_eq!(config.database.max_connections, 5);
            assert_eq!(config.platform, Platform::Dev);
            Ok(())
        });
    }

    #[test]
    fn missing_secret_is_an_error() {
        Jail::expect_with(|jail| {
            jail.clear_env();
            jail.create_file(
                "Config.toml",
                r#"
                [web]
                addr = "127.0.0.1"
                port = 8080
                cors_origin = "http://localhost:5173"

                [database]
                url = "sqlite::memory:"

                [webhooks]
                polka_key = "key"
                "#,
            )?;

            assert!(AppConfig::figment().extract::<AppConfig>().is_err());
            Ok(())
        });
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let secret = SecretString::new("super-secret");
        assert_eq!(format!("{secret:?}"), "\"<redacted>\"");
        assert_eq!(secret.expose(), "super-secret");
    }
}
