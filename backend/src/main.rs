use anyhow::Context;
use chirpy_backend::{
    config::AppConfig,
    db,
    web_server::{run_server, AppState},
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(tracing_subscriber::filter::LevelFilter::INFO)
        .init();

    let app_config = AppConfig::from_env()
        .map_err(|e| anyhow::anyhow!("failed to load configuration: {e}"))?;

    let db_pool = db::connect(&app_config.database)
        .await
        .context("failed to connect to the database")?;
    db::migrate(&db_pool)
        .await
        .context("failed to run database migrations")?;

    tracing::info!("Initializing server on platform {:?}...", app_config.platform);
    run_server(AppState::new(db_pool, app_config))
        .await
        .context("server terminated with an error")?;

    Ok(())
}
