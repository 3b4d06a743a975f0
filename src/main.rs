use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use workshop_booking::config::AppConfig;
use workshop_booking::db;
use workshop_booking::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    let config = AppConfig::from_env();
    config.validate()?;

    if config.jwt_secret == workshop_booking::config::DEFAULT_JWT_SECRET {
        tracing::warn!("JWT_SECRET not set, using the development default");
    }

    let conn = db::init_db(&config.database_url)?;
    let addr = format!("0.0.0.0:{}", config.port);

    let state = Arc::new(AppState::new(conn, config));
    let app = workshop_booking::router(state);

    tracing::info!("starting server on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
