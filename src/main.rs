use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

use lms_api::{app, config, is_production, state::AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present so cargo run picks up DATABASE_URL, LDAP_URL, etc.
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // Initialize configuration (this loads the config singleton)
    let config = config::config().clone();
    tracing::info!("Starting LMS API in {:?} mode", config.environment);

    if config.security.jwt_secret.trim().is_empty() {
        bail!("SECURITY_JWT_SECRET must be set outside development");
    }
    if is_production!() && config.ldap.url.is_none() {
        tracing::warn!("LDAP_URL not set, only local passwords will be accepted");
    }

    let port = config.api.port;
    let state = AppState::from_config(config).await.context("failed to initialize the user store")?;
    state
        .uploads
        .ensure_dirs()
        .await
        .with_context(|| format!("failed to create uploads directory {}", state.uploads.root().display()))?;

    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", bind_addr))?;

    tracing::info!("LMS API listening on http://{}", bind_addr);
    axum::serve(listener, app(state)).await?;
    Ok(())
}
