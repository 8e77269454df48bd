use anyhow::Context;

use habitstreak_api::{config::Config, router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "habitstreak_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Config::from_env()?;
    tracing::info!(backend = ?config.storage, "Configuration loaded");

    let state = AppState::from_config(config).context("Failed to initialize backend clients")?;
    let addr = state.config.listen_addr();
    let app = router(state);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
