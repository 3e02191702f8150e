use anyhow::Context;
use photoshoot_studio::{
    config::Config,
    gemini::GeminiClient,
    routes::{build_router, AppState},
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = Config::from_env().context("loading configuration")?;
    tracing::info!(
        analysis_model = %config.analysis_model,
        image_model = %config.image_model,
        "Using Gemini API at {}",
        config.api_base
    );

    let gemini = Arc::new(
        GeminiClient::new(config.api_key.clone(), config.api_base.clone()).context("building Gemini client")?,
    );
    let state = AppState::new(gemini, &config);
    let shutdown = state.shutdown.clone();
    let app = build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await.with_context(|| format!("binding {}", addr))?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
            tracing::info!("Shutdown signal received, cancelling running shoots");
            shutdown.cancel();
        })
        .await
        .context("server error")?;
    Ok(())
}
