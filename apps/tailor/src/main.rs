mod config;
mod errors;
mod layout;
mod llm_client;
mod optimizer;
mod render;
mod routes;
mod state;
mod storage;
mod tailoring;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::render::LatexRenderer;
use crate::routes::build_router;
use crate::state::AppState;
use crate::storage::ResumeStore;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting resume tailor v{}", env!("CARGO_PKG_VERSION"));

    // Working document, background context and compiled artifacts
    let store = ResumeStore::open(&config.data_dir).await?;

    // Initialize LLM client
    let llm = LlmClient::new(config.llm.clone())?;
    info!("LLM client initialized (model: {})", llm.model());

    // Initialize renderer; durable artifacts land next to the stored sources
    let renderer = LatexRenderer::new(
        config.latex_bin.clone(),
        Duration::from_secs(config.latex_timeout_secs),
        store.compiled_dir(),
        config.analyzer,
    );
    info!(
        "Renderer: {} (timeout {}s), fill band {:.2}-{:.2}, max {} corrections",
        config.latex_bin,
        config.latex_timeout_secs,
        config.optimizer.min_fill,
        config.optimizer.max_fill,
        config.optimizer.max_attempts
    );

    // Build app state
    let state = AppState {
        config: config.clone(),
        llm: Arc::new(llm),
        renderer: Arc::new(renderer),
        store,
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
