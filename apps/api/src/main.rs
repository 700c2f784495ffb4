mod config;
mod errors;
mod gateway;
mod interview;
mod routes;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::gateway::GeminiGateway;
use crate::interview::pipeline::InterviewPipeline;
use crate::interview::store::{run_sweeper, SessionStore};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on unparsable env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Interviewer API v{}", env!("CARGO_PKG_VERSION"));

    if config.gemini_api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; every analysis request will fail until it is configured");
    }

    // Initialize AI gateway
    let gateway = GeminiGateway::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
        config.gateway_timeout,
    )?;
    info!(
        "AI gateway initialized (model: {}, timeout: {}s)",
        gateway.model(),
        config.gateway_timeout.as_secs()
    );

    // Initialize session store and its expiry sweeper
    let store = Arc::new(SessionStore::new(config.session_ttl));
    match config.session_ttl {
        Some(ttl) => {
            info!(
                "Session TTL {}s, sweeping every {}s",
                ttl.as_secs(),
                config.session_sweep_interval.as_secs()
            );
            tokio::spawn(run_sweeper(
                Arc::clone(&store),
                config.session_sweep_interval,
            ));
        }
        None => info!("Session expiry disabled"),
    }

    if let Some(dir) = &config.upload_dir {
        info!("Archiving intro uploads under {}", dir.display());
    }

    let pipeline = InterviewPipeline::new(
        store,
        Arc::new(gateway),
        config.thresholds,
        config.gateway_timeout,
    )
    .with_upload_dir(config.upload_dir.clone());

    // Build app state
    let state = AppState {
        pipeline,
        config: config.clone(),
    };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
