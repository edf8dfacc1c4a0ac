mod activities;
mod analytics;
mod auth;
mod config;
mod cosmos;
mod db;
mod errors;
mod fitness;
mod goals;
mod habits;
mod journal;
mod llm_client;
mod models;
mod pagination;
mod routes;
mod state;
mod tasks;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::analytics::summary::create_summarizer;
use crate::auth::create_verifier;
use crate::config::Config;
use crate::db::{connect_store, report_key_vault};
use crate::journal::sentiment::create_analyzer;
use crate::routes::{build_router, cors_layer};
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first; missing services select their mock implementations
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting LifeTracker API v{} ({})",
        env!("CARGO_PKG_VERSION"),
        config.node_env
    );
    report_key_vault(&config.key_vault);

    // Document store (Cosmos DB or the in-memory mock)
    let cosmos = connect_store(&config.cosmos).await;

    let verifier = create_verifier(&config.auth);
    let sentiment = create_analyzer(config.text_analytics.as_ref());
    let summarizer = create_summarizer(&config.openai);
    info!(
        "Auth: {}, sentiment: {}, summaries: {}",
        verifier.mode(),
        sentiment.backend(),
        summarizer.provider()
    );

    let state = AppState {
        config: config.clone(),
        cosmos,
        verifier,
        sentiment,
        summarizer,
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer(&config.cors_origins));

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
