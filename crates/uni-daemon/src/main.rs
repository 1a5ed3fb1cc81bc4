//! uni-daemon entry point.
//!
//! This file is intentionally thin: it sets up tracing, connects the store,
//! wires the outbound adapters, starts the retention loops and serves the
//! router. All route handlers live in `routes.rs`; shared state in
//! `state.rs`.

use std::sync::Arc;

use anyhow::Context;
use axum::http::{HeaderValue, Method};
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::{info, Level};
use uni_daemon::{config::Config, routes, state::AppState};
use uni_lifecycle::{Directory, LifecycleEngine, Notifier};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env.local if present (dev convenience). Silent if the file does
    // not exist; production injects env vars directly.
    let _ = dotenvy::from_filename(".env.local");

    init_tracing();

    let config = Config::from_env();

    let pool = uni_db::connect_from_env().await?;
    uni_db::migrate(&pool).await?;
    let store = Arc::new(uni_db::PgStore::new(pool));

    let notifier: Arc<dyn Notifier> = match &config.mail_relay_url {
        Some(url) => Arc::new(uni_notify::MailRelayNotifier::new(url.clone())),
        None => {
            info!("no mail relay configured; notifications go to the log");
            Arc::new(uni_notify::LogNotifier)
        }
    };
    let directory: Arc<dyn Directory> = match &config.directory_url {
        Some(url) => Arc::new(uni_notify::HttpDirectory::new(url.clone())),
        None => {
            info!("no member directory configured; lookups resolve to none");
            Arc::new(uni_notify::EmptyDirectory)
        }
    };

    let engine = LifecycleEngine::new(Arc::clone(&store), notifier, directory);

    let retention = uni_retention::spawn_retention(
        Arc::clone(&store),
        uni_retention::RetentionConfig::default(),
    );

    let shared = Arc::new(AppState::new(engine));
    let app = routes::build_router(shared)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors_localhost_only());

    info!("uni-daemon listening on http://{}", config.addr);

    axum::serve(tokio::net::TcpListener::bind(config.addr).await?, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server crashed")?;

    for handle in retention {
        handle.abort();
    }
    info!("uni-daemon stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "ctrl-c listener failed; running until killed");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()),
        )
        .init();
}

/// CORS: allow only localhost origins.
fn cors_localhost_only() -> CorsLayer {
    let allowed_origins = [
        "http://localhost",
        "http://127.0.0.1",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
        "http://localhost:5173",
        "http://127.0.0.1:5173",
    ];

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|o| HeaderValue::from_str(o).ok())
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
}
