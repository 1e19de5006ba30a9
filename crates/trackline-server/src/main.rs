use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use axum::http::HeaderValue;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use trackline_client::{TracklineConfig, build_tracker};
use trackline_server::routes;
use trackline_server::state::{AppState, DEFAULT_BATCH_CONCURRENCY};

const MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_PORT: u16 = 8000;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("trackline=info".parse()?))
        .with_target(false)
        .init();

    let port = parse_port(std::env::var("TRACKLINE_SERVER_PORT").ok())?;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    let batch_concurrency = match std::env::var("TRACKLINE_BATCH_CONCURRENCY") {
        Err(_) => DEFAULT_BATCH_CONCURRENCY,
        Ok(raw) => raw
            .parse::<usize>()
            .ok()
            .filter(|n| *n > 0)
            .with_context(|| {
                format!("Invalid TRACKLINE_BATCH_CONCURRENCY '{raw}': must be a positive integer")
            })?,
    };

    let config = TracklineConfig::from_env().context("Failed to load configuration")?;
    if !config.fast_path_configured() {
        tracing::warn!("Cargoes Flow credentials missing, every lookup will use the browser tier");
    }
    let tracker = build_tracker(&config).context("Failed to build tracking pipeline")?;

    let state = Arc::new(AppState::new(tracker).with_batch_concurrency(batch_concurrency));

    let cors = match std::env::var("TRACKLINE_CORS_ORIGIN") {
        Ok(origin) => CorsLayer::new()
            .allow_origin(
                origin
                    .parse::<HeaderValue>()
                    .with_context(|| format!("Invalid TRACKLINE_CORS_ORIGIN '{origin}'"))?,
            )
            .allow_methods(Any)
            .allow_headers(Any),
        Err(_) => CorsLayer::permissive(),
    };

    let app = routes::router(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(cors);

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Listening port from `TRACKLINE_SERVER_PORT`, defaulting when unset.
fn parse_port(raw: Option<String>) -> anyhow::Result<u16> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_PORT);
    };
    raw.trim()
        .parse::<u16>()
        .ok()
        .filter(|port| *port > 0)
        .with_context(|| {
            format!("Invalid TRACKLINE_SERVER_PORT '{raw}': must be a port between 1 and 65535")
        })
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("Failed to install CTRL+C handler");
    tracing::info!("Shutdown signal received");
}
