//! Auth Gate Demo
//!
//! Small axum service wired through the auth client: every route except
//! `/health` sits behind `require_permission`.

use anyhow::Context;
use auth_client::middleware::{require_permission, IdentityExt};
use auth_client::{AuthClient, ClientConfig, ClientOptions};
use axum::{
    extract::Request,
    middleware,
    routing::get,
    Json, Router,
};
use common::config::ObservabilityConfig;
use common::observability::init_tracing;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::signal;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const DEFAULT_BIND_ADDRESS: &str = "0.0.0.0:8080";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing(&ObservabilityConfig::from_env()).context("failed to initialise tracing")?;

    info!("Starting auth gate demo");

    let config = ClientConfig::from_env().map_err(|e| {
        error!("Failed to load configuration: {}", e);
        e
    })?;
    info!(?config, "Configuration loaded successfully");

    let client = AuthClient::connect_with_redis(config, ClientOptions::default())
        .await
        .map_err(|e| {
            error!("Auth client bootstrap failed: {}", e);
            e
        })?;

    let protected = Router::new()
        .route("/me", get(whoami))
        .route("/orders/:id", get(whoami))
        .layer(middleware::from_fn_with_state(client.gate(), require_permission));

    let app = Router::new()
        .route("/health", get(|| async { "OK" }))
        .merge(protected)
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(TraceLayer::new_for_http());

    let bind_address =
        std::env::var("BIND_ADDRESS").unwrap_or_else(|_| DEFAULT_BIND_ADDRESS.to_string());
    let addr: SocketAddr = bind_address
        .parse()
        .with_context(|| format!("invalid bind address {bind_address}"))?;

    info!("Auth gate demo listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    client.shutdown().await;
    info!("Auth gate demo shutdown complete");

    Ok(())
}

async fn whoami(req: Request) -> Json<Value> {
    Json(json!({
        "path": req.uri().path(),
        "userId": req.user_id(),
        "clientId": req.client_id(),
    }))
}

/// Listens for shutdown signals (SIGTERM, SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => info!("Received SIGINT, starting graceful shutdown..."),
            Err(e) => error!("Failed to listen for SIGINT: {}", e),
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
                info!("Received SIGTERM, starting graceful shutdown...");
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
