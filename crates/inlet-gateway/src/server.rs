// SPDX-FileCopyrightText: 2026 Inlet Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state.

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;

use inlet_core::InletError;

use crate::handlers;
use crate::GatewayState;

/// Gateway server configuration (mirrors the `server` section of the
/// Inlet config).
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host address to bind.
    pub host: String,
    /// Port to bind.
    pub port: u16,
}

/// Build the gateway router over the shared state.
pub fn build_router(state: GatewayState) -> Router {
    Router::new()
        .route("/health", get(handlers::get_health))
        .route(
            "/webhooks/{tenant}/{channel}",
            get(handlers::verify_subscription).post(handlers::receive_webhook),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the gateway HTTP server. Runs until the listener fails.
pub async fn start_server(config: &ServerConfig, state: GatewayState) -> Result<(), InletError> {
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| InletError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .await
        .map_err(|e| InletError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
