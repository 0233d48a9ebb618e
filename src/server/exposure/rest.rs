//! REST exposure: the axum adapter over the dispatcher
//!
//! Routing lives in the dispatcher, derived from the schema, so the axum
//! router is a single fallback handler plus a health probe. Swapping the
//! transport means replacing this module, nothing else.

use crate::server::dispatcher::{ApiRequest, Dispatcher};
use anyhow::Result;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, Method, Uri, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// REST exposure implementation
pub struct RestExposure;

impl RestExposure {
    /// Build the axum router for a dispatcher.
    pub fn build_router(dispatcher: Arc<Dispatcher>) -> Router {
        Router::new()
            .route("/health", get(health_check))
            .fallback(dispatch_request)
            .layer(
                ServiceBuilder::new()
                    .layer(TraceLayer::new_for_http())
                    .layer(CorsLayer::permissive()),
            )
            .with_state(dispatcher)
    }

    /// Serve the dispatcher over HTTP with graceful shutdown on SIGTERM and
    /// Ctrl+C.
    pub async fn serve(dispatcher: Arc<Dispatcher>, addr: &str) -> Result<()> {
        let app = Self::build_router(dispatcher);
        let listener = TcpListener::bind(addr).await?;

        tracing::info!("Server listening on {}", addr);

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        tracing::info!("Server shutdown complete");
        Ok(())
    }
}

/// Health check endpoint handler
async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "service": env!("CARGO_PKG_NAME"),
    }))
}

/// Feed any other request through the dispatcher.
async fn dispatch_request(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ApiRequest {
        method,
        path: uri.path().to_string(),
        headers,
        body,
    };
    let response = dispatcher.handle(request).await;

    let Some(body) = response.body else {
        return response.status.into_response();
    };

    if dispatcher.config().pretty_print_json {
        let rendered = serde_json::to_string_pretty(&body).unwrap_or_else(|_| body.to_string());
        (
            response.status,
            [(header::CONTENT_TYPE, "application/json")],
            rendered,
        )
            .into_response()
    } else {
        (response.status, Json(body)).into_response()
    }
}

/// Wait for shutdown signal (SIGTERM or Ctrl+C)
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM signal, initiating graceful shutdown...");
        },
    }
}
