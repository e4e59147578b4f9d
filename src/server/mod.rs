//! HTTP surface: `POST /chat`, `POST /execute`, `GET /health`.

use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::agent_core::ChatService;
use crate::config::ServerConfig;

pub mod chat;
pub mod error;

pub use error::ApiError;

pub(crate) struct ServerState {
    pub(crate) chat: ChatService,
}

/// Build the router around a chat service.
pub fn router(chat: ChatService) -> Router {
    let state = Arc::new(ServerState { chat });
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health))
        .route("/chat", post(chat::plan))
        .route("/execute", post(chat::execute))
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Bind and serve until Ctrl-C.
pub async fn serve(config: &ServerConfig, chat: ChatService) -> anyhow::Result<()> {
    let address = config.bind_address();
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    tracing::info!(address = %listener.local_addr()?, "HTTP server listening");

    axum::serve(listener, router(chat))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    tracing::info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("shutdown requested"),
        Err(e) => {
            tracing::warn!(error = %e, "cannot listen for Ctrl-C; running until killed");
            std::future::pending::<()>().await;
        }
    }
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "healthy" }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    use crate::agent_core::test_support::{FakeConnector, ScriptedProvider};
    use crate::agent_core::SessionSettings;

    fn app() -> Router {
        router(ChatService::new(
            Arc::new(ScriptedProvider::default()),
            Arc::new(FakeConnector::default()),
            SessionSettings {
                system_instruction: "be helpful".into(),
                temperature: 0.3,
            },
        ))
    }

    #[tokio::test]
    async fn test_health() {
        let response = app()
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let value: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value, json!({"status": "healthy"}));
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let response = app()
            .oneshot(Request::get("/nope").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
