//! Router, listener and graceful shutdown

use std::future::Future;
use std::sync::Arc;

use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::IntoResponse;
use axum::routing::get;
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::info;

use dispatcher::ClientRegistry;

use crate::commands::CommandHandler;
use crate::connection::client_connection;
use crate::error::{GatewayError, Result};

/// State shared by every handler
#[derive(Clone)]
pub struct AppState {
    pub(crate) registry: Arc<ClientRegistry>,
    pub(crate) commands: Arc<CommandHandler>,
    pub(crate) queue_capacity: usize,
}

impl AppState {
    pub fn new(
        registry: Arc<ClientRegistry>,
        commands: Arc<CommandHandler>,
        queue_capacity: usize,
    ) -> Self {
        Self {
            registry,
            commands,
            queue_capacity,
        }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }
}

/// WebSocket route at `ws_path` plus `GET /health`
pub fn create_router(state: AppState, ws_path: &str) -> Router {
    Router::new()
        .route(ws_path, get(ws_upgrade))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn ws_upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| client_connection(socket, state))
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(json!({ "status": "ok", "clients": state.registry.len() }))
}

/// Open the listener. Failure here aborts startup.
pub async fn bind(addr: &str) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .map_err(|e| GatewayError::bind(addr, e))
}

/// Serve until `shutdown` resolves
pub async fn serve(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!(%addr, "WebSocket server listening");
    }
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await
        .map_err(GatewayError::Serve)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aggregator::SharedState;
    use sensors::SimulatedLink;

    fn state() -> AppState {
        let blueprint = contracts::ServerBlueprint::default();
        let drivers = sensors::simulated_set(&blueprint).unwrap();
        let commands = CommandHandler::new(
            Arc::new(SharedState::from_blueprint(&blueprint)),
            drivers.position.clone(),
            Arc::new(SimulatedLink),
        );
        AppState::new(Arc::new(ClientRegistry::new()), Arc::new(commands), 4)
    }

    #[tokio::test]
    async fn test_bind_failure_is_reported() {
        let taken = bind("127.0.0.1:0").await.unwrap();
        let addr = taken.local_addr().unwrap().to_string();
        match bind(&addr).await {
            Err(GatewayError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            other => panic!("expected bind error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_serve_stops_on_shutdown() {
        let listener = bind("127.0.0.1:0").await.unwrap();
        let router = create_router(state(), "/ws");
        let (tx, rx) = tokio::sync::oneshot::channel::<()>();
        let server = tokio::spawn(serve(listener, router, async {
            let _ = rx.await;
        }));
        tx.send(()).unwrap();
        assert!(server.await.unwrap().is_ok());
    }
}
