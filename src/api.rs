use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use tokio_util::sync::CancellationToken;

use crate::discovery::Registry;
use crate::metrics::Metrics;
use crate::persistence::TargetGroup;

#[derive(Clone)]
struct AppState {
    metrics: Arc<Metrics>,
    registry: Arc<Registry>,
}

async fn export_metrics(State(state): State<AppState>) -> Response {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
            body,
        )
            .into_response(),
        Err(err) => {
            log::error!("Failed to encode metrics: {}", err);
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode metrics").into_response()
        }
    }
}

async fn health() -> &'static str {
    "ok"
}

/// The document the discovery file currently should contain.
async fn current_targets(State(state): State<AppState>) -> Json<Vec<TargetGroup>> {
    Json(
        state
            .registry
            .snapshot()
            .await
            .into_iter()
            .map(|container| container.target_group)
            .collect(),
    )
}

pub struct APIServer {
    router: axum::Router,
}

impl APIServer {
    pub fn new(metrics_path: &str, metrics: Arc<Metrics>, registry: Arc<Registry>) -> Self {
        let router = axum::Router::new()
            .route(metrics_path, get(export_metrics))
            .route("/health", get(health))
            .route("/targets", get(current_targets))
            .with_state(AppState { metrics, registry });
        Self { router }
    }

    /// Serves requests on `listener` until `cancel` fires.
    pub async fn serve(
        self,
        listener: tokio::net::TcpListener,
        cancel: CancellationToken,
    ) -> std::io::Result<()> {
        axum::serve(listener, self.router)
            .with_graceful_shutdown(cancel.cancelled_owned())
            .await
    }
}
