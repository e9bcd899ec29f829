//! Request handlers for the verification endpoint.

use std::sync::Arc;

use axum::extract::{Path, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use tracing::debug;

use clickgate_registry::WaiterRegistry;
use clickgate_types::{Outcome, VerifyPolicy};

use crate::client::client_addr;
use crate::metrics::VerifyMetrics;
use crate::render::{Render, ResponseBody};

/// State shared by every request.
pub struct AppState {
    pub registry: Arc<WaiterRegistry>,
    pub policy: Arc<VerifyPolicy>,
    pub renderer: Arc<dyn Render>,
    pub metrics: Arc<VerifyMetrics>,
    pub trust_forwarded_for: bool,
}

/// Response status for a visit. `None` means nothing was pending.
pub fn status_for(outcome: Option<Outcome>) -> StatusCode {
    match outcome {
        Some(Outcome::Fulfilled) => StatusCode::OK,
        Some(Outcome::TimedOut) => StatusCode::GONE,
        Some(Outcome::Blocked) => StatusCode::FORBIDDEN,
        None => StatusCode::UNAUTHORIZED,
    }
}

/// `GET /verify/:identifier`
pub async fn verify(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
    request: Request,
) -> Response {
    let client = client_addr(&request, state.trust_forwarded_for);
    let resolution = state.registry.try_resolve(&identifier, client, &state.policy);

    let outcome = resolution.as_ref().map(|r| r.outcome);
    state.metrics.record_visit(outcome);
    let status = status_for(outcome);

    let mut body = ResponseBody::new();
    body.insert(
        "message".to_string(),
        status.canonical_reason().unwrap_or_default().to_string(),
    );
    match resolution.and_then(|r| r.block_reason) {
        Some(reason) => {
            body.insert("reason".to_string(), reason);
        }
        None if outcome.is_none() => {
            debug!(identifier = %identifier, client = ?client, "visit for unknown identifier");
        }
        None => {}
    }

    state.renderer.render(status, &body)
}

/// `GET /metrics`
pub async fn metrics(State(state): State<Arc<AppState>>) -> Response {
    state.metrics.pending.set(state.registry.len() as i64);
    match state.metrics.encode() {
        Ok(text) => (StatusCode::OK, text).into_response(),
        Err(e) => {
            tracing::error!("failed to encode metrics: {e}");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to encode metrics".to_string(),
            )
                .into_response()
        }
    }
}
