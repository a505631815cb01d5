use crate::server::{
    config::SigningDefaults,
    error::ApiError,
    fetch::ListFetcher,
    service::{messaging, rest},
    signer::Signer,
    telemetry::{increment_errors, increment_requests, record_request_duration},
};
use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
};
use core::future::Future;
use core::time::Duration;
use serde_json::json;
use statuslist_core::{Error, StatusLists, store::ListStore};
use std::sync::Arc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

/// Everything a request handler needs, shared by all requests.
pub struct AppState<S> {
    pub lists: StatusLists<S>,
    pub signer: Arc<dyn Signer>,
    pub fetcher: Arc<dyn ListFetcher>,
    pub defaults: SigningDefaults,
    pub token_ttl: Duration,
    pub request_timeout: Duration,
    /// Longest decoded list accepted from another issuer.
    pub max_remote_list_bytes: usize,
    /// Cancelled once the process starts shutting down.
    pub shutdown: CancellationToken,
}

impl<S: ListStore> AppState<S> {
    /// Runs one request's work under a per-request cancellation token.
    ///
    /// The token is a child of [`AppState::shutdown`]. The work is abandoned
    /// with [`Error::Cancelled`] when the process shuts down or
    /// `request_timeout` elapses, whichever comes first; open transactions
    /// are dropped and roll back.
    pub async fn run<T, F, Fut>(&self, route: &'static str, op: F) -> Result<T, ApiError>
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<T, ApiError>>,
    {
        increment_requests(route);
        let start = Instant::now();
        let cancel = self.shutdown.child_token();

        let result: Result<T, ApiError> = tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled.into()),
            res = tokio::time::timeout(self.request_timeout, op(cancel.clone())) => {
                res.unwrap_or_else(|_| {
                    tracing::warn!(route, timeout_ms = self.request_timeout.as_millis() as u64, "request timed out");
                    Err(Error::Cancelled.into())
                })
            }
        };
        cancel.cancel();

        record_request_duration(route, start.elapsed().as_secs_f64() * 1000.0);
        if result.is_err() {
            increment_errors(route);
        }
        result
    }
}

/// Builds the service router with tracing and CORS layers applied.
pub fn build_router<S: ListStore>(state: Arc<AppState<S>>) -> Router {
    Router::new()
        .route("/health", get(health::<S>))
        .route("/events", post(messaging::handle_event::<S>))
        .route("/status/{tenant_id}/{list_id}", get(rest::get_list::<S>))
        .route(
            "/status/{tenant_id}/{list_id}/revoke/{index}",
            post(rest::revoke::<S>),
        )
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// GET /health
async fn health<S: ListStore>(State(state): State<Arc<AppState<S>>>) -> impl IntoResponse {
    if state.lists.ping().await {
        (StatusCode::OK, Json(json!({ "status": "ok" })))
    } else {
        tracing::warn!("store did not answer ping");
        (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({ "status": "unavailable" })),
        )
    }
}
