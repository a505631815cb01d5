//! Errors surfaced by the HTTP layer.
//!
//! [`ApiError`] wraps core failures, failures of the services this server
//! calls out to, and malformed requests. Each maps to one HTTP status and a
//! `{id, status, message}` body; store errors never expose their source.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use statuslist_core::messages::ErrorBody;

/// A call to the signer or a remote list host that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("{service} is unreachable")]
    Transport {
        service: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{service} answered {status}")]
    Status { service: &'static str, status: u16 },

    #[error("{service} sent a malformed reply: {reason}")]
    Malformed { service: &'static str, reason: String },

    #[error("{service} sent more than {limit} bytes")]
    TooLarge { service: &'static str, limit: usize },

    #[error("credential failed verification")]
    Rejected,
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Core(#[from] statuslist_core::Error),

    #[error(transparent)]
    Upstream(#[from] UpstreamError),

    #[error("{0}")]
    BadRequest(String),
}

impl ApiError {
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::BadRequest(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Core(err) => StatusCode::from_u16(err.status_code())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            Self::Upstream(_) => StatusCode::BAD_GATEWAY,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            Self::Core(err) => ErrorBody::from(err),
            other => ErrorBody::new(other.status().as_u16(), other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = ?self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}
