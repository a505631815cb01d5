//! Request/reply events on `POST /events`.
//!
//! Requests arrive as `{id?, type, source?, data}` envelopes with `type`
//! either `create` or `verify`. Replies are `status.data` envelopes. Failures
//! of a well-formed request are reported inside the reply's `data.error`;
//! only an unreadable envelope or an unknown event type is rejected at the
//! HTTP level.

use crate::server::{
    error::ApiError,
    service::{handler::AppState, verify::check_remote_status},
    telemetry::{increment_allocations, increment_verifications},
};
use axum::{Json, extract::State};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use statuslist_core::{
    TenantId,
    messages::{
        CreateStatusEntryReply, CreateStatusEntryRequest, EVENT_TYPE_CREATE, EVENT_TYPE_STATUS,
        EVENT_TYPE_VERIFY, VerifyStatusEntryReply, VerifyStatusEntryRequest,
    },
    statuslist::status_path,
    store::ListStore,
};
use std::sync::Arc;

/// Source attribute of every reply.
pub const EVENT_SOURCE: &str = "statuslist-service";

#[derive(Debug, Deserialize)]
pub struct EventEnvelope {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub source: Option<String>,
    pub data: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct ReplyEnvelope<T> {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub source: &'static str,
    pub data: T,
}

impl<T> ReplyEnvelope<T> {
    fn status(data: T) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: EVENT_TYPE_STATUS,
            source: EVENT_SOURCE,
            data,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum EventReply {
    Create(CreateStatusEntryReply),
    Verify(VerifyStatusEntryReply),
}

/// POST /events
pub async fn handle_event<S: ListStore>(
    State(state): State<Arc<AppState<S>>>,
    Json(event): Json<EventEnvelope>,
) -> Result<Json<ReplyEnvelope<EventReply>>, ApiError> {
    tracing::debug!(id = ?event.id, kind = %event.kind, source = ?event.source, "event received");

    let reply = match event.kind.as_str() {
        EVENT_TYPE_CREATE => EventReply::Create(create(&state, parse(event.data)?).await),
        EVENT_TYPE_VERIFY => EventReply::Verify(verify(&state, parse(event.data)?).await),
        other => {
            return Err(ApiError::bad_request(format!("unsupported event type {other}")));
        }
    };
    Ok(Json(ReplyEnvelope::status(reply)))
}

fn parse<T: DeserializeOwned>(data: serde_json::Value) -> Result<T, ApiError> {
    serde_json::from_value(data).map_err(|e| ApiError::bad_request(format!("invalid event data: {e}")))
}

async fn create<S: ListStore>(state: &AppState<S>, request: CreateStatusEntryRequest) -> CreateStatusEntryReply {
    let tenant_id = request.tenant_id.as_str();
    let result = state
        .run("create", |cancel| async move {
            let tenant = TenantId::new(tenant_id)?;
            let allocation = state.lists.allocate(&tenant, &cancel).await?;
            Ok((allocation, status_path(tenant.as_str(), allocation.list_id)))
        })
        .await;

    match result {
        Ok((allocation, path)) => {
            increment_allocations();
            tracing::info!(tenant = %request.tenant_id, list_id = allocation.list_id, index = allocation.index, "status entry created");
            CreateStatusEntryReply::allocated(&request, allocation.index, &path)
        }
        Err(err) => {
            tracing::warn!(tenant = %request.tenant_id, error = %err, "status entry creation failed");
            CreateStatusEntryReply::failed(&request, err.body())
        }
    }
}

async fn verify<S: ListStore>(state: &AppState<S>, request: VerifyStatusEntryRequest) -> VerifyStatusEntryReply {
    let checked = &request;
    let result = state
        .run("verify", |cancel| async move {
            check_remote_status(state, checked, &cancel).await
        })
        .await;

    match result {
        Ok(revoked) => {
            increment_verifications();
            VerifyStatusEntryReply::checked(&request, revoked)
        }
        Err(err) => {
            tracing::warn!(status_url = %request.status_url, error = %err, "status verification failed");
            VerifyStatusEntryReply::failed(&request, err.body())
        }
    }
}
