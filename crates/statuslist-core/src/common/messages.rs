//! Request/reply payloads of the status list messaging contract.
//!
//! Two event kinds exist:
//!
//! - `create` ([`CreateStatusEntryRequest`] → [`CreateStatusEntryReply`])
//!   allocates an index for a new credential.
//! - `verify` ([`VerifyStatusEntryRequest`] → [`VerifyStatusEntryReply`])
//!   checks an index against a remotely published list.
//!
//! Failures travel inside the reply as an [`ErrorBody`] instead of failing
//! the exchange, so the requester always receives its `requestId` back.

use serde::{Deserialize, Serialize};
use statuslist::{PURPOSE_REVOCATION, STATUS_LIST_2021};
use uuid::Uuid;

use crate::Error;

/// Event type of allocation requests.
pub const EVENT_TYPE_CREATE: &str = "create";
/// Event type of verification requests.
pub const EVENT_TYPE_VERIFY: &str = "verify";
/// Event type of every reply.
pub const EVENT_TYPE_STATUS: &str = "status.data";

/// Structured error embedded in replies.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub id: String,
    pub status: u16,
    #[serde(alias = "msg")]
    pub message: String,
}

impl ErrorBody {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            status,
            message: message.into(),
        }
    }
}

impl From<&Error> for ErrorBody {
    fn from(err: &Error) -> Self {
        Self::new(err.status_code(), err.public_message())
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatusEntryRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub request_id: String,
    /// Public origin prefixed to the status path in the reply.
    #[serde(default)]
    pub origin: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateStatusEntryReply {
    pub tenant_id: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub index: usize,
    pub status_url: String,
    pub purpose: String,
    #[serde(rename = "type")]
    pub list_type: String,
}

impl CreateStatusEntryReply {
    pub fn allocated(request: &CreateStatusEntryRequest, index: usize, status_path: &str) -> Self {
        Self {
            tenant_id: request.tenant_id.clone(),
            request_id: request.request_id.clone(),
            error: None,
            index,
            status_url: format!("{}{}", request.origin, status_path),
            purpose: PURPOSE_REVOCATION.to_string(),
            list_type: STATUS_LIST_2021.to_string(),
        }
    }

    pub fn failed(request: &CreateStatusEntryRequest, error: ErrorBody) -> Self {
        Self {
            tenant_id: request.tenant_id.clone(),
            request_id: request.request_id.clone(),
            error: Some(error),
            index: 0,
            status_url: String::new(),
            purpose: PURPOSE_REVOCATION.to_string(),
            list_type: STATUS_LIST_2021.to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyStatusEntryRequest {
    pub tenant_id: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default)]
    pub request_id: String,
    pub status_url: String,
    #[serde(rename = "type", default = "default_list_type")]
    pub list_type: String,
    pub index: usize,
}

fn default_list_type() -> String {
    STATUS_LIST_2021.to_string()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyStatusEntryReply {
    pub tenant_id: String,
    pub request_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
    pub revoked: bool,
    /// Always `false`: suspension is not tracked, revocation is final.
    pub suspended: bool,
}

impl VerifyStatusEntryReply {
    pub fn checked(request: &VerifyStatusEntryRequest, revoked: bool) -> Self {
        Self {
            tenant_id: request.tenant_id.clone(),
            request_id: request.request_id.clone(),
            error: None,
            revoked,
            suspended: false,
        }
    }

    pub fn failed(request: &VerifyStatusEntryRequest, error: ErrorBody) -> Self {
        Self {
            tenant_id: request.tenant_id.clone(),
            request_id: request.request_id.clone(),
            error: Some(error),
            revoked: false,
            suspended: false,
        }
    }
}
