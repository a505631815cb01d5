//! Publication and revocation of a tenant's status lists.
//!
//! `GET /status/{tenant_id}/{list_id}` serves one list in the representation
//! chosen by the `Accept` header, falling back to `Content-Type`:
//!
//! | media type               | body                                         |
//! |--------------------------|----------------------------------------------|
//! | none, `*/*`, JSON        | `{tenantId, listId, list}`                   |
//! | `statuslist+jwt`         | token signed by the signer                   |
//! | `application/vc+ld+json` | StatusList2021 credential proved by the signer |
//!
//! The signed representations take their signing parameters from the
//! `X-KEY`, `X-DID`, `X-NAMESPACE`, `X-GROUP`, `X-HOST` and `X-TYPE` headers,
//! each falling back to the configured default.

use crate::server::{
    config::SigningDefaults,
    error::ApiError,
    fetch::VC_LD_JSON,
    service::handler::AppState,
    signer::{ProofRequest, StatusListClaim, TokenHeader, TokenPayload, TokenRequest},
    telemetry::increment_revocations,
};
use axum::{
    Json,
    extract::{Path, State},
    http::{HeaderMap, HeaderName, HeaderValue, header},
    response::{IntoResponse, Response},
};
use chrono::{SecondsFormat, Utc};
use core::time::Duration;
use serde::Serialize;
use serde_json::json;
use statuslist_core::{
    TenantId,
    statuslist::{ListId, PURPOSE_REVOCATION, STATUS_LIST_2021, encode_list},
    store::ListStore,
};
use std::sync::Arc;

/// Media type of a signed status list token.
pub const STATUSLIST_JWT: &str = "application/statuslist+jwt";

const W3C_CREDENTIALS_V1: &str = "https://www.w3.org/2018/credentials/v1";
const W3ID_STATUS_LIST_2021_V1: &str = "https://w3id.org/vc/status-list/2021/v1";
const W3ID_JWS_2020_V1: &str = "https://w3id.org/security/suites/jws-2020/v1";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Representation {
    Json,
    Token,
    Credential,
}

/// Picks the representation requested by `headers`, or `None` when the
/// requested media type is not served.
pub fn negotiate(headers: &HeaderMap) -> Option<Representation> {
    let requested = [header::ACCEPT, header::CONTENT_TYPE]
        .iter()
        .filter_map(|name| headers.get(name)?.to_str().ok())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .unwrap_or_default();

    if requested.is_empty() {
        return Some(Representation::Json);
    }

    requested.split(',').find_map(|entry| {
        let media = entry.split(';').next().unwrap_or_default().trim();
        match media.to_ascii_lowercase().as_str() {
            "*/*" | "application/json" => Some(Representation::Json),
            "statuslist+jwt" | STATUSLIST_JWT => Some(Representation::Token),
            VC_LD_JSON => Some(Representation::Credential),
            _ => None,
        }
    })
}

/// Signing parameters of one request after header overrides.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SigningParams {
    pub key: String,
    pub did: String,
    pub namespace: String,
    pub group: String,
    pub host: String,
    pub list_type: String,
}

impl SigningParams {
    pub fn from_headers(headers: &HeaderMap, defaults: &SigningDefaults) -> Self {
        let pick = |name: &'static str, default: &str| {
            headers
                .get(HeaderName::from_static(name))
                .and_then(|v| v.to_str().ok())
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
                .to_string()
        };
        Self {
            key: pick("x-key", &defaults.key),
            did: pick("x-did", &defaults.did),
            namespace: pick("x-namespace", &defaults.namespace),
            group: pick("x-group", &defaults.group),
            host: pick("x-host", &defaults.host).trim_end_matches('/').to_string(),
            list_type: pick("x-type", &defaults.list_type),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ListBody<'a> {
    tenant_id: &'a str,
    list_id: ListId,
    list: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RevokeBody<'a> {
    tenant_id: &'a str,
    list_id: ListId,
    index: usize,
    status: &'static str,
}

/// GET /status/{tenant_id}/{list_id}
pub async fn get_list<S: ListStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant_id, list_id)): Path<(String, ListId)>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let Some(representation) = negotiate(&headers) else {
        return Err(ApiError::bad_request("unsupported media type requested"));
    };
    let tenant = TenantId::new(tenant_id)?;
    let params = SigningParams::from_headers(&headers, &state.defaults);
    if representation == Representation::Credential && params.list_type != STATUS_LIST_2021 {
        return Err(ApiError::bad_request(format!(
            "list type {} cannot be served as a credential",
            params.list_type
        )));
    }

    let app = &*state;
    app.run("get_list", |cancel| async move {
        let list = app.lists.fetch_list(&tenant, list_id, &cancel).await?;
        let encoded = encode_list(list.as_bytes());

        match representation {
            Representation::Json => Ok(Json(ListBody {
                tenant_id: tenant.as_str(),
                list_id,
                list: encoded,
            })
            .into_response()),
            Representation::Token => {
                let request = token_request(&tenant, list_id, encoded, &params, app.token_ttl);
                let token = app.signer.sign_token(&request).await?;
                Ok((
                    [(header::CONTENT_TYPE, HeaderValue::from_static(STATUSLIST_JWT))],
                    token,
                )
                    .into_response())
            }
            Representation::Credential => {
                let request = ProofRequest {
                    namespace: params.namespace.clone(),
                    group: params.group.clone(),
                    key: params.key.clone(),
                    credential: status_list_credential(list_id, &encoded, &params),
                };
                let proved = app.signer.prove_credential(&request).await?;
                Ok((
                    [(header::CONTENT_TYPE, HeaderValue::from_static(VC_LD_JSON))],
                    Json(proved),
                )
                    .into_response())
            }
        }
    })
    .await
}

/// POST /status/{tenant_id}/{list_id}/revoke/{index}
pub async fn revoke<S: ListStore>(
    State(state): State<Arc<AppState<S>>>,
    Path((tenant_id, list_id, index)): Path<(String, ListId, usize)>,
) -> Result<Response, ApiError> {
    let tenant = TenantId::new(tenant_id)?;

    let app = &*state;
    app.run("revoke", |cancel| async move {
        app.lists.revoke(&tenant, list_id, index, &cancel).await?;
        increment_revocations();
        Ok(Json(RevokeBody {
            tenant_id: tenant.as_str(),
            list_id,
            index,
            status: "revoked",
        })
        .into_response())
    })
    .await
}

fn token_request(
    tenant: &TenantId,
    list_id: ListId,
    encoded: String,
    params: &SigningParams,
    token_ttl: Duration,
) -> TokenRequest {
    let iat = Utc::now().timestamp();
    let ttl = i64::try_from(token_ttl.as_secs()).unwrap_or(i64::MAX);
    TokenRequest {
        tenant_id: tenant.to_string(),
        request_id: uuid::Uuid::new_v4().to_string(),
        namespace: params.namespace.clone(),
        group: params.group.clone(),
        key: params.key.clone(),
        header: TokenHeader {
            kid: format!("{}#{}", params.did, params.key),
        },
        payload: TokenPayload {
            status_list: StatusListClaim { bits: 1, lst: encoded },
            iss: params.host.clone(),
            sub: format!("{}/statuslists/{list_id}", params.host),
            iat,
            exp: iat.saturating_add(ttl),
        },
    }
}

/// The unsigned StatusList2021 credential of one list.
pub fn status_list_credential(list_id: ListId, encoded: &str, params: &SigningParams) -> serde_json::Value {
    let id = format!("{}/{list_id}", params.host);
    json!({
        "@context": [W3C_CREDENTIALS_V1, W3ID_STATUS_LIST_2021_V1, W3ID_JWS_2020_V1],
        "type": ["VerifiableCredential", "StatusList2021Credential"],
        "id": id,
        "issuer": params.did,
        "issuanceDate": Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        "credentialSubject": {
            "id": format!("{id}#list"),
            "type": STATUS_LIST_2021,
            "statusPurpose": PURPOSE_REVOCATION,
            "encodedList": encoded,
        },
    })
}
