//! Checks an index against a status list published by another issuer.
//!
//! 1. fetch the credential at `statusUrl`,
//! 2. have the signer verify its proof,
//! 3. decode `credentialSubject.encodedList`, bounded by
//!    `max_remote_list_bytes`,
//! 4. cache the decoded list under the publisher's host,
//! 5. read the bit at `index`.

use crate::server::{error::ApiError, error::UpstreamError, service::handler::AppState};
use serde::Deserialize;
use statuslist_core::{
    CacheKey,
    messages::VerifyStatusEntryRequest,
    statuslist::{BitList, STATUS_LIST_2021, decode_list_bounded},
    store::ListStore,
};
use tokio_util::sync::CancellationToken;
use tracing::instrument;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusListCredential {
    credential_subject: CredentialSubject,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CredentialSubject {
    encoded_list: String,
}

/// The `host[:port]` part of `url`, lowercased by URL parsing.
pub fn origin_host(url: &reqwest::Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Returns whether `request.index` is revoked in the remote list.
#[instrument(skip_all, fields(status_url = %request.status_url, index = request.index))]
pub async fn check_remote_status<S: ListStore>(
    state: &AppState<S>,
    request: &VerifyStatusEntryRequest,
    cancel: &CancellationToken,
) -> Result<bool, ApiError> {
    if request.list_type != STATUS_LIST_2021 {
        return Err(ApiError::bad_request(format!(
            "unsupported list type {}",
            request.list_type
        )));
    }
    let url = reqwest::Url::parse(&request.status_url)
        .map_err(|e| ApiError::bad_request(format!("invalid statusUrl: {e}")))?;
    let host = origin_host(&url).ok_or_else(|| ApiError::bad_request("statusUrl has no host"))?;

    let credential = state.fetcher.fetch_credential(&url).await?;
    state
        .signer
        .verify_credential(&credential, &request.tenant_id, &request.group_id)
        .await?;

    let parsed: StatusListCredential =
        serde_json::from_slice(&credential).map_err(|e| UpstreamError::Malformed {
            service: "status list host",
            reason: e.to_string(),
        })?;
    let bits = decode_list_bounded(
        &parsed.credential_subject.encoded_list,
        state.max_remote_list_bytes,
    )
    .map_err(statuslist_core::Error::from)?;

    state
        .lists
        .cache_list(&CacheKey::for_host(&host), &bits, cancel)
        .await?;

    let revoked = BitList::from_bytes(bits)
        .check_bit_at_index(request.index)
        .map_err(statuslist_core::Error::from)?;
    tracing::debug!(revoked, "checked remote status");
    Ok(revoked)
}
