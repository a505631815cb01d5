use crate::server::{
    config::SigningDefaults,
    error::UpstreamError,
    fetch::ListFetcher,
    service::handler::{AppState, build_router},
    signer::{ProofRequest, Signer, TokenRequest},
};
use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, Bytes},
    http::{HeaderMap, Request, StatusCode, header},
};
use core::num::NonZeroUsize;
use core::time::Duration;
use serde_json::{Value, json};
use statuslist_core::{
    CacheKey, StatusLists,
    statuslist::{STATUS_LIST_2021, decode_list, encode_list},
    store::memory::MemoryStore,
};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

#[derive(Default)]
struct StubSigner {
    reject: bool,
    verified: Mutex<Vec<(String, String)>>,
    tokens: Mutex<Vec<TokenRequest>>,
    proofs: Mutex<Vec<ProofRequest>>,
}

#[async_trait]
impl Signer for StubSigner {
    async fn verify_credential(
        &self,
        _credential: &[u8],
        namespace: &str,
        group: &str,
    ) -> Result<(), UpstreamError> {
        self.verified
            .lock()
            .unwrap()
            .push((namespace.to_string(), group.to_string()));
        if self.reject {
            Err(UpstreamError::Rejected)
        } else {
            Ok(())
        }
    }

    async fn prove_credential(&self, request: &ProofRequest) -> Result<Value, UpstreamError> {
        self.proofs.lock().unwrap().push(request.clone());
        let mut proved = request.credential.clone();
        proved["proof"] = json!({ "type": "JsonWebSignature2020" });
        Ok(proved)
    }

    async fn sign_token(&self, request: &TokenRequest) -> Result<String, UpstreamError> {
        self.tokens.lock().unwrap().push(request.clone());
        Ok("header.payload.signature".to_string())
    }
}

#[derive(Default)]
struct StubFetcher {
    credential: Vec<u8>,
    delay: Option<Duration>,
}

#[async_trait]
impl ListFetcher for StubFetcher {
    async fn fetch_credential(&self, _status_url: &reqwest::Url) -> Result<Vec<u8>, UpstreamError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.credential.clone())
    }
}

struct Harness {
    store: Arc<MemoryStore>,
    signer: Arc<StubSigner>,
    state: Arc<AppState<MemoryStore>>,
    app: Router,
}

fn defaults() -> SigningDefaults {
    SigningDefaults {
        key: "test".into(),
        did: "did:web:issuer.example".into(),
        namespace: "transit".into(),
        group: String::new(),
        host: "https://issuer.example/v1".into(),
        list_type: STATUS_LIST_2021.into(),
    }
}

fn harness_with(signer: StubSigner, fetcher: StubFetcher, request_timeout: Duration) -> Harness {
    let store = Arc::new(MemoryStore::new());
    let signer = Arc::new(signer);
    let state = Arc::new(AppState {
        lists: StatusLists::new(Arc::clone(&store), NonZeroUsize::MIN),
        signer: Arc::clone(&signer) as Arc<dyn Signer>,
        fetcher: Arc::new(fetcher),
        defaults: defaults(),
        token_ttl: Duration::from_secs(3600),
        request_timeout,
        max_remote_list_bytes: 1024,
        shutdown: CancellationToken::new(),
    });
    Harness {
        app: build_router(Arc::clone(&state)),
        store,
        signer,
        state,
    }
}

fn harness() -> Harness {
    harness_with(
        StubSigner::default(),
        StubFetcher::default(),
        Duration::from_secs(5),
    )
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, HeaderMap, Bytes) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let headers = response.headers().clone();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, headers, body)
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, _, body) = send(app, request).await;
    (status, serde_json::from_slice(&body).unwrap())
}

fn event(kind: &str, data: Value) -> Request<Body> {
    Request::post("/events")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(
            json!({ "id": "evt-1", "type": kind, "source": "issuer", "data": data }).to_string(),
        ))
        .unwrap()
}

fn create_event(tenant: &str) -> Request<Body> {
    event(
        "create",
        json!({ "tenantId": tenant, "requestId": "r-1", "origin": "https://issuer.example/v1" }),
    )
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

#[tokio::test]
async fn health_reports_store_availability() {
    let h = harness();

    let (status, body) = send_json(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));

    h.store.set_unavailable(true);
    let (status, _) = send_json(&h.app, get("/health")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn create_event_allocates_ascending_indices() {
    let h = harness();

    let (status, reply) = send_json(&h.app, create_event("42")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["type"], "status.data");
    assert_eq!(reply["source"], "statuslist-service");
    assert!(!reply["id"].as_str().unwrap().is_empty());
    assert_eq!(
        reply["data"],
        json!({
            "tenantId": "42",
            "requestId": "r-1",
            "index": 0,
            "statusUrl": "https://issuer.example/v1/status/42/1",
            "purpose": "revocation",
            "type": "StatusList2021",
        })
    );

    for expected in 1..8 {
        let (_, reply) = send_json(&h.app, create_event("42")).await;
        assert_eq!(reply["data"]["index"], expected);
    }
    let (_, reply) = send_json(&h.app, create_event("42")).await;
    assert_eq!(reply["data"]["index"], 0);
    assert_eq!(
        reply["data"]["statusUrl"],
        "https://issuer.example/v1/status/42/2"
    );
}

#[tokio::test]
async fn create_event_reports_invalid_tenant_in_reply() {
    let h = harness();

    let (status, reply) = send_json(&h.app, create_event("4-2")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["data"]["error"]["status"], 400);
    assert_eq!(reply["data"]["tenantId"], "4-2");
}

#[tokio::test]
async fn unknown_event_type_is_rejected() {
    let h = harness();

    let (status, body) = send_json(&h.app, event("delete", json!({}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
}

#[tokio::test]
async fn malformed_event_data_is_rejected() {
    let h = harness();

    let (status, _) = send_json(&h.app, event("create", json!({ "origin": 3 }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_is_served_as_json_and_reflects_revocations() {
    let h = harness();
    for _ in 0..4 {
        send(&h.app, create_event("42")).await;
    }

    let (status, body) = send_json(&h.app, Request::post("/status/42/1/revoke/3").body(Body::empty()).unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body,
        json!({ "tenantId": "42", "listId": 1, "index": 3, "status": "revoked" })
    );

    let (status, body) = send_json(&h.app, get("/status/42/1")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["tenantId"], "42");
    assert_eq!(body["listId"], 1);
    let bits = decode_list(body["list"].as_str().unwrap()).unwrap();
    assert_eq!(bits, vec![0b0000_1000]);
}

#[tokio::test]
async fn missing_list_is_not_found() {
    let h = harness();
    send(&h.app, create_event("42")).await;

    let (status, body) = send_json(&h.app, get("/status/42/9")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
}

#[tokio::test]
async fn revoke_out_of_range_is_bad_request() {
    let h = harness();
    send(&h.app, create_event("42")).await;

    let request = Request::post("/status/42/1/revoke/8").body(Body::empty()).unwrap();
    let (status, _) = send_json(&h.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    let list = h
        .state
        .lists
        .fetch_list(&"42".parse().unwrap(), 1, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(list.as_bytes(), &[0]);
}

#[tokio::test]
async fn token_is_signed_with_header_overrides() {
    let h = harness();
    send(&h.app, create_event("42")).await;

    let request = Request::get("/status/42/1")
        .header(header::ACCEPT, "statuslist+jwt")
        .header("X-KEY", "k1")
        .header("X-DID", "did:web:other.example")
        .header("X-HOST", "https://other.example/")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/statuslist+jwt");
    assert_eq!(&body[..], b"header.payload.signature");

    let tokens = h.signer.tokens.lock().unwrap();
    let token = &tokens[0];
    assert_eq!(token.tenant_id, "42");
    assert_eq!(token.key, "k1");
    assert_eq!(token.namespace, "transit");
    assert_eq!(token.header.kid, "did:web:other.example#k1");
    assert_eq!(token.payload.iss, "https://other.example");
    assert_eq!(token.payload.sub, "https://other.example/statuslists/1");
    assert_eq!(token.payload.exp - token.payload.iat, 3600);
    assert_eq!(token.payload.status_list.bits, 1);
    assert_eq!(decode_list(&token.payload.status_list.lst).unwrap(), vec![0]);
}

#[tokio::test]
async fn credential_is_proved_by_the_signer() {
    let h = harness();
    send(&h.app, create_event("42")).await;

    let request = Request::get("/status/42/1")
        .header(header::CONTENT_TYPE, "application/vc+ld+json")
        .body(Body::empty())
        .unwrap();
    let (status, headers, body) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(headers[header::CONTENT_TYPE], "application/vc+ld+json");
    let credential: Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(credential["id"], "https://issuer.example/v1/1");
    assert_eq!(credential["issuer"], "did:web:issuer.example");
    assert_eq!(
        credential["type"],
        json!(["VerifiableCredential", "StatusList2021Credential"])
    );
    assert_eq!(
        credential["credentialSubject"]["id"],
        "https://issuer.example/v1/1#list"
    );
    assert_eq!(credential["credentialSubject"]["statusPurpose"], "revocation");
    assert!(credential["proof"].is_object());

    let proofs = h.signer.proofs.lock().unwrap();
    assert_eq!(proofs[0].namespace, "transit");
    assert_eq!(proofs[0].key, "test");
}

#[tokio::test]
async fn credential_requires_status_list_2021_type() {
    let h = harness();
    send(&h.app, create_event("42")).await;

    let request = Request::get("/status/42/1")
        .header(header::ACCEPT, "application/vc+ld+json")
        .header("X-TYPE", "BitstringStatusList")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(h.signer.proofs.lock().unwrap().is_empty());
}

#[tokio::test]
async fn unsupported_media_type_is_bad_request() {
    let h = harness();
    send(&h.app, create_event("42")).await;

    let request = Request::get("/status/42/1")
        .header(header::ACCEPT, "text/html")
        .body(Body::empty())
        .unwrap();
    let (status, _, _) = send(&h.app, request).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

fn remote_credential(bits: &[u8]) -> Vec<u8> {
    json!({
        "type": ["VerifiableCredential", "StatusList2021Credential"],
        "credentialSubject": {
            "type": "StatusList2021",
            "encodedList": encode_list(bits),
        },
    })
    .to_string()
    .into_bytes()
}

fn verify_event(index: usize) -> Request<Body> {
    event(
        "verify",
        json!({
            "tenantId": "holder",
            "groupId": "g1",
            "requestId": "r-9",
            "statusUrl": "https://Remote.Example:8443/status/7/1",
            "type": "StatusList2021",
            "index": index,
        }),
    )
}

#[tokio::test]
async fn verify_event_checks_and_caches_the_remote_list() {
    let h = harness_with(
        StubSigner::default(),
        StubFetcher {
            credential: remote_credential(&[0b0000_1000]),
            delay: None,
        },
        Duration::from_secs(5),
    );

    let (status, reply) = send_json(&h.app, verify_event(3)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        reply["data"],
        json!({ "tenantId": "holder", "requestId": "r-9", "revoked": true, "suspended": false })
    );

    let (_, reply) = send_json(&h.app, verify_event(2)).await;
    assert_eq!(reply["data"]["revoked"], false);

    assert_eq!(
        h.signer.verified.lock().unwrap()[0],
        ("holder".to_string(), "g1".to_string())
    );
    let cached = h
        .state
        .lists
        .cached_list(
            &CacheKey::for_host("remote.example:8443"),
            &CancellationToken::new(),
        )
        .await
        .unwrap()
        .unwrap();
    assert_eq!(cached.bits, vec![0b0000_1000]);
}

#[tokio::test]
async fn rejected_credential_is_not_cached() {
    let h = harness_with(
        StubSigner {
            reject: true,
            ..StubSigner::default()
        },
        StubFetcher {
            credential: remote_credential(&[0xff]),
            delay: None,
        },
        Duration::from_secs(5),
    );

    let (_, reply) = send_json(&h.app, verify_event(0)).await;

    assert_eq!(reply["data"]["error"]["status"], 502);
    assert_eq!(reply["data"]["revoked"], false);
    let cached = h
        .state
        .lists
        .cached_list(
            &CacheKey::for_host("remote.example:8443"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(cached.is_none());
}

#[tokio::test]
async fn undecodable_remote_list_is_reported() {
    let credential = json!({ "credentialSubject": { "encodedList": "%%%" } })
        .to_string()
        .into_bytes();
    let h = harness_with(
        StubSigner::default(),
        StubFetcher {
            credential,
            delay: None,
        },
        Duration::from_secs(5),
    );

    let (_, reply) = send_json(&h.app, verify_event(0)).await;

    assert_eq!(reply["data"]["error"]["status"], 422);
}

#[tokio::test]
async fn oversized_remote_list_is_refused_and_not_cached() {
    // 64 KiB of zeros compress to well under 1 KiB of text.
    let h = harness_with(
        StubSigner::default(),
        StubFetcher {
            credential: remote_credential(&vec![0; 64 * 1024]),
            delay: None,
        },
        Duration::from_secs(5),
    );

    let (status, reply) = send_json(&h.app, verify_event(0)).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["data"]["error"]["status"], 422);
    assert_eq!(reply["data"]["revoked"], false);
    let cached = h
        .state
        .lists
        .cached_list(
            &CacheKey::for_host("remote.example:8443"),
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert!(cached.is_none());
}

#[tokio::test]
async fn slow_remote_hits_the_request_deadline() {
    let h = harness_with(
        StubSigner::default(),
        StubFetcher {
            credential: remote_credential(&[0]),
            delay: Some(Duration::from_secs(30)),
        },
        Duration::from_millis(50),
    );

    let (_, reply) = send_json(&h.app, verify_event(0)).await;

    assert_eq!(reply["data"]["error"]["status"], 503);
}

#[tokio::test]
async fn requests_after_shutdown_are_cancelled() {
    let h = harness();
    h.state.shutdown.cancel();

    let (status, reply) = send_json(&h.app, create_event("42")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(reply["data"]["error"]["status"], 503);
    assert!(!h.store.has_partition(&statuslist_core::PartitionName::validate("tenant_id_42".into()).unwrap()).await);
}
