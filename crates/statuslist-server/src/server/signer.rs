//! Client for the signer service.
//!
//! The signer holds the issuer keys. This server never signs anything
//! itself: it asks the signer to verify fetched credentials, to attach a
//! proof to StatusList2021 credentials and to sign status list tokens.

use crate::server::error::UpstreamError;
use async_trait::async_trait;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize, de::DeserializeOwned};

const SERVICE: &str = "signer";

/// Body of a proof request.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProofRequest {
    pub namespace: String,
    pub group: String,
    pub key: String,
    pub credential: serde_json::Value,
}

/// Body of a token signing request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenRequest {
    pub tenant_id: String,
    pub request_id: String,
    pub namespace: String,
    pub group: String,
    pub key: String,
    pub header: TokenHeader,
    pub payload: TokenPayload,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenHeader {
    pub kid: String,
}

/// Claims of a status list token.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct TokenPayload {
    pub status_list: StatusListClaim,
    pub iss: String,
    pub sub: String,
    /// Seconds since the Unix epoch.
    pub iat: i64,
    /// Seconds since the Unix epoch.
    pub exp: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StatusListClaim {
    pub bits: u8,
    pub lst: String,
}

#[async_trait]
pub trait Signer: Send + Sync + 'static {
    /// Checks the proof of a fetched credential on behalf of `namespace`.
    ///
    /// # Errors
    ///
    /// [`UpstreamError::Rejected`] if the signer does not report the
    /// credential as valid.
    async fn verify_credential(
        &self,
        credential: &[u8],
        namespace: &str,
        group: &str,
    ) -> Result<(), UpstreamError>;

    /// Returns `request.credential` with a proof attached.
    async fn prove_credential(&self, request: &ProofRequest) -> Result<serde_json::Value, UpstreamError>;

    /// Returns the compact serialization of the signed token.
    async fn sign_token(&self, request: &TokenRequest) -> Result<String, UpstreamError>;
}

/// [`Signer`] talking to the signer's REST API.
#[derive(Clone, Debug)]
pub struct HttpSigner {
    client: reqwest::Client,
    base_url: String,
}

#[derive(Serialize)]
struct VerifyBody {
    credential: String,
}

#[derive(Deserialize)]
struct VerifyReply {
    valid: Option<bool>,
}

#[derive(Deserialize)]
struct TokenReply {
    token: String,
}

impl HttpSigner {
    pub fn new(client: reqwest::Client, base_url: &reqwest::Url) -> Self {
        Self {
            client,
            base_url: base_url.as_str().trim_end_matches('/').to_string(),
        }
    }

    async fn post<B, R>(&self, path: &str, body: &B, headers: &[(&str, &str)]) -> Result<R, UpstreamError>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned + Send,
    {
        let mut request = self.client.post(format!("{}{path}", self.base_url)).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }

        let response = request.send().await.map_err(|source| UpstreamError::Transport {
            service: SERVICE,
            source,
        })?;
        let status = response.status();
        if !status.is_success() {
            tracing::warn!(path, %status, "signer call failed");
            return Err(UpstreamError::Status {
                service: SERVICE,
                status: status.as_u16(),
            });
        }

        response.json().await.map_err(|e| UpstreamError::Malformed {
            service: SERVICE,
            reason: e.to_string(),
        })
    }
}

#[async_trait]
impl Signer for HttpSigner {
    async fn verify_credential(
        &self,
        credential: &[u8],
        namespace: &str,
        group: &str,
    ) -> Result<(), UpstreamError> {
        let body = VerifyBody {
            credential: STANDARD.encode(credential),
        };
        let reply: VerifyReply = self
            .post(
                "/credential/verify",
                &body,
                &[("x-namespace", namespace), ("x-group", group)],
            )
            .await?;

        match reply.valid {
            Some(true) => Ok(()),
            Some(false) => Err(UpstreamError::Rejected),
            None => Err(UpstreamError::Malformed {
                service: SERVICE,
                reason: "missing `valid`".to_string(),
            }),
        }
    }

    async fn prove_credential(&self, request: &ProofRequest) -> Result<serde_json::Value, UpstreamError> {
        self.post("/credential/proof", request, &[]).await
    }

    async fn sign_token(&self, request: &TokenRequest) -> Result<String, UpstreamError> {
        let reply: TokenReply = self.post("/token/sign", request, &[]).await?;
        Ok(reply.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn token_request_wire_format() {
        let request = TokenRequest {
            tenant_id: "42".into(),
            request_id: "r-1".into(),
            namespace: "transit".into(),
            group: String::new(),
            key: "test".into(),
            header: TokenHeader {
                kid: "did:web:issuer#test".into(),
            },
            payload: TokenPayload {
                status_list: StatusListClaim {
                    bits: 1,
                    lst: "H4sIAAAAAAAA_2NgAAAAjcC7sQAAAA".into(),
                },
                iss: "https://issuer.example".into(),
                sub: "https://issuer.example/statuslists/1".into(),
                iat: 1_700_000_000,
                exp: 1_700_086_400,
            },
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "tenantId": "42",
                "requestId": "r-1",
                "namespace": "transit",
                "group": "",
                "key": "test",
                "header": { "kid": "did:web:issuer#test" },
                "payload": {
                    "status_list": { "bits": 1, "lst": "H4sIAAAAAAAA_2NgAAAAjcC7sQAAAA" },
                    "iss": "https://issuer.example",
                    "sub": "https://issuer.example/statuslists/1",
                    "iat": 1_700_000_000,
                    "exp": 1_700_086_400,
                },
            })
        );
    }

    #[test]
    fn base_url_loses_trailing_slash() {
        let url = reqwest::Url::parse("http://signer:8080/v1/").unwrap();
        let signer = HttpSigner::new(reqwest::Client::new(), &url);
        assert_eq!(signer.base_url, "http://signer:8080/v1");
    }
}
