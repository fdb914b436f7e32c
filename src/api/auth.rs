//! Authenticate: exchange the project public key for a bearer token.

use super::{PdfClient, Step};
use crate::error::ApiError;
use crate::transport::OutboundRequest;
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Serialize)]
struct AuthRequest<'a> {
    public_key: &'a str,
}

#[derive(Deserialize)]
struct AuthResponse {
    token: String,
}

/// Bearer token returned by the auth endpoint.
///
/// Opaque to the client: the service alone decides when it expires. `Debug`
/// never prints the token.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential(String);

impl Credential {
    pub(crate) fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn token(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

impl PdfClient {
    /// `POST {base}/auth` with `{"public_key": …}`.
    ///
    /// Retried on transient failures; a rejected key fails immediately.
    pub async fn authenticate(&self, cancel: &CancellationToken) -> Result<Credential, ApiError> {
        let credential = self
            .with_retry(Step::Authenticate, cancel, || self.authenticate_once(cancel))
            .await?;
        info!("Authenticated against {}", self.base_url);
        Ok(credential)
    }

    async fn authenticate_once(&self, cancel: &CancellationToken) -> Result<Credential, ApiError> {
        let url = self.api_url("auth");
        let request = OutboundRequest::post(&url).json(&AuthRequest {
            public_key: &self.public_key,
        })?;

        let response = self.transport.send(request, cancel).await?;
        let body: AuthResponse = self.transport.read_json(response, cancel).await?;

        if body.token.trim().is_empty() {
            return Err(ApiError::Decode {
                url,
                detail: "empty token".into(),
            });
        }
        Ok(Credential::new(body.token))
    }
}
