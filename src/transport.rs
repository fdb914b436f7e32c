//! Transport: one outbound HTTP request, observed by a cancellation token.
//!
//! Every remote call in [`crate::api`] funnels through [`Transport::send`],
//! which is where three cross-cutting rules live:
//!
//! 1. **Status check**: a non-2xx answer is never handed back as success.
//!    It becomes [`ApiError::Status`] carrying the status code and the first
//!    few KiB of the body, so the service's own explanation survives into
//!    the error message.
//! 2. **Cancellation**: the token is checked before sending and raced
//!    against the in-flight request. When it fires the request future is
//!    dropped, which aborts the connection.
//! 3. **Timeouts**: the connect timeout is set once on the shared
//!    [`reqwest::Client`]. Plain requests also get a total deadline; streamed
//!    ones (see [`OutboundRequest::streaming`]) are bounded only by the read
//!    timeout, so a large file can take as long as it needs while bytes keep
//!    flowing. Either way a timeout surfaces as [`ApiError::Timeout`] naming
//!    the limit that fired.
//!
//! The underlying `reqwest::Client` is a connection pool; `Transport` is
//! cheap to clone and safe to share across concurrent workflow runs.

use crate::error::ApiError;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::multipart::Form;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Upper bound on how much of an error body is kept for diagnostics.
const MAX_ERROR_BODY: usize = 4 * 1024;

/// Request payload.
#[derive(Debug)]
pub enum RequestBody {
    /// Pre-serialised JSON; sent with `Content-Type: application/json`.
    Json(Vec<u8>),
    /// Multipart form; reqwest sets the boundary content type.
    Multipart(Form),
}

/// A single request as the API layer describes it.
#[derive(Debug)]
pub struct OutboundRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<RequestBody>,
    /// Body transfer may outlast the total request timeout.
    pub streaming: bool,
}

impl OutboundRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
            streaming: false,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    /// Attach `Authorization: Bearer <token>`.
    ///
    /// The header is marked sensitive so it never shows up in `Debug` output.
    pub fn bearer(mut self, token: &str) -> Result<Self, ApiError> {
        let mut value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| ApiError::InvalidRequest("bearer token is not a valid header value".into()))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(self)
    }

    /// Serialise `payload` as the JSON body.
    pub fn json<T: Serialize + ?Sized>(mut self, payload: &T) -> Result<Self, ApiError> {
        let bytes = serde_json::to_vec(payload)
            .map_err(|e| ApiError::Internal(format!("failed to encode request body: {e}")))?;
        self.body = Some(RequestBody::Json(bytes));
        Ok(self)
    }

    pub fn multipart(mut self, form: Form) -> Self {
        self.body = Some(RequestBody::Multipart(form));
        self
    }

    /// Mark the request as a bulk transfer: no total deadline, only the
    /// per-read timeout.
    pub fn streaming(mut self) -> Self {
        self.streaming = true;
        self
    }
}

/// Shared HTTP transport.
#[derive(Debug, Clone)]
pub struct Transport {
    client: Client,
    request_timeout_secs: u64,
    connect_timeout_secs: u64,
}

impl Transport {
    /// Build a transport with the given request and connect timeouts.
    ///
    /// `request_timeout_secs` is the total deadline of plain requests and the
    /// longest silence tolerated while reading any response.
    pub fn new(request_timeout_secs: u64, connect_timeout_secs: u64) -> Result<Self, ApiError> {
        let client = Client::builder()
            .read_timeout(Duration::from_secs(request_timeout_secs))
            .connect_timeout(Duration::from_secs(connect_timeout_secs))
            .user_agent(concat!("pdftask/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ApiError::Internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            request_timeout_secs,
            connect_timeout_secs,
        })
    }

    /// Send `request`, returning the response only if its status is 2xx.
    pub async fn send(
        &self,
        request: OutboundRequest,
        cancel: &CancellationToken,
    ) -> Result<Response, ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let OutboundRequest {
            method,
            url,
            headers,
            body,
            streaming,
        } = request;
        debug!("{} {}", method, url);

        let mut builder = self.client.request(method, &url).headers(headers);
        if !streaming {
            builder = builder.timeout(Duration::from_secs(self.request_timeout_secs));
        }
        builder = match body {
            Some(RequestBody::Json(bytes)) => builder
                .header(CONTENT_TYPE, "application/json")
                .body(bytes),
            Some(RequestBody::Multipart(form)) => builder.multipart(form),
            None => builder,
        };

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            res = builder.send() => res.map_err(|e| self.classify(&url, e))?,
        };

        let status = response.status();
        if !status.is_success() {
            let body = error_body(response, cancel).await;
            warn!("{} answered {}", url, status);
            return Err(ApiError::Status { url, status, body });
        }

        debug!("{} answered {}", url, status);
        Ok(response)
    }

    /// Read the whole body of `response` and decode it as JSON.
    pub async fn read_json<T: DeserializeOwned>(
        &self,
        response: Response,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let url = response.url().to_string();
        let bytes = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ApiError::Cancelled),
            res = response.bytes() => res.map_err(|e| self.classify(&url, e))?,
        };
        serde_json::from_slice(&bytes).map_err(|e| ApiError::Decode {
            url,
            detail: e.to_string(),
        })
    }

    /// Map a reqwest failure onto the transport-level error variants.
    ///
    /// Builder failures (an unparsable URL) can never succeed on a retry, so
    /// they become [`ApiError::InvalidRequest`] rather than `Transport`.
    pub(crate) fn classify(&self, url: &str, err: reqwest::Error) -> ApiError {
        if err.is_builder() {
            ApiError::InvalidRequest(format!("cannot build request for '{url}': {err}"))
        } else if err.is_timeout() {
            let secs = if err.is_connect() {
                self.connect_timeout_secs
            } else {
                self.request_timeout_secs
            };
            ApiError::Timeout {
                url: url.to_string(),
                secs,
            }
        } else {
            ApiError::Transport {
                url: url.to_string(),
                source: err,
            }
        }
    }
}

/// Collect at most [`MAX_ERROR_BODY`] bytes of a failed response.
///
/// Best effort: a broken or cancelled body just yields what was read so far.
async fn error_body(mut response: Response, cancel: &CancellationToken) -> String {
    let mut buf: Vec<u8> = Vec::new();
    while buf.len() < MAX_ERROR_BODY {
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            chunk = response.chunk() => chunk,
        };
        match chunk {
            Ok(Some(bytes)) => buf.extend_from_slice(&bytes),
            Ok(None) | Err(_) => break,
        }
    }
    buf.truncate(MAX_ERROR_BODY);
    String::from_utf8_lossy(&buf).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_sets_sensitive_authorization() {
        let req = OutboundRequest::get("https://h/v1/download/t1")
            .bearer("tok")
            .unwrap();
        let value = req.headers.get(AUTHORIZATION).unwrap();
        assert_eq!(value.to_str().unwrap(), "Bearer tok");
        assert!(value.is_sensitive());
    }

    #[test]
    fn bearer_rejects_control_characters() {
        let err = OutboundRequest::get("https://h/").bearer("bad\ntoken").unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)));
    }

    #[test]
    fn json_body_is_serialised() {
        let req = OutboundRequest::post("https://h/v1/auth")
            .json(&serde_json::json!({ "public_key": "k" }))
            .unwrap();
        match req.body {
            Some(RequestBody::Json(bytes)) => {
                assert_eq!(bytes, br#"{"public_key":"k"}"#.to_vec());
            }
            other => panic!("expected JSON body, got {other:?}"),
        }
    }

    #[test]
    fn streaming_flag_defaults_off() {
        assert!(!OutboundRequest::get("https://h/").streaming);
        assert!(OutboundRequest::get("https://h/").streaming().streaming);
    }

    #[tokio::test]
    async fn unparsable_url_is_invalid_request_not_transient() {
        let transport = Transport::new(5, 1).unwrap();
        let err = transport
            .send(OutboundRequest::get("http://bad host/v1/auth"), &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::InvalidRequest(_)), "got {err:?}");
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn silent_server_times_out_with_request_limit() {
        // Accepts the connection, then never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let transport = Transport::new(1, 7).unwrap();
        let err = transport
            .send(OutboundRequest::get(format!("http://{addr}/")), &CancellationToken::new())
            .await
            .unwrap_err();
        match err {
            ApiError::Timeout { secs, .. } => assert_eq!(secs, 1),
            other => panic!("expected timeout, got {other:?}"),
        }
        server.abort();
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_before_network() {
        let transport = Transport::new(5, 1).unwrap();
        let cancel = CancellationToken::new();
        cancel.cancel();
        // Port 9 (discard) on an unroutable address: reaching the network
        // would produce a transport error, not Cancelled.
        let result = transport
            .send(OutboundRequest::get("http://192.0.2.1:9/"), &cancel)
            .await;
        assert!(matches!(result, Err(ApiError::Cancelled)));
    }
}
