//! StartSession: allocate a task on one backend node of the service.

use super::{Credential, PdfClient, Step, Tool};
use crate::error::ApiError;
use crate::transport::OutboundRequest;
use serde::Deserialize;
use std::fmt;
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Deserialize)]
struct StartResponse {
    server: String,
    task: String,
}

/// Everything later calls need to address one task: the bearer token, the
/// task id, the server host that owns the task, and the tool it was started
/// for.
///
/// Built once from a start response and never mutated. Every run builds its
/// own, so two concurrent runs cannot swap identifiers.
#[derive(Clone, PartialEq, Eq)]
pub struct Session {
    credential: Credential,
    task: String,
    server: String,
    tool: Tool,
}

impl Session {
    pub(crate) fn new(credential: Credential, task: String, server: String, tool: Tool) -> Self {
        Self {
            credential,
            task,
            server,
            tool,
        }
    }

    pub fn task(&self) -> &str {
        &self.task
    }

    /// Host (and optional port) of the node that allocated the task.
    pub fn server(&self) -> &str {
        &self.server
    }

    pub fn tool(&self) -> Tool {
        self.tool
    }

    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    pub(crate) fn bearer(&self) -> &str {
        self.credential.token()
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("task", &self.task)
            .field("server", &self.server)
            .field("tool", &self.tool)
            .field("credential", &self.credential)
            .finish()
    }
}

/// A usable server value is a bare `host[:port]`; anything carrying a scheme,
/// path, query or userinfo would redirect our bearer token elsewhere.
fn is_bare_host(server: &str) -> bool {
    !server.is_empty()
        && !server
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '\\' | '?' | '#' | '@'))
}

impl PdfClient {
    /// `GET {base}/start/{tool}` with the bearer token.
    ///
    /// Retried on transient failures (including "no capacity" 5xx answers).
    pub async fn start_session(
        &self,
        credential: &Credential,
        tool: Tool,
        cancel: &CancellationToken,
    ) -> Result<Session, ApiError> {
        let session = self
            .with_retry(Step::StartSession, cancel, || {
                self.start_session_once(credential, tool, cancel)
            })
            .await?;
        info!(
            "Started {} task {} on {}",
            session.tool, session.task, session.server
        );
        Ok(session)
    }

    async fn start_session_once(
        &self,
        credential: &Credential,
        tool: Tool,
        cancel: &CancellationToken,
    ) -> Result<Session, ApiError> {
        let url = self.api_url(&format!("start/{}", tool.as_str()));
        let request = OutboundRequest::get(&url).bearer(credential.token())?;

        let response = self.transport.send(request, cancel).await?;
        let body: StartResponse = self.transport.read_json(response, cancel).await?;

        if body.task.trim().is_empty() {
            return Err(ApiError::Decode {
                url,
                detail: "empty task id".into(),
            });
        }
        if !is_bare_host(&body.server) {
            return Err(ApiError::Decode {
                url,
                detail: format!("server '{}' is not a bare host name", body.server),
            });
        }

        Ok(Session::new(credential.clone(), body.task, body.server, tool))
    }
}
