//! Process: ask the service to run the session's tool over an uploaded file.

use super::{PdfClient, Session, Tool, UploadedFile};
use crate::error::ApiError;
use crate::transport::OutboundRequest;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[derive(Debug, Serialize)]
struct ProcessRequest<'a> {
    task: &'a str,
    tool: Tool,
    files: Vec<FileRequest<'a>>,
}

#[derive(Debug, Serialize)]
struct FileRequest<'a> {
    server_filename: &'a str,
    filename: &'a str,
}

/// Outcome of a process call.
///
/// `download_filename` is the name the result should be saved under; the
/// remaining fields are informational and default when the service omits
/// them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessResult {
    pub download_filename: String,
    /// Input size in bytes.
    #[serde(default)]
    pub filesize: u64,
    /// Output size in bytes.
    #[serde(default)]
    pub output_filesize: u64,
    #[serde(default)]
    pub output_filenumber: u32,
    #[serde(default)]
    pub output_extensions: String,
    /// Server-side processing time, as reported.
    #[serde(default)]
    pub timer: String,
    #[serde(default)]
    pub status: String,
}

impl ProcessResult {
    /// Output size as a fraction of input size, when both are known.
    pub fn ratio(&self) -> Option<f64> {
        (self.filesize > 0).then(|| self.output_filesize as f64 / self.filesize as f64)
    }
}

impl PdfClient {
    /// `POST {scheme}://{server}/v1/process` binding one uploaded file.
    ///
    /// The tool sent is the one the session was started with, so the start
    /// and process calls can never disagree.
    pub async fn process(
        &self,
        session: &Session,
        uploaded: &UploadedFile,
        filename: &str,
        cancel: &CancellationToken,
    ) -> Result<ProcessResult, ApiError> {
        let url = self.server_url(session, "process");
        let payload = ProcessRequest {
            task: session.task(),
            tool: session.tool(),
            files: vec![FileRequest {
                server_filename: &uploaded.server_filename,
                filename,
            }],
        };
        let request = OutboundRequest::post(&url)
            .bearer(session.bearer())?
            .json(&payload)?;

        let response = self.transport.send(request, cancel).await?;
        let result: ProcessResult = self.transport.read_json(response, cancel).await?;

        if result.download_filename.trim().is_empty() {
            return Err(ApiError::Decode {
                url,
                detail: "empty download_filename".into(),
            });
        }

        info!(
            "Processed {}: {} → {} bytes, status {}",
            filename, result.filesize, result.output_filesize, result.status
        );
        Ok(result)
    }
}
