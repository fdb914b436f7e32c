//! Upload: stream a local file into the session's task.
//!
//! The file is opened before anything touches the network, so a missing
//! source fails locally with [`ApiError::FileNotFound`]. Its bytes are then
//! streamed into the multipart body straight from disk rather than loaded
//! into memory, which keeps large scans affordable.

use super::{PdfClient, Session};
use crate::error::ApiError;
use crate::transport::OutboundRequest;
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs::File;
use tokio_util::io::ReaderStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

#[derive(Deserialize)]
struct UploadResponse {
    server_filename: String,
}

/// Handle the service assigned to uploaded bytes within a task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    pub server_filename: String,
}

/// Open the upload source, mapping the common failures to precise variants.
async fn open_source(path: &Path) -> Result<(File, u64), ApiError> {
    let file = File::open(path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound => ApiError::FileNotFound {
            path: path.to_path_buf(),
        },
        ErrorKind::PermissionDenied => ApiError::PermissionDenied {
            path: path.to_path_buf(),
        },
        _ => ApiError::FileRead {
            path: path.to_path_buf(),
            source: e,
        },
    })?;

    let meta = file.metadata().await.map_err(|e| ApiError::FileRead {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !meta.is_file() {
        return Err(ApiError::FileRead {
            path: path.to_path_buf(),
            source: std::io::Error::other("not a regular file"),
        });
    }
    Ok((file, meta.len()))
}

fn base_name(path: &Path) -> Result<String, ApiError> {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .ok_or_else(|| ApiError::FileNotFound {
            path: PathBuf::from(path),
        })
}

impl PdfClient {
    /// `POST {scheme}://{server}/v1/upload`, multipart with a `file` part
    /// and a `task` field.
    pub async fn upload(
        &self,
        session: &Session,
        path: &Path,
        cancel: &CancellationToken,
    ) -> Result<UploadedFile, ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let file_name = base_name(path)?;
        let (file, len) = open_source(path).await?;
        debug!("Uploading {} ({} bytes) to task {}", path.display(), len, session.task());

        let part = Part::stream_with_length(Body::wrap_stream(ReaderStream::new(file)), len)
            .file_name(file_name.clone())
            .mime_str("application/octet-stream")
            .map_err(|e| ApiError::Internal(format!("invalid multipart content type: {e}")))?;
        let form = Form::new()
            .part("file", part)
            .text("task", session.task().to_string());

        let url = self.server_url(session, "upload");
        let request = OutboundRequest::post(&url)
            .streaming()
            .bearer(session.bearer())?
            .multipart(form);

        let response = self.transport.send(request, cancel).await?;
        let body: UploadResponse = self.transport.read_json(response, cancel).await?;

        if body.server_filename.trim().is_empty() {
            return Err(ApiError::Decode {
                url,
                detail: "empty server_filename".into(),
            });
        }

        info!(
            "Uploaded {} ({} bytes) as {}",
            file_name, len, body.server_filename
        );
        Ok(UploadedFile {
            server_filename: body.server_filename,
        })
    }
}
