//! Download: stream the task's output into a local file.
//!
//! ## Why a temp file?
//!
//! Bytes are written to a [`tempfile::NamedTempFile`] created in the
//! destination directory and only renamed onto the destination once the
//! whole body has arrived. Any early exit (error status, broken stream,
//! cancellation, disk full) drops the temp file, which deletes it. A failed
//! download therefore never leaves a truncated file under the final name.
//! The staging file is created with ordinary permissions, so the renamed
//! result carries the same mode a plain `File::create` would have.

use super::{PdfClient, Session};
use crate::error::ApiError;
use crate::transport::OutboundRequest;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// A completed download.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Downloaded {
    pub path: PathBuf,
    pub bytes: u64,
}

impl PdfClient {
    /// `GET {scheme}://{server}/v1/download/{task}` into `destination`.
    ///
    /// The destination's directory must exist; it is not created.
    pub async fn download(
        &self,
        session: &Session,
        destination: &Path,
        cancel: &CancellationToken,
    ) -> Result<Downloaded, ApiError> {
        if cancel.is_cancelled() {
            return Err(ApiError::Cancelled);
        }

        let dir = match destination.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let mut builder = tempfile::Builder::new();
        builder.prefix(".pdftask-").suffix(".part");
        // tempfile defaults to 0600. 0666 is narrowed by the umask, as with File::create.
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            builder.permissions(std::fs::Permissions::from_mode(0o666));
        }
        let temp = builder
            .tempfile_in(dir)
            .map_err(|e| ApiError::FileCreate {
                path: destination.to_path_buf(),
                source: e,
            })?;
        debug!("Staging download in {}", temp.path().display());

        let url = self.server_url(session, &format!("download/{}", session.task()));
        let request = OutboundRequest::get(&url)
            .streaming()
            .bearer(session.bearer())?;
        let response = self.transport.send(request, cancel).await?;

        let write_err = |e: std::io::Error| ApiError::FileWrite {
            path: destination.to_path_buf(),
            source: e,
        };
        let handle = temp.as_file().try_clone().map_err(write_err)?;
        let mut out = tokio::fs::File::from_std(handle);
        let mut stream = response.bytes_stream();
        let mut written: u64 = 0;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                next = stream.next() => next,
            };
            match next {
                Some(Ok(chunk)) => {
                    out.write_all(&chunk).await.map_err(write_err)?;
                    written += chunk.len() as u64;
                }
                Some(Err(e)) => return Err(self.transport.classify(&url, e)),
                None => break,
            }
        }
        out.flush().await.map_err(write_err)?;
        out.sync_all().await.map_err(write_err)?;
        drop(out);

        temp.persist(destination)
            .map_err(|e| write_err(e.error))?;

        info!("Downloaded {} bytes to {}", written, destination.display());
        Ok(Downloaded {
            path: destination.to_path_buf(),
            bytes: written,
        })
    }
}
