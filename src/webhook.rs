//! Notification receiver.
//!
//! A placeholder for the service's asynchronous completion callbacks: one
//! route, `/listen`, that accepts any method and any body, logs that a
//! delivery arrived, and answers `200 OK`. Nothing is validated or acted on,
//! and the workflow does not ask the service to call it.

use axum::body::Bytes;
use axum::http::{Method, StatusCode, Uri};
use axum::routing::any;
use axum::Router;
use tokio::net::TcpListener;
use tracing::info;

/// Path the receiver listens on.
pub const LISTEN_PATH: &str = "/listen";

/// Router with the single `/listen` route.
pub fn router() -> Router {
    Router::new().route(LISTEN_PATH, any(receive))
}

async fn receive(method: Method, uri: Uri, body: Bytes) -> StatusCode {
    info!("Notification received: {} {} ({} bytes)", method, uri, body.len());
    StatusCode::OK
}

/// Serve [`router`] on `listener` until `shutdown` resolves.
pub async fn serve(
    listener: TcpListener,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> std::io::Result<()> {
    if let Ok(addr) = listener.local_addr() {
        info!("Notification receiver listening on http://{}{}", addr, LISTEN_PATH);
    }
    axum::serve(listener, router())
        .with_graceful_shutdown(shutdown)
        .await
}
