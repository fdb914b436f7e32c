//! In-process mock of the remote PDF service.
//!
//! One axum server plays both roles: the fixed API host (`/v1/auth`,
//! `/v1/start/{tool}`) and a processing node (`/v1/upload`, `/v1/process`,
//! `/v1/download/{task}`). Two instances can be chained with
//! [`Behavior::session_host`] so the start call pins tasks to a different
//! server. Every request is recorded for later assertions.

#![allow(dead_code)]

use axum::body::{Body, Bytes};
use axum::extract::{Multipart, Path, State};
use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use futures::StreamExt;
use pdftask::WorkflowConfig;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub const GOOD_KEY: &str = "project_public_good";

/// Body piece sent by [`Behavior::trickle_download`].
pub const TRICKLE_CHUNK: &[u8] = b"chunk;";

/// One request as the mock saw it.
#[derive(Debug, Clone)]
pub struct Recorded {
    /// `auth`, `start`, `upload`, `process` or `download`.
    pub step: &'static str,
    pub bearer: Option<String>,
    /// Task id the request referred to (or, for `start`, the one allocated).
    pub task: Option<String>,
    pub tool: Option<String>,
    pub body: Value,
}

/// Knobs for failure injection.
#[derive(Debug, Clone, Default)]
pub struct Behavior {
    /// Answer this step with this status instead of handling it.
    pub fail: Option<(&'static str, StatusCode)>,
    /// Answer this step with 200 and a body of the wrong shape.
    pub malformed: Option<&'static str>,
    /// Number of leading start requests answered with 503.
    pub transient_start_failures: usize,
    pub start_delay: Option<Duration>,
    /// Hold the upload request this long before reading it.
    pub upload_delay: Option<Duration>,
    /// Host returned by the start call; defaults to this server.
    pub session_host: Option<String>,
    /// Overrides the download filename returned by process.
    pub download_filename: Option<String>,
    /// Send the first download chunk, then break the connection.
    pub break_download: bool,
    /// Send the first download chunk, then go silent forever.
    pub stall_download: bool,
    /// Send the download as this many small chunks with this gap between them.
    pub trickle_download: Option<(usize, Duration)>,
}

pub struct MockState {
    pub requests: Mutex<Vec<Recorded>>,
    behavior: Mutex<Behavior>,
    host: String,
    next_id: AtomicUsize,
    start_failures: AtomicUsize,
    uploads: Mutex<HashMap<String, (String, Vec<u8>)>>,
}

impl MockState {
    fn record(&self, r: Recorded) {
        self.requests.lock().unwrap().push(r);
    }

    fn behavior(&self) -> Behavior {
        self.behavior.lock().unwrap().clone()
    }

    fn injected(&self, step: &str) -> Option<Response> {
        let b = self.behavior();
        if let Some((s, status)) = b.fail {
            if s == step {
                return Some((status, Json(json!({ "error": format!("{step} rejected") }))).into_response());
            }
        }
        if b.malformed == Some(step) {
            return Some((StatusCode::OK, Json(json!({ "unexpected": true }))).into_response());
        }
        None
    }

    fn id(&self) -> usize {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }
}

pub struct MockService {
    pub addr: SocketAddr,
    pub state: Arc<MockState>,
    handle: JoinHandle<()>,
}

impl Drop for MockService {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

impl MockService {
    pub async fn start(behavior: Behavior) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let state = Arc::new(MockState {
            requests: Mutex::new(Vec::new()),
            start_failures: AtomicUsize::new(behavior.transient_start_failures),
            behavior: Mutex::new(behavior),
            host: addr.to_string(),
            next_id: AtomicUsize::new(0),
            uploads: Mutex::new(HashMap::new()),
        });

        let app = Router::new()
            .route("/v1/auth", post(auth))
            .route("/v1/start/{tool}", get(start_task))
            .route("/v1/upload", post(upload))
            .route("/v1/process", post(process))
            .route("/v1/download/{task}", get(download))
            .with_state(state.clone());

        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            handle,
        }
    }

    pub fn host(&self) -> String {
        self.addr.to_string()
    }

    pub fn base_url(&self) -> String {
        format!("http://{}/v1/", self.addr)
    }

    /// A config pointed at this mock, with fast retries.
    pub fn config(&self, working: &std::path::Path, output: &std::path::Path) -> WorkflowConfig {
        self.config_with_key(GOOD_KEY, working, output)
    }

    pub fn config_with_key(
        &self,
        key: &str,
        working: &std::path::Path,
        output: &std::path::Path,
    ) -> WorkflowConfig {
        WorkflowConfig::builder()
            .public_key(key)
            .base_url(self.base_url())
            .session_scheme("http")
            .working_dir(working)
            .output_dir(output)
            .retry_backoff_ms(10)
            .request_timeout_secs(10)
            .build()
            .unwrap()
    }

    pub fn recorded(&self) -> Vec<Recorded> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn steps(&self) -> Vec<&'static str> {
        self.recorded().iter().map(|r| r.step).collect()
    }

    pub fn count(&self, step: &str) -> usize {
        self.recorded().iter().filter(|r| r.step == step).count()
    }
}

fn bearer(headers: &HeaderMap) -> Option<String> {
    headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string)
}

fn unauthorized() -> Response {
    (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid token" }))).into_response()
}

async fn auth(State(state): State<Arc<MockState>>, Json(body): Json<Value>) -> Response {
    state.record(Recorded {
        step: "auth",
        bearer: None,
        task: None,
        tool: None,
        body: body.clone(),
    });
    if let Some(resp) = state.injected("auth") {
        return resp;
    }
    if body["public_key"] != GOOD_KEY {
        return (StatusCode::UNAUTHORIZED, Json(json!({ "error": "invalid public key" }))).into_response();
    }
    Json(json!({ "token": format!("token-{}", state.id()) })).into_response()
}

async fn start_task(
    State(state): State<Arc<MockState>>,
    Path(tool): Path<String>,
    headers: HeaderMap,
) -> Response {
    let token = bearer(&headers);
    let behavior = state.behavior();
    if let Some(delay) = behavior.start_delay {
        tokio::time::sleep(delay).await;
    }

    let injected = state.injected("start");
    let transient = injected.is_none()
        && state
            .start_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
    let task = (injected.is_none() && !transient && token.is_some())
        .then(|| format!("task-{}", state.id()));

    state.record(Recorded {
        step: "start",
        bearer: token.clone(),
        task: task.clone(),
        tool: Some(tool),
        body: Value::Null,
    });

    if let Some(resp) = injected {
        return resp;
    }
    if transient {
        return (StatusCode::SERVICE_UNAVAILABLE, "no capacity").into_response();
    }
    let Some(task) = task else {
        return unauthorized();
    };
    let server = behavior.session_host.unwrap_or_else(|| state.host.clone());
    Json(json!({ "server": server, "task": task })).into_response()
}

async fn upload(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Response {
    if let Some(delay) = state.behavior().upload_delay {
        tokio::time::sleep(delay).await;
    }
    let mut task = None;
    let mut file: Option<(String, Vec<u8>)> = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some("task") => task = field.text().await.ok(),
            Some("file") => {
                let name = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map(|b| b.to_vec()).unwrap_or_default();
                file = Some((name, bytes));
            }
            _ => {}
        }
    }

    state.record(Recorded {
        step: "upload",
        bearer: bearer(&headers),
        task: task.clone(),
        tool: None,
        body: json!({ "filename": file.as_ref().map(|f| f.0.clone()) }),
    });
    if let Some(resp) = state.injected("upload") {
        return resp;
    }
    if bearer(&headers).is_none() {
        return unauthorized();
    }
    let (Some(task), Some((_, bytes))) = (task, file) else {
        return (StatusCode::BAD_REQUEST, "missing task or file").into_response();
    };

    let server_filename = format!("srv-{task}.bin");
    state
        .uploads
        .lock()
        .unwrap()
        .insert(task, (server_filename.clone(), bytes));
    Json(json!({ "server_filename": server_filename })).into_response()
}

async fn process(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let task = body["task"].as_str().map(str::to_string);
    state.record(Recorded {
        step: "process",
        bearer: bearer(&headers),
        task: task.clone(),
        tool: body["tool"].as_str().map(str::to_string),
        body: body.clone(),
    });
    if let Some(resp) = state.injected("process") {
        return resp;
    }

    let file = &body["files"][0];
    let uploads = state.uploads.lock().unwrap();
    let Some((server_filename, bytes)) = task.as_ref().and_then(|t| uploads.get(t)) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unknown task" }))).into_response();
    };
    if file["server_filename"] != server_filename.as_str() {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "unknown server_filename" }))).into_response();
    }

    let download_filename = state
        .behavior()
        .download_filename
        .unwrap_or_else(|| file["filename"].as_str().unwrap_or("output.pdf").to_string());
    Json(json!({
        "download_filename": download_filename,
        "filesize": bytes.len(),
        "output_filesize": bytes.len() + "compressed:".len(),
        "output_filenumber": 1,
        "output_extensions": "[\"pdf\"]",
        "timer": "0.010",
        "status": "TaskSuccess"
    }))
    .into_response()
}

async fn download(
    State(state): State<Arc<MockState>>,
    Path(task): Path<String>,
    headers: HeaderMap,
) -> Response {
    state.record(Recorded {
        step: "download",
        bearer: bearer(&headers),
        task: Some(task.clone()),
        tool: None,
        body: Value::Null,
    });
    if let Some(resp) = state.injected("download") {
        return resp;
    }

    let behavior = state.behavior();
    if behavior.break_download {
        let chunks: Vec<Result<Bytes, std::io::Error>> = vec![
            Ok(Bytes::from_static(b"partial bytes")),
            Err(std::io::Error::other("connection lost")),
        ];
        return Response::new(Body::from_stream(futures::stream::iter(chunks)));
    }
    if behavior.stall_download {
        let first: Vec<Result<Bytes, std::io::Error>> = vec![Ok(Bytes::from_static(b"partial"))];
        let stalled = futures::stream::iter(first).chain(futures::stream::pending());
        return Response::new(Body::from_stream(stalled));
    }
    if let Some((count, gap)) = behavior.trickle_download {
        let chunks = futures::stream::unfold(0usize, move |i| async move {
            if i == count {
                return None;
            }
            if i > 0 {
                tokio::time::sleep(gap).await;
            }
            Some((Ok::<_, std::io::Error>(Bytes::from_static(TRICKLE_CHUNK)), i + 1))
        });
        return Response::new(Body::from_stream(chunks));
    }

    let uploads = state.uploads.lock().unwrap();
    let Some((_, bytes)) = uploads.get(&task) else {
        return (StatusCode::NOT_FOUND, "unknown task").into_response();
    };
    let mut out = b"compressed:".to_vec();
    out.extend_from_slice(bytes);
    out.into_response()
}

/// Write `contents` to `dir/name` and return the path.
pub fn write_input(dir: &std::path::Path, name: &str, contents: &[u8]) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).unwrap();
    path
}

/// Names of all entries in `dir`, hidden ones included.
pub fn dir_entries(dir: &std::path::Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
