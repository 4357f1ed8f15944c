//! Test doubles shared by unit and integration tests

use async_trait::async_trait;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, Uri};
use axum::response::Response;
use axum::Router;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use url::Url;

use crate::core::handoff::LinkHandoff;
use crate::core::metadata::{MetadataResolver, ResolvedMetadata};
use crate::core::models::{AppError, AppResult, HandoffReceipt, VideoQuality, VideoRequest};
use crate::core::swarm::{SwarmRequest, SwarmTransport, TransportResponse};

pub const SAMPLE_URL: &str = "https://youtu.be/dQw4w9WgXcQ";
pub const SAMPLE_ID: &str = "dQw4w9WgXcQ";

pub fn sample_request(quality: VideoQuality) -> VideoRequest {
    VideoRequest {
        id: SAMPLE_ID.to_string(),
        source_url: SAMPLE_URL.to_string(),
        desired_quality: quality,
    }
}

pub fn endpoints(n: usize) -> Vec<String> {
    (1..=n)
        .map(|i| format!("https://node{}.test/api/json", i))
        .collect()
}

// ---------------------------------------------------------------------------
// Swarm transport
// ---------------------------------------------------------------------------

/// Scripted answer to one request
#[derive(Debug, Clone)]
pub enum Reply {
    Json(u16, serde_json::Value),
    Raw(u16, String),
    Network,
    Timeout,
    /// Never answers
    Stall,
    /// Local failure the session cannot recover from
    Broken,
}

impl Reply {
    pub fn status(code: u16) -> Self {
        Reply::Raw(code, format!("HTTP {}", code))
    }

    pub fn link(url: &str) -> Self {
        Reply::Json(200, serde_json::json!({ "status": "stream", "url": url }))
    }
}

/// Primary and safe-mode answers for one endpoint
#[derive(Debug, Clone)]
pub struct NodeScript {
    pub primary: Reply,
    pub safe: Reply,
}

impl NodeScript {
    pub fn new(primary: Reply, safe: Reply) -> Self {
        Self { primary, safe }
    }

    pub fn failing(code: u16) -> Self {
        Self::new(Reply::status(code), Reply::status(code))
    }

    pub fn serving(url: &str) -> Self {
        Self::new(Reply::link(url), Reply::status(500))
    }
}

#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub endpoint: String,
    pub request: SwarmRequest,
    pub timeout: Duration,
}

enum Scripts {
    /// N-th distinct endpoint contacted gets the N-th script
    ByOrder(Vec<NodeScript>),
    ByEndpoint(HashMap<String, NodeScript>),
}

/// Transport that answers from a script and records every call
pub struct ScriptedTransport {
    scripts: Scripts,
    contacted: Mutex<Vec<String>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl ScriptedTransport {
    pub fn by_order(scripts: Vec<NodeScript>) -> Self {
        Self::with_scripts(Scripts::ByOrder(scripts))
    }

    pub fn by_endpoint(scripts: HashMap<String, NodeScript>) -> Self {
        Self::with_scripts(Scripts::ByEndpoint(scripts))
    }

    fn with_scripts(scripts: Scripts) -> Self {
        Self {
            scripts,
            contacted: Mutex::new(Vec::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Distinct endpoints in first-contact order
    pub fn contacted(&self) -> Vec<String> {
        self.contacted.lock().unwrap().clone()
    }

    pub fn safe_mode_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| c.request.is_safe_mode())
            .count()
    }

    fn script_for(&self, endpoint: &str) -> Option<NodeScript> {
        let mut contacted = self.contacted.lock().unwrap();
        let position = match contacted.iter().position(|e| e == endpoint) {
            Some(position) => position,
            None => {
                contacted.push(endpoint.to_string());
                contacted.len() - 1
            }
        };

        match &self.scripts {
            Scripts::ByOrder(scripts) => scripts.get(position).cloned(),
            Scripts::ByEndpoint(scripts) => scripts.get(endpoint).cloned(),
        }
    }
}

#[async_trait]
impl SwarmTransport for ScriptedTransport {
    async fn post_json(
        &self,
        endpoint: &Url,
        request: &SwarmRequest,
        timeout: Duration,
    ) -> AppResult<TransportResponse> {
        let key = endpoint.to_string();
        self.calls.lock().unwrap().push(RecordedCall {
            endpoint: key.clone(),
            request: request.clone(),
            timeout,
        });

        let script = self
            .script_for(&key)
            .unwrap_or_else(|| NodeScript::failing(500));
        let reply = if request.is_safe_mode() {
            script.safe
        } else {
            script.primary
        };

        match reply {
            Reply::Json(status, value) => Ok(TransportResponse::new(status, value.to_string())),
            Reply::Raw(status, body) => Ok(TransportResponse::new(status, body)),
            Reply::Network => Err(AppError::NetworkFailure {
                message: "connection refused".to_string(),
                timed_out: false,
            }),
            Reply::Timeout => Err(AppError::NetworkFailure {
                message: "operation timed out".to_string(),
                timed_out: true,
            }),
            Reply::Stall => std::future::pending().await,
            Reply::Broken => Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::OutOfMemory,
                "request buffer could not be allocated",
            ))),
        }
    }
}

// ---------------------------------------------------------------------------
// Metadata and hand-off
// ---------------------------------------------------------------------------

pub struct RecordingResolver {
    result: ResolvedMetadata,
    calls: AtomicUsize,
}

impl RecordingResolver {
    pub fn new(result: ResolvedMetadata) -> Self {
        Self {
            result,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn titled(title: &str) -> Self {
        Self::new(ResolvedMetadata {
            title: Some(title.to_string()),
            description: Some("by Someone".to_string()),
            ..ResolvedMetadata::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MetadataResolver for RecordingResolver {
    async fn resolve(&self, _video_id: &str, _url: &str) -> ResolvedMetadata {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.result.clone()
    }
}

#[derive(Default)]
pub struct RecordingHandoff {
    urls: Mutex<Vec<String>>,
    fail: bool,
}

impl RecordingHandoff {
    pub fn failing() -> Self {
        Self {
            urls: Mutex::new(Vec::new()),
            fail: true,
        }
    }

    pub fn urls(&self) -> Vec<String> {
        self.urls.lock().unwrap().clone()
    }
}

#[async_trait]
impl LinkHandoff for RecordingHandoff {
    async fn hand_off(&self, download_url: &str, _request: &VideoRequest) -> AppResult<HandoffReceipt> {
        self.urls.lock().unwrap().push(download_url.to_string());
        if self.fail {
            return Err(AppError::Io(std::io::Error::new(
                std::io::ErrorKind::PermissionDenied,
                "output directory is read-only",
            )));
        }
        Ok(HandoffReceipt::Announced {
            url: download_url.to_string(),
        })
    }
}

// ---------------------------------------------------------------------------
// Loopback HTTP responder (axum)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    /// Drop the connection after the body instead of finishing the message
    pub truncated: bool,
}

impl CannedResponse {
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self::status(200, body)
    }

    pub fn status(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
            truncated: false,
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }

    pub fn truncated(mut self) -> Self {
        self.truncated = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Clone)]
struct ResponderState {
    response: CannedResponse,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
}

/// Loopback server answering every request with the same response
pub struct TestServer {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<CapturedRequest>>>,
    task: tokio::task::JoinHandle<()>,
}

impl TestServer {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn requests(&self) -> Vec<CapturedRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

pub async fn spawn_http_responder(response: CannedResponse) -> TestServer {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let requests = Arc::new(Mutex::new(Vec::new()));

    let router = Router::new().fallback(respond).with_state(ResponderState {
        response,
        requests: requests.clone(),
    });
    let task = tokio::spawn(async move {
        let _ = axum::serve(listener, router).await;
    });

    TestServer {
        addr,
        requests,
        task,
    }
}

async fn respond(
    State(state): State<ResponderState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.requests.lock().unwrap().push(CapturedRequest {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        content_type: headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
        body: String::from_utf8_lossy(&body).into_owned(),
    });

    let canned = state.response;
    let mut builder = Response::builder().status(canned.status);
    for (name, value) in &canned.headers {
        builder = builder.header(name.as_str(), value.as_str());
    }

    let body = if canned.truncated {
        let first = canned.body;
        let chunks = futures_util::stream::unfold(0u8, move |step| {
            let first = first.clone();
            async move {
                match step {
                    0 => Some((Ok(Bytes::from(first)), 1)),
                    1 => {
                        // Let the first chunk reach the client before the reset
                        tokio::time::sleep(Duration::from_millis(50)).await;
                        let reset = std::io::Error::new(
                            std::io::ErrorKind::ConnectionReset,
                            "connection dropped mid-body",
                        );
                        Some((Err(reset), 2))
                    }
                    _ => None,
                }
            }
        });
        Body::from_stream(chunks)
    } else {
        Body::from(canned.body)
    };

    builder.body(body).unwrap()
}
