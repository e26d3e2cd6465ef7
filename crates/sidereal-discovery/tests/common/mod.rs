//! Common test utilities for discovery integration tests.

#![allow(dead_code)]

pub mod fixtures;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use sidereal_discovery::{DiscoveryConfig, HttpDiscoveryAnnouncementClient, HttpDiscoveryLookupClient};
use sidereal_node::NodeInfo;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;

/// A request the fake registry received.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: Method,
    pub path: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl RecordedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap()
    }
}

/// Response the fake registry sends for a route.
#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: StatusCode,
    pub headers: Vec<(&'static str, String)>,
    pub body: String,
}

impl CannedResponse {
    pub fn status(status: StatusCode) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: String::new(),
        }
    }

    pub fn json(value: &serde_json::Value) -> Self {
        Self {
            status: StatusCode::OK,
            headers: vec![("content-type", "application/json".to_owned())],
            body: value.to_string(),
        }
    }

    pub fn with_header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    fn to_response(&self) -> Response {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.headers {
            headers.append(
                HeaderName::from_static(name),
                HeaderValue::from_str(value).unwrap(),
            );
        }
        (self.status, headers, self.body.clone()).into_response()
    }
}

#[derive(Debug)]
struct RegistryState {
    requests: Mutex<Vec<RecordedRequest>>,
    lookup: Mutex<CannedResponse>,
    announcement: Mutex<CannedResponse>,
}

/// Minimal discovery registry served over real HTTP on a loopback port.
///
/// Lookups (`/v1/service/...`) and announcements (`/v1/announcement/...`)
/// each answer with a configurable canned response; every request is recorded.
pub struct FakeRegistry {
    pub addr: SocketAddr,
    state: Arc<RegistryState>,
    server: JoinHandle<()>,
}

impl FakeRegistry {
    pub async fn start() -> Self {
        init_tracing();
        let state = Arc::new(RegistryState {
            requests: Mutex::new(Vec::new()),
            lookup: Mutex::new(CannedResponse::status(StatusCode::NOT_FOUND)),
            announcement: Mutex::new(CannedResponse::status(StatusCode::ACCEPTED)),
        });

        let app = Router::new().fallback(handle).with_state(Arc::clone(&state));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            addr,
            state,
            server,
        }
    }

    pub fn uri(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn respond_to_lookups(&self, response: CannedResponse) {
        *self.state.lookup.lock().unwrap() = response;
    }

    pub fn respond_to_announcements(&self, response: CannedResponse) {
        *self.state.announcement.lock().unwrap() = response;
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().unwrap().clone()
    }

    pub fn requests_with(&self, method: &Method) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|request| &request.method == method)
            .collect()
    }

    pub fn lookup_client(&self, node: Arc<NodeInfo>) -> HttpDiscoveryLookupClient {
        HttpDiscoveryLookupClient::new(&DiscoveryConfig::with_uri(self.uri()), node).unwrap()
    }

    pub fn announcement_client(&self, node: Arc<NodeInfo>) -> HttpDiscoveryAnnouncementClient {
        HttpDiscoveryAnnouncementClient::new(&DiscoveryConfig::with_uri(self.uri()), node).unwrap()
    }
}

impl Drop for FakeRegistry {
    fn drop(&mut self) {
        self.server.abort();
    }
}

async fn handle(
    State(state): State<Arc<RegistryState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path().to_owned();
    state.requests.lock().unwrap().push(RecordedRequest {
        method,
        path: path.clone(),
        headers,
        body,
    });

    let canned = if path.starts_with("/v1/service/") {
        state.lookup.lock().unwrap().clone()
    } else if path.starts_with("/v1/announcement/") {
        state.announcement.lock().unwrap().clone()
    } else {
        return StatusCode::NOT_FOUND.into_response();
    };
    canned.to_response()
}

/// Route crate logs to the test harness; `RUST_LOG` picks the level.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Address nothing is listening on.
pub async fn closed_port_uri() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}")
}
