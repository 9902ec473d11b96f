//! Test utilities for integration tests.
//!
//! This module provides mock archive sources/readers and recording
//! implementations of the two network primitives.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use tokio::sync::Notify;

use pmtiles_protocol::error::{ArchiveError, FetchError};
use pmtiles_protocol::{
    ArchiveHeader, ArchiveReader, ArchiveSource, EventCallback, EventKind, EventedRequest,
    FetchRequest, HttpClient,
};

/// Install a test subscriber once per process; respects `RUST_LOG`.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

// =============================================================================
// Mock Archive Source / Reader
// =============================================================================

/// Configurable mock archive source with call tracking.
///
/// Every reader opened by this source shares the same tile table and
/// metadata document; opens, tile lookups, and the self-URLs passed to
/// metadata lookups are all recorded for assertions.
pub struct MockArchiveSource {
    tiles: HashMap<(u32, u32, u32), Bytes>,
    tile_type: u8,
    metadata: serde_json::Value,
    fail_open: bool,
    fail_tile: bool,
    /// Tile lookups block on this gate until the test releases it
    gate: Option<Arc<Notify>>,
    open_count: Arc<AtomicUsize>,
    opened: Arc<Mutex<Vec<String>>>,
    metadata_urls: Arc<Mutex<Vec<String>>>,
}

impl MockArchiveSource {
    pub fn new() -> Self {
        Self {
            tiles: HashMap::new(),
            tile_type: 1,
            metadata: serde_json::json!({ "tilejson": "3.0.0", "name": "mock" }),
            fail_open: false,
            fail_tile: false,
            gate: None,
            open_count: Arc::new(AtomicUsize::new(0)),
            opened: Arc::new(Mutex::new(Vec::new())),
            metadata_urls: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_tile(mut self, z: u32, x: u32, y: u32, data: &[u8]) -> Self {
        self.tiles.insert((z, x, y), Bytes::copy_from_slice(data));
        self
    }

    pub fn with_tile_type(mut self, tile_type: u8) -> Self {
        self.tile_type = tile_type;
        self
    }

    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn failing_open(mut self) -> Self {
        self.fail_open = true;
        self
    }

    pub fn failing_tile(mut self) -> Self {
        self.fail_tile = true;
        self
    }

    pub fn with_gate(mut self, gate: Arc<Notify>) -> Self {
        self.gate = Some(gate);
        self
    }

    /// Handle for observing opens after the source has been moved into a
    /// dispatcher.
    pub fn opened_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.opened.clone()
    }

    pub fn open_count_handle(&self) -> Arc<AtomicUsize> {
        self.open_count.clone()
    }

    pub fn metadata_urls_handle(&self) -> Arc<Mutex<Vec<String>>> {
        self.metadata_urls.clone()
    }
}

pub struct MockReader {
    tiles: HashMap<(u32, u32, u32), Bytes>,
    tile_type: u8,
    metadata: serde_json::Value,
    fail_tile: bool,
    gate: Option<Arc<Notify>>,
    metadata_urls: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ArchiveReader for MockReader {
    async fn tile(&self, z: u32, x: u32, y: u32) -> Result<Option<Bytes>, ArchiveError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        if self.fail_tile {
            return Err(ArchiveError::Malformed("tile decode failed".to_string()));
        }
        Ok(self.tiles.get(&(z, x, y)).cloned())
    }

    async fn tile_json(&self, self_url: &str) -> Result<serde_json::Value, ArchiveError> {
        self.metadata_urls.lock().unwrap().push(self_url.to_string());
        Ok(self.metadata.clone())
    }

    async fn header(&self) -> Result<ArchiveHeader, ArchiveError> {
        Ok(ArchiveHeader {
            tile_type: self.tile_type,
        })
    }
}

#[async_trait]
impl ArchiveSource for MockArchiveSource {
    type Reader = MockReader;

    async fn open(&self, base_url: &str) -> Result<Self::Reader, ArchiveError> {
        if self.fail_open {
            return Err(ArchiveError::NotFound(base_url.to_string()));
        }
        self.open_count.fetch_add(1, Ordering::SeqCst);
        self.opened.lock().unwrap().push(base_url.to_string());
        Ok(MockReader {
            tiles: self.tiles.clone(),
            tile_type: self.tile_type,
            metadata: self.metadata.clone(),
            fail_tile: self.fail_tile,
            gate: self.gate.clone(),
            metadata_urls: self.metadata_urls.clone(),
        })
    }
}

// =============================================================================
// Recording HTTP Client (fetch primitive)
// =============================================================================

/// Inner client that records every forwarded request and answers with a
/// recognizable canned response.
pub struct RecordingHttpClient {
    requests: Arc<Mutex<Vec<FetchRequest>>>,
    fail: bool,
}

/// Marker header set on every canned upstream response.
pub const UPSTREAM_MARKER: &str = "x-mock-upstream";

impl RecordingHttpClient {
    pub fn new() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            requests: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }
    }

    pub fn requests_handle(&self) -> Arc<Mutex<Vec<FetchRequest>>> {
        self.requests.clone()
    }
}

#[async_trait]
impl HttpClient for RecordingHttpClient {
    async fn execute(&self, request: FetchRequest) -> Result<Response<Bytes>, FetchError> {
        self.requests.lock().unwrap().push(request.clone());
        if self.fail {
            return Err(FetchError::Upstream("mock upstream failure".to_string()));
        }
        Ok(Response::builder()
            .status(StatusCode::OK)
            .header(UPSTREAM_MARKER, "true")
            .body(Bytes::from_static(b"upstream"))?)
    }
}

// =============================================================================
// Recording Evented Request (XHR primitive)
// =============================================================================

/// Inner evented request that logs calls and serves fixed property values,
/// standing in for the real implementation on the passthrough path.
pub struct RecordingEventedRequest {
    log: Arc<Mutex<Vec<String>>>,
    status: Option<StatusCode>,
    onload: Option<EventCallback>,
    onerror: Option<EventCallback>,
}

impl RecordingEventedRequest {
    pub fn new(log: Arc<Mutex<Vec<String>>>) -> Self {
        Self {
            log,
            status: None,
            onload: None,
            onerror: None,
        }
    }

    /// A request whose own `status` property is already populated, for
    /// fallback-read assertions.
    pub fn with_status(log: Arc<Mutex<Vec<String>>>, status: StatusCode) -> Self {
        Self {
            log,
            status: Some(status),
            onload: None,
            onerror: None,
        }
    }
}

impl EventedRequest for RecordingEventedRequest {
    fn open(&mut self, method: Method, url: &str) {
        self.log.lock().unwrap().push(format!("open {method} {url}"));
    }

    fn send(&mut self, body: Option<Bytes>) {
        self.log
            .lock()
            .unwrap()
            .push(format!("send {}", body.map(|b| b.len()).unwrap_or(0)));
    }

    fn add_event_listener(&mut self, kind: EventKind, _callback: EventCallback) {
        self.log.lock().unwrap().push(format!("listen {kind:?}"));
    }

    fn set_onload(&mut self, callback: Option<EventCallback>) {
        self.log.lock().unwrap().push("set_onload".to_string());
        self.onload = callback;
    }

    fn set_onerror(&mut self, callback: Option<EventCallback>) {
        self.log.lock().unwrap().push("set_onerror".to_string());
        self.onerror = callback;
    }

    fn onload(&self) -> Option<EventCallback> {
        self.onload.clone()
    }

    fn onerror(&self) -> Option<EventCallback> {
        self.onerror.clone()
    }

    fn status(&self) -> Option<StatusCode> {
        self.status
    }

    fn response(&self) -> Option<Bytes> {
        None
    }

    fn response_text(&self) -> Option<String> {
        None
    }
}
