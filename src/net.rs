//! Real-network backends for the two primitives.
//!
//! These are the defaults the ambient slots start with, so passed-through
//! traffic genuinely reaches the network: [`ReqwestClient`] implements the
//! fetch-shaped [`HttpClient`] and [`ReqwestEventedRequest`] implements the
//! evented surface, both over a shared [`reqwest::Client`].
//!
//! Both require an ambient tokio runtime (the evented backend spawns its
//! request task on it).

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::{Method, Response, StatusCode};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::error::FetchError;
use crate::intercept::fetch::{FetchRequest, HttpClient};
use crate::intercept::xhr::{EventCallback, EventKind, EventedRequest, EventedState, ProgressEvent};

// =============================================================================
// Fetch Backend
// =============================================================================

/// Fetch-shaped client over reqwest.
pub struct ReqwestClient {
    client: reqwest::Client,
}

impl ReqwestClient {
    /// Create a client with default reqwest configuration.
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    /// Create a client over an existing [`reqwest::Client`], sharing its
    /// connection pool and configuration.
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpClient for ReqwestClient {
    async fn execute(&self, request: FetchRequest) -> Result<Response<Bytes>, FetchError> {
        let url = url::Url::parse(&request.url)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {e}", request.url)))?;

        let mut builder = self
            .client
            .request(request.method, url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        let mut out = Response::new(body);
        *out.status_mut() = status;
        *out.headers_mut() = headers;
        Ok(out)
    }
}

// =============================================================================
// Evented Backend
// =============================================================================

/// Evented request over reqwest.
///
/// `open` records the target, `send` spawns the request; completion fills
/// the property values and flushes load/error events exactly like the
/// intercepted path, so callers cannot tell the two apart structurally.
pub struct ReqwestEventedRequest {
    client: reqwest::Client,
    target: Option<(Method, String)>,
    shared: Arc<Mutex<EventedState>>,
}

impl ReqwestEventedRequest {
    /// Create a request with default reqwest configuration.
    pub fn new() -> Self {
        Self::with_client(reqwest::Client::new())
    }

    /// Create a request over an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client) -> Self {
        Self {
            client,
            target: None,
            shared: Arc::new(Mutex::new(EventedState::new())),
        }
    }
}

impl Default for ReqwestEventedRequest {
    fn default() -> Self {
        Self::new()
    }
}

impl EventedRequest for ReqwestEventedRequest {
    fn open(&mut self, method: Method, url: &str) {
        self.shared.lock().clear_result();
        self.target = Some((method, url.to_string()));
    }

    fn send(&mut self, body: Option<Bytes>) {
        let Some((method, url)) = self.target.clone() else {
            warn!("send called before open; ignored");
            return;
        };

        let client = self.client.clone();
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            let result = async {
                let url = url::Url::parse(&url)
                    .map_err(|e| FetchError::InvalidUrl(format!("{url}: {e}")))?;
                let mut builder = client.request(method, url);
                if let Some(body) = body {
                    builder = builder.body(body);
                }
                let response = builder
                    .send()
                    .await
                    .map_err(|e| FetchError::Upstream(e.to_string()))?;
                let status = response.status();
                let bytes = response
                    .bytes()
                    .await
                    .map_err(|e| FetchError::Upstream(e.to_string()))?;
                Ok::<(StatusCode, Bytes), FetchError>((status, bytes))
            }
            .await;

            match result {
                Ok((status, bytes)) => {
                    let (event, callbacks) = {
                        let mut state = shared.lock();
                        state.status = Some(status);
                        state.response_text =
                            std::str::from_utf8(&bytes).ok().map(str::to_string);
                        state.response = Some(bytes);
                        (ProgressEvent::load(), state.callbacks_for(EventKind::Load))
                    };
                    for callback in &callbacks {
                        callback(&event);
                    }
                }
                Err(err) => {
                    error!(error = %err, "network request failed");
                    let (event, callbacks) = {
                        let state = shared.lock();
                        (ProgressEvent::error(), state.callbacks_for(EventKind::Error))
                    };
                    for callback in &callbacks {
                        callback(&event);
                    }
                }
            }
        });
    }

    fn add_event_listener(&mut self, kind: EventKind, callback: EventCallback) {
        self.shared.lock().listeners.push((kind, callback));
    }

    fn set_onload(&mut self, callback: Option<EventCallback>) {
        self.shared.lock().onload = callback;
    }

    fn set_onerror(&mut self, callback: Option<EventCallback>) {
        self.shared.lock().onerror = callback;
    }

    fn onload(&self) -> Option<EventCallback> {
        self.shared.lock().onload.clone()
    }

    fn onerror(&self) -> Option<EventCallback> {
        self.shared.lock().onerror.clone()
    }

    fn status(&self) -> Option<StatusCode> {
        self.shared.lock().status
    }

    fn response(&self) -> Option<Bytes> {
        self.shared.lock().response.clone()
    }

    fn response_text(&self) -> Option<String> {
        self.shared.lock().response_text.clone()
    }
}
