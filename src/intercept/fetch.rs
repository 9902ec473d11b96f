//! Fetch-style interception: the future-shaped network primitive.
//!
//! [`HttpClient`] is the capability surface of the ambient fetch function:
//! one async call, one eventual [`http::Response`]. [`FetchInterceptor`]
//! implements that same surface around an inner client, so it installs as a
//! drop-in replacement: `pmtiles://` GETs are answered from the archive via
//! the dispatcher, everything else is forwarded to the inner client verbatim
//! and its result or failure returned unchanged.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use http::header::CONTENT_TYPE;
use http::{HeaderMap, Method, Response, StatusCode};
use tracing::debug;

use crate::archive::ArchiveSource;
use crate::dispatch::{Dispatcher, Outcome};
use crate::error::FetchError;
use crate::scheme;

// =============================================================================
// Request Shape
// =============================================================================

/// An outgoing request as the fetch primitive sees it.
///
/// The address is kept as a plain string rather than a parsed URI: custom
/// scheme addresses such as `pmtiles://https://host/a.pmtiles` are not valid
/// RFC 3986 URIs and must survive untouched until classification. Plain
/// addresses convert directly (`"https://…".into()`) and default to GET.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    /// Request method
    pub method: Method,
    /// Request address, uninterpreted
    pub url: String,
    /// Request headers, forwarded on pass-through
    pub headers: HeaderMap,
    /// Optional request body, forwarded on pass-through
    pub body: Option<Bytes>,
}

impl FetchRequest {
    /// Create a request with the given method and address.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    /// Create a GET request for the given address.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }
}

impl From<&str> for FetchRequest {
    fn from(url: &str) -> Self {
        FetchRequest::get(url)
    }
}

impl From<String> for FetchRequest {
    fn from(url: String) -> Self {
        FetchRequest::get(url)
    }
}

// =============================================================================
// Client Trait
// =============================================================================

/// The fetch-shaped network primitive: one request in, one awaited response
/// out.
///
/// Implemented by the real-network backend ([`crate::net::ReqwestClient`])
/// and by [`FetchInterceptor`] itself, which is what makes the interceptor
/// installable wherever a client is expected.
#[async_trait]
pub trait HttpClient: Send + Sync {
    /// Execute the request and resolve to its response.
    async fn execute(&self, request: FetchRequest) -> Result<Response<Bytes>, FetchError>;
}

// =============================================================================
// Interceptor
// =============================================================================

/// Wraps an [`HttpClient`], rerouting `pmtiles://` GETs to the dispatcher.
pub struct FetchInterceptor<S: ArchiveSource> {
    dispatcher: Arc<Dispatcher<S>>,
    inner: Arc<dyn HttpClient>,
}

impl<S: ArchiveSource> FetchInterceptor<S> {
    /// Create an interceptor routing through `dispatcher`, forwarding
    /// everything else to `inner`.
    pub fn new(dispatcher: Arc<Dispatcher<S>>, inner: Arc<dyn HttpClient>) -> Self {
        Self { dispatcher, inner }
    }

    /// The wrapped client.
    pub fn inner(&self) -> &Arc<dyn HttpClient> {
        &self.inner
    }

    async fn intercept(&self, url: &str) -> Result<Response<Bytes>, FetchError> {
        let classified = scheme::classify(&scheme::normalize(url));
        debug!(
            base_url = %classified.base_url,
            tile = classified.coord.is_some(),
            "intercepted pmtiles request"
        );

        let outcome = self
            .dispatcher
            .dispatch(&classified.base_url, classified.coord)
            .await?;

        let response = match outcome {
            Outcome::NotFound => Response::builder()
                .status(StatusCode::NOT_FOUND)
                .body(Bytes::new())?,
            Outcome::Tile { data, content_type } => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, content_type)
                .body(data)?,
            Outcome::Metadata(document) => Response::builder()
                .status(StatusCode::OK)
                .header(CONTENT_TYPE, "application/json")
                .body(Bytes::from(serde_json::to_vec(&document)?))?,
        };
        Ok(response)
    }
}

#[async_trait]
impl<S: ArchiveSource> HttpClient for FetchInterceptor<S> {
    async fn execute(&self, request: FetchRequest) -> Result<Response<Bytes>, FetchError> {
        // Anything that is not a custom-scheme GET belongs to the real
        // network layer, untouched.
        if request.method != Method::GET || !scheme::is_pmtiles_url(&request.url) {
            return self.inner.execute(request).await;
        }
        self.intercept(&request.url).await
    }
}
