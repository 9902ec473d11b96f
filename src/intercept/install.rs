//! Registration facade: process-wide ambient network primitives.
//!
//! The crate keeps two ambient slots, a fetch-shaped [`HttpClient`] and a
//! factory for evented requests, that application code reaches through
//! [`fetch`] and [`new_request`]. Out of the box both slots hold the
//! reqwest-backed real-network implementations from [`crate::net`].
//!
//! [`register`] swaps interceptors into both slots, wrapped around whatever
//! was installed before, and returns a [`Registration`] whose
//! [`restore`](Registration::restore) puts the exact previous values back
//! (pointer identity, not just equivalent behavior). Ordinary application
//! code never observes the swap: non-matching traffic flows through to the
//! previous primitives unchanged.

use std::sync::{Arc, OnceLock};

use bytes::Bytes;
use http::Response;
use parking_lot::RwLock;
use tracing::debug;

use crate::archive::ArchiveSource;
use crate::dispatch::Dispatcher;
use crate::error::FetchError;
use crate::net::{ReqwestClient, ReqwestEventedRequest};

use super::fetch::{FetchInterceptor, FetchRequest, HttpClient};
use super::xhr::{EventedRequest, XhrInterceptor};

/// A shared handle to an installed fetch-shaped client.
pub type SharedHttpClient = Arc<dyn HttpClient>;

/// Constructor for evented requests, the ambient counterpart of an XHR
/// class; each call produces a fresh instance.
pub type EventedRequestFactory = Arc<dyn Fn() -> Box<dyn EventedRequest> + Send + Sync>;

fn fetch_slot() -> &'static RwLock<SharedHttpClient> {
    static SLOT: OnceLock<RwLock<SharedHttpClient>> = OnceLock::new();
    SLOT.get_or_init(|| RwLock::new(Arc::new(ReqwestClient::new())))
}

fn request_slot() -> &'static RwLock<EventedRequestFactory> {
    static SLOT: OnceLock<RwLock<EventedRequestFactory>> = OnceLock::new();
    SLOT.get_or_init(|| {
        // One shared connection pool for every default evented request
        let client = reqwest::Client::new();
        RwLock::new(Arc::new(move || {
            Box::new(ReqwestEventedRequest::with_client(client.clone()))
                as Box<dyn EventedRequest>
        }))
    })
}

/// The currently installed fetch-shaped client.
pub fn ambient_client() -> SharedHttpClient {
    fetch_slot().read().clone()
}

/// The currently installed evented-request factory.
pub fn ambient_request_factory() -> EventedRequestFactory {
    request_slot().read().clone()
}

/// Execute a request through the ambient client.
///
/// Accepts a plain address or a full [`FetchRequest`]; with interception
/// registered, `pmtiles://` GETs resolve from the archive and everything
/// else reaches the real network.
pub async fn fetch(request: impl Into<FetchRequest>) -> Result<Response<Bytes>, FetchError> {
    let client = ambient_client();
    client.execute(request.into()).await
}

/// Construct an evented request from the ambient factory.
pub fn new_request() -> Box<dyn EventedRequest> {
    let factory = ambient_request_factory();
    (factory.as_ref())()
}

/// Handle returned by [`register`]; restores the previous primitives.
///
/// Restoration is explicit: dropping the handle leaves the interceptors
/// installed for the remainder of the process, which is the common
/// deployment mode.
#[must_use = "dropping a Registration leaves the interceptors installed; call restore() to undo"]
pub struct Registration {
    previous_client: SharedHttpClient,
    previous_factory: EventedRequestFactory,
}

impl Registration {
    /// Reinstate the exact primitives that were installed before
    /// [`register`] was called.
    pub fn restore(self) {
        *fetch_slot().write() = self.previous_client;
        *request_slot().write() = self.previous_factory;
        debug!("pmtiles interception unregistered");
    }
}

/// Install interceptors for `source` as the ambient network primitives.
///
/// Both interceptors share one dispatcher (and therefore one reader
/// registry), so tile and metadata requests for the same archive hit the
/// same reader regardless of which primitive carried them.
///
/// Registering is meant to happen once at startup. Calling it again stacks
/// another interception layer around the current primitives; restores must
/// then happen in reverse order.
pub fn register<S: ArchiveSource + 'static>(source: S) -> Registration {
    let dispatcher = Arc::new(Dispatcher::new(source));

    let previous_client = {
        let mut slot = fetch_slot().write();
        let previous = slot.clone();
        *slot = Arc::new(FetchInterceptor::new(
            Arc::clone(&dispatcher),
            previous.clone(),
        ));
        previous
    };

    let previous_factory = {
        let mut slot = request_slot().write();
        let previous = slot.clone();
        let inner_factory = previous.clone();
        let dispatcher = Arc::clone(&dispatcher);
        *slot = Arc::new(move || {
            Box::new(XhrInterceptor::new(
                Arc::clone(&dispatcher),
                (inner_factory.as_ref())(),
            )) as Box<dyn EventedRequest>
        });
        previous
    };

    debug!("pmtiles interception registered");
    Registration {
        previous_client,
        previous_factory,
    }
}
