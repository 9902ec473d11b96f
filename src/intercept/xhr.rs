//! Evented (XHR-style) interception: the callback-shaped network primitive.
//!
//! The evented surface has a very different contract from fetch: callers
//! construct an instance, `open` it with a method and URL, optionally attach
//! load/error callbacks, `send` it, and later read `status` / `response` /
//! `response_text` as plain properties. Completion is signaled through
//! events, out of line with the call that triggered the request.
//!
//! [`XhrInterceptor`] emulates that contract over the async dispatch with a
//! small per-instance state machine:
//!
//! ```text
//! Unopened ──open──► OpenedPassthrough (real network handles everything)
//!          └─open──► OpenedIntercepted ──send──► Sent ──► Loaded
//!                                                     └─► Errored
//! ```
//!
//! For an intercepted request the real network layer is never touched: `send`
//! spawns the dispatch, and on completion the emulated properties are set
//! *before* the load event is dispatched to listeners and then to the
//! `onload` callback. Callbacks are collected at completion time, so a
//! callback attached after `send` but before the dispatch resolves still
//! fires exactly once. Reader failures are logged and surfaced through the
//! error event only; the evented API has no failure channel once `send` has
//! returned.

use std::sync::Arc;

use bytes::Bytes;
use http::{Method, StatusCode};
use parking_lot::Mutex;
use tracing::{error, warn};

use crate::archive::ArchiveSource;
use crate::dispatch::{Dispatcher, Outcome};
use crate::scheme::{self, TileCoord};

// =============================================================================
// Events and Callbacks
// =============================================================================

/// Completion event categories dispatched by an evented request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    /// The request completed (including a 404 outcome)
    Load,
    /// The request failed
    Error,
}

/// Event handed to listeners and the `onload`/`onerror` callbacks.
#[derive(Debug, Clone)]
pub struct ProgressEvent {
    kind: EventKind,
}

impl ProgressEvent {
    /// A completion event.
    pub fn load() -> Self {
        Self {
            kind: EventKind::Load,
        }
    }

    /// A failure event.
    pub fn error() -> Self {
        Self {
            kind: EventKind::Error,
        }
    }

    /// This event's kind.
    pub fn kind(&self) -> EventKind {
        self.kind
    }
}

/// A completion callback.
///
/// `Arc`-shared so one handle can be both captured by the interceptor (for
/// completion-time delivery) and forwarded to the wrapped object (so direct
/// property inspection stays consistent).
pub type EventCallback = Arc<dyn Fn(&ProgressEvent) + Send + Sync>;

// =============================================================================
// Evented Surface
// =============================================================================

/// The evented network primitive's capability surface.
///
/// Implemented by the real-network backend
/// ([`crate::net::ReqwestEventedRequest`]) and by [`XhrInterceptor`], which
/// wraps any implementation and reroutes `pmtiles://` GETs.
///
/// Property getters return `None` until a completed request has produced the
/// corresponding value.
pub trait EventedRequest: Send {
    /// Prepare a request. Calling `open` again resets the instance for a new
    /// logical request.
    fn open(&mut self, method: Method, url: &str);

    /// Start the prepared request. Completion is signaled via events; `send`
    /// itself returns immediately.
    fn send(&mut self, body: Option<Bytes>);

    /// Register a listener for `kind` events. Listeners fire before the
    /// `onload`/`onerror` property callbacks.
    fn add_event_listener(&mut self, kind: EventKind, callback: EventCallback);

    /// Assign (or clear) the load callback property.
    fn set_onload(&mut self, callback: Option<EventCallback>);

    /// Assign (or clear) the error callback property.
    fn set_onerror(&mut self, callback: Option<EventCallback>);

    /// Current value of the load callback property.
    fn onload(&self) -> Option<EventCallback>;

    /// Current value of the error callback property.
    fn onerror(&self) -> Option<EventCallback>;

    /// Response status, once available.
    fn status(&self) -> Option<StatusCode>;

    /// Binary response payload, once available.
    fn response(&self) -> Option<Bytes>;

    /// Textual response payload, once available.
    fn response_text(&self) -> Option<String>;
}

// =============================================================================
// Shared Completion State
// =============================================================================

/// Pending values and callback slots for one evented request.
///
/// Shared between the instance (property reads, callback assignment) and the
/// spawned completion task (value fill, event flush).
pub(crate) struct EventedState {
    pub(crate) status: Option<StatusCode>,
    pub(crate) response: Option<Bytes>,
    pub(crate) response_text: Option<String>,
    pub(crate) onload: Option<EventCallback>,
    pub(crate) onerror: Option<EventCallback>,
    pub(crate) listeners: Vec<(EventKind, EventCallback)>,
}

impl EventedState {
    pub(crate) fn new() -> Self {
        Self {
            status: None,
            response: None,
            response_text: None,
            onload: None,
            onerror: None,
            listeners: Vec::new(),
        }
    }

    /// Clear result values for a fresh logical request. Callback slots and
    /// listeners survive a reopen, matching standard listener semantics.
    pub(crate) fn clear_result(&mut self) {
        self.status = None;
        self.response = None;
        self.response_text = None;
    }

    /// Snapshot the callbacks to invoke for `kind`, in dispatch order:
    /// listeners first, then the corresponding property callback.
    pub(crate) fn callbacks_for(&self, kind: EventKind) -> Vec<EventCallback> {
        let mut callbacks: Vec<EventCallback> = self
            .listeners
            .iter()
            .filter(|(listener_kind, _)| *listener_kind == kind)
            .map(|(_, callback)| callback.clone())
            .collect();
        let property = match kind {
            EventKind::Load => self.onload.clone(),
            EventKind::Error => self.onerror.clone(),
        };
        callbacks.extend(property);
        callbacks
    }
}

// =============================================================================
// Interceptor
// =============================================================================

/// Per-request lifecycle of the interceptor.
#[derive(Debug, Clone)]
enum Phase {
    Unopened,
    /// `open` delegated to the real implementation; it owns the request.
    OpenedPassthrough,
    /// `open` matched a `pmtiles://` GET; dispatch happens at `send`.
    OpenedIntercepted {
        base_url: String,
        coord: Option<TileCoord>,
    },
    Sent,
    Loaded,
    Errored,
}

struct XhrShared {
    phase: Phase,
    state: EventedState,
}

/// Wraps an [`EventedRequest`], rerouting `pmtiles://` GETs to the
/// dispatcher while leaving every other request to the inner implementation.
pub struct XhrInterceptor<S: ArchiveSource> {
    dispatcher: Arc<Dispatcher<S>>,
    inner: Box<dyn EventedRequest>,
    shared: Arc<Mutex<XhrShared>>,
}

impl<S: ArchiveSource + 'static> XhrInterceptor<S> {
    /// Create an interceptor routing through `dispatcher`, delegating
    /// non-matching requests to `inner`.
    pub fn new(dispatcher: Arc<Dispatcher<S>>, inner: Box<dyn EventedRequest>) -> Self {
        Self {
            dispatcher,
            inner,
            shared: Arc::new(Mutex::new(XhrShared {
                phase: Phase::Unopened,
                state: EventedState::new(),
            })),
        }
    }
}

impl<S: ArchiveSource + 'static> EventedRequest for XhrInterceptor<S> {
    fn open(&mut self, method: Method, url: &str) {
        let passthrough = method != Method::GET || !scheme::is_pmtiles_url(url);
        {
            let mut shared = self.shared.lock();
            // Reopening starts a new logical request
            shared.state.clear_result();
            shared.phase = if passthrough {
                Phase::OpenedPassthrough
            } else {
                let classified = scheme::classify(&scheme::normalize(url));
                Phase::OpenedIntercepted {
                    base_url: classified.base_url,
                    coord: classified.coord,
                }
            };
        }
        if passthrough {
            self.inner.open(method, url);
        }
    }

    fn send(&mut self, body: Option<Bytes>) {
        let target = {
            let mut shared = self.shared.lock();
            match shared.phase.clone() {
                Phase::OpenedIntercepted { base_url, coord } => {
                    shared.phase = Phase::Sent;
                    Some((base_url, coord))
                }
                Phase::Sent | Phase::Loaded | Phase::Errored => {
                    warn!("send called again without reopening; ignored");
                    return;
                }
                Phase::Unopened | Phase::OpenedPassthrough => None,
            }
        };

        let Some((base_url, coord)) = target else {
            self.inner.send(body);
            return;
        };

        let dispatcher = Arc::clone(&self.dispatcher);
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move {
            match dispatcher.dispatch(&base_url, coord).await {
                Ok(outcome) => {
                    // Fill the pending values before any listener can run,
                    // then flush to the callbacks registered by now.
                    let (event, callbacks) = {
                        let mut shared = shared.lock();
                        match outcome {
                            Outcome::Tile { data, .. } => {
                                shared.state.status = Some(StatusCode::OK);
                                shared.state.response = Some(data);
                            }
                            Outcome::NotFound => {
                                shared.state.status = Some(StatusCode::NOT_FOUND);
                                shared.state.response = None;
                            }
                            Outcome::Metadata(document) => {
                                shared.state.status = Some(StatusCode::OK);
                                shared.state.response_text = Some(document.to_string());
                            }
                        }
                        shared.phase = Phase::Loaded;
                        (
                            ProgressEvent::load(),
                            shared.state.callbacks_for(EventKind::Load),
                        )
                    };
                    for callback in &callbacks {
                        callback(&event);
                    }
                }
                Err(err) => {
                    error!(error = %err, base_url = %base_url, "pmtiles request failed");
                    let (event, callbacks) = {
                        let mut shared = shared.lock();
                        shared.phase = Phase::Errored;
                        (
                            ProgressEvent::error(),
                            shared.state.callbacks_for(EventKind::Error),
                        )
                    };
                    for callback in &callbacks {
                        callback(&event);
                    }
                }
            }
        });
    }

    fn add_event_listener(&mut self, kind: EventKind, callback: EventCallback) {
        self.shared
            .lock()
            .state
            .listeners
            .push((kind, callback.clone()));
        self.inner.add_event_listener(kind, callback);
    }

    fn set_onload(&mut self, callback: Option<EventCallback>) {
        self.shared.lock().state.onload = callback.clone();
        self.inner.set_onload(callback);
    }

    fn set_onerror(&mut self, callback: Option<EventCallback>) {
        self.shared.lock().state.onerror = callback.clone();
        self.inner.set_onerror(callback);
    }

    fn onload(&self) -> Option<EventCallback> {
        let captured = self.shared.lock().state.onload.clone();
        captured.or_else(|| self.inner.onload())
    }

    fn onerror(&self) -> Option<EventCallback> {
        let captured = self.shared.lock().state.onerror.clone();
        captured.or_else(|| self.inner.onerror())
    }

    fn status(&self) -> Option<StatusCode> {
        let emulated = self.shared.lock().state.status;
        emulated.or_else(|| self.inner.status())
    }

    fn response(&self) -> Option<Bytes> {
        let emulated = self.shared.lock().state.response.clone();
        emulated.or_else(|| self.inner.response())
    }

    fn response_text(&self) -> Option<String> {
        let emulated = self.shared.lock().state.response_text.clone();
        emulated.or_else(|| self.inner.response_text())
    }
}
