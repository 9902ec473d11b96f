//! Reader registry: one archive reader per base URL, for the process
//! lifetime.
//!
//! Reopening an archive per request would be wasteful (an open fetches and
//! decodes header and directory data), so the registry constructs each
//! reader lazily on first request and then hands out the same instance
//! forever. There is no eviction, TTL, or explicit close; the archive's own
//! internal caching amortizes repeated reads.
//!
//! Because the tokio runtime is preemptive, the check-then-create path is
//! guarded with a singleflight protocol: the first task to request an
//! unregistered base URL becomes the leader and performs the open, while
//! concurrent requests for the same base wait on a [`Notify`] and share the
//! leader's result. Reads of existing entries take only a read lock.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, Notify, RwLock};
use tracing::debug;

use crate::error::ArchiveError;

use super::ArchiveSource;

/// Registry mapping normalized base URLs to opened archive readers.
///
/// Entries are append-only: once a reader is registered for a base URL it is
/// never removed or replaced, so repeated requests to the same archive are
/// guaranteed to observe the same instance.
pub struct ReaderRegistry<S: ArchiveSource> {
    /// The source used to open readers
    source: S,

    /// Opened readers indexed by base URL
    readers: RwLock<HashMap<String, Arc<S::Reader>>>,

    /// In-flight opens for the singleflight protocol
    in_flight: Mutex<HashMap<String, Arc<InFlightOpen<S::Reader>>>>,
}

/// State for an in-flight archive open.
struct InFlightOpen<R> {
    /// Notification for waiters
    notify: Notify,
    /// Result of the open, set by the leader when complete
    result: Mutex<Option<Result<Arc<R>, ArchiveError>>>,
}

impl<S: ArchiveSource> ReaderRegistry<S> {
    /// Create a registry backed by the given source.
    pub fn new(source: S) -> Self {
        Self {
            source,
            readers: RwLock::new(HashMap::new()),
            in_flight: Mutex::new(HashMap::new()),
        }
    }

    /// Get the reader for `base_url`, opening it on first request.
    ///
    /// Concurrent first requests for the same base URL construct exactly one
    /// reader: one task opens, the rest wait and share the result. A failed
    /// open is not cached: every waiter receives the error and the next
    /// request retries.
    pub async fn get_or_open(&self, base_url: &str) -> Result<Arc<S::Reader>, ArchiveError> {
        // Fast path: already registered
        {
            let readers = self.readers.read().await;
            if let Some(reader) = readers.get(base_url) {
                return Ok(reader.clone());
            }
        }

        // Slow path: join an in-flight open or become the leader
        loop {
            let state = {
                let mut in_flight = self.in_flight.lock().await;

                if let Some(state) = in_flight.get(base_url) {
                    // Another task is opening this archive
                    state.clone()
                } else {
                    let state = Arc::new(InFlightOpen {
                        notify: Notify::new(),
                        result: Mutex::new(None),
                    });
                    in_flight.insert(base_url.to_string(), state.clone());
                    drop(in_flight);

                    debug!(base_url, "opening archive reader");
                    let result = self.source.open(base_url).await.map(Arc::new);

                    {
                        let mut result_guard = state.result.lock().await;
                        *result_guard = Some(result.clone());
                    }

                    if let Ok(ref reader) = result {
                        let mut readers = self.readers.write().await;
                        readers.insert(base_url.to_string(), reader.clone());
                    }

                    {
                        let mut in_flight = self.in_flight.lock().await;
                        in_flight.remove(base_url);
                    }
                    state.notify.notify_waiters();

                    return result;
                }
            };

            // Wait for the leader to finish
            state.notify.notified().await;

            let result_guard = state.result.lock().await;
            if let Some(ref result) = *result_guard {
                return result.clone();
            }

            // Result not yet available, loop back (shouldn't normally happen)
        }
    }

    /// Number of registered readers.
    pub async fn len(&self) -> usize {
        self.readers.read().await.len()
    }

    /// True if no reader has been opened yet.
    pub async fn is_empty(&self) -> bool {
        self.readers.read().await.is_empty()
    }
}

// =============================================================================
// Tests
// =============================================================================
