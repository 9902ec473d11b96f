//! Request dispatcher: classified request in, routed outcome out.
//!
//! The dispatcher is the junction both interceptors share. Given a base URL
//! and an optional tile coordinate it consults the reader registry, invokes
//! the archive reader, and packages the result into an [`Outcome`] that each
//! interceptor renders in the vocabulary of the API it emulates:
//!
//! ```text
//! ┌──────────────────┐      ┌──────────────────┐
//! │ FetchInterceptor │      │  XhrInterceptor  │
//! └────────┬─────────┘      └────────┬─────────┘
//!          │                         │
//!          ▼                         ▼
//! ┌─────────────────────────────────────────────┐
//! │                 Dispatcher                  │
//! │   coord? ──► reader.tile ──► Tile/NotFound  │
//! │   else   ──► reader.tile_json ──► Metadata  │
//! └────────────────────┬────────────────────────┘
//!                      ▼
//!              ┌────────────────┐
//!              │ ReaderRegistry │
//!              └────────────────┘
//! ```
//!
//! Reader failures are not swallowed here; they propagate to the calling
//! interceptor, which owns the translation into that API's failure channel.

use std::sync::Arc;

use bytes::Bytes;
use tracing::debug;

use crate::archive::{ArchiveReader, ArchiveSource, ReaderRegistry};
use crate::error::ArchiveError;
use crate::scheme::{TileCoord, SCHEME};

/// Result of routing one intercepted request.
#[derive(Debug, Clone)]
pub enum Outcome {
    /// The archive holds the requested tile.
    Tile {
        /// Raw tile bytes, exactly as the reader produced them
        data: Bytes,
        /// Content type derived from the archive header's tile-type code
        content_type: &'static str,
    },

    /// The requested tile coordinate is absent from the archive. This is a
    /// normal outcome (rendered as a 404), not an error.
    NotFound,

    /// Archive-level metadata document (TileJSON).
    Metadata(serde_json::Value),
}

/// Routes classified requests through the reader registry.
pub struct Dispatcher<S: ArchiveSource> {
    registry: Arc<ReaderRegistry<S>>,
}

impl<S: ArchiveSource> Dispatcher<S> {
    /// Create a dispatcher with its own registry over the given source.
    pub fn new(source: S) -> Self {
        Self {
            registry: Arc::new(ReaderRegistry::new(source)),
        }
    }

    /// Create a dispatcher sharing an existing registry.
    pub fn with_shared_registry(registry: Arc<ReaderRegistry<S>>) -> Self {
        Self { registry }
    }

    /// The underlying registry.
    pub fn registry(&self) -> &Arc<ReaderRegistry<S>> {
        &self.registry
    }

    /// Route one classified request.
    ///
    /// With a coordinate, looks the tile up and reads the archive header for
    /// the content type; without one, fetches the metadata document, passing
    /// the reconstructed `pmtiles://` address as the document's
    /// self-reference.
    pub async fn dispatch(
        &self,
        base_url: &str,
        coord: Option<TileCoord>,
    ) -> Result<Outcome, ArchiveError> {
        let reader = self.registry.get_or_open(base_url).await?;

        match coord {
            Some(coord) => {
                debug!(base_url, z = coord.z, x = coord.x, y = coord.y, "tile lookup");
                match reader.tile(coord.z, coord.x, coord.y).await? {
                    Some(data) => {
                        let header = reader.header().await?;
                        Ok(Outcome::Tile {
                            data,
                            content_type: header.content_type(),
                        })
                    }
                    None => Ok(Outcome::NotFound),
                }
            }
            None => {
                debug!(base_url, "metadata lookup");
                let self_url = format!("{SCHEME}://{base_url}");
                let document = reader.tile_json(&self_url).await?;
                Ok(Outcome::Metadata(document))
            }
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
