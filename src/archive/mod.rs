//! Archive reader abstraction layer.
//!
//! The interception core treats the tiled archive as an opaque collaborator:
//! something that can be opened by address, answer tile lookups by
//! coordinate, produce a TileJSON-style metadata document, and expose its
//! header. This module defines that contract.
//!
//! - [`ArchiveReader`]: one opened archive with tile / metadata / header lookups
//! - [`ArchiveSource`]: factory that opens readers by base URL, the seam a
//!   deployment implements over its archive backend (e.g. the `pmtiles`
//!   crate)
//! - [`ReaderRegistry`]: process-lifetime cache of one reader per base URL
//! - [`TileType`]: the archive header's tile-type code and its fixed
//!   content-type table
//!
//! Readers are expensive to construct (an open typically fetches and decodes
//! the archive header and root directory), which is why the registry caches
//! them for the process lifetime and never reopens an address twice.

mod registry;

pub use registry::ReaderRegistry;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::ArchiveError;

// =============================================================================
// Content-Type Table
// =============================================================================

/// Tile payload type, as encoded in the archive header.
///
/// The discriminants are the header's tile-type codes; the order of the
/// content-type table is fixed by the archive format and must not change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum TileType {
    /// Untyped payload, served as `application/octet-stream`
    Unknown = 0,
    /// Mapbox vector tile
    Mvt = 1,
    Png = 2,
    Jpeg = 3,
    Webp = 4,
    Avif = 5,
}

impl TileType {
    /// Decode a header tile-type code. Codes outside the table return `None`.
    pub fn from_code(code: u8) -> Option<TileType> {
        match code {
            0 => Some(TileType::Unknown),
            1 => Some(TileType::Mvt),
            2 => Some(TileType::Png),
            3 => Some(TileType::Jpeg),
            4 => Some(TileType::Webp),
            5 => Some(TileType::Avif),
            _ => None,
        }
    }

    /// The `Content-Type` value served for tiles of this type.
    pub fn content_type(&self) -> &'static str {
        match self {
            TileType::Unknown => "application/octet-stream",
            TileType::Mvt => "application/x-protobuf",
            TileType::Png => "image/png",
            TileType::Jpeg => "image/jpeg",
            TileType::Webp => "image/webp",
            TileType::Avif => "image/avif",
        }
    }
}

// =============================================================================
// Archive Header
// =============================================================================

/// The subset of the archive header the routing layer needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Raw tile-type code as stored in the archive
    pub tile_type: u8,
}

impl ArchiveHeader {
    /// Content type for this archive's tiles.
    ///
    /// A code outside the fixed table falls back to
    /// `application/octet-stream` so responses always carry a concrete
    /// header value.
    pub fn content_type(&self) -> &'static str {
        TileType::from_code(self.tile_type)
            .unwrap_or(TileType::Unknown)
            .content_type()
    }
}

// =============================================================================
// Reader / Source Traits
// =============================================================================

/// One opened archive.
///
/// Implementations must be thread-safe; the registry hands the same reader
/// to every request for its base URL. A missing tile is `Ok(None)`, never an
/// error.
#[async_trait]
pub trait ArchiveReader: Send + Sync {
    /// Look up one tile by coordinate. `None` means the archive holds no
    /// tile there.
    async fn tile(&self, z: u32, x: u32, y: u32) -> Result<Option<Bytes>, ArchiveError>;

    /// Produce the archive's TileJSON-style metadata document.
    ///
    /// `self_url` is the address the document should embed as its own
    /// identifier (used by consumers to construct further tile URLs); for
    /// intercepted requests this is the reconstructed `pmtiles://` address.
    async fn tile_json(&self, self_url: &str) -> Result<serde_json::Value, ArchiveError>;

    /// Read the archive header.
    async fn header(&self) -> Result<ArchiveHeader, ArchiveError>;
}

/// Factory for opening archive readers by base URL.
///
/// This abstraction keeps the routing layer independent of any particular
/// archive backend and lets tests inject mock readers. Opening must be
/// idempotent per address.
#[async_trait]
pub trait ArchiveSource: Send + Sync {
    /// The reader type this source opens.
    type Reader: ArchiveReader + 'static;

    /// Open the archive at `base_url`.
    async fn open(&self, base_url: &str) -> Result<Self::Reader, ArchiveError>;
}
