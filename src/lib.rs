//! # pmtiles-protocol
//!
//! Transparent `pmtiles://` protocol interception for HTTP client
//! primitives.
//!
//! Code that issues ordinary GET requests of the form
//! `pmtiles://<base>/{z}/{x}/{y}.{ext}` (a map renderer, a tile prefetcher,
//! anything written against a generic HTTP client) can read tiles and
//! metadata out of a locally-available tiled archive instead of the network,
//! without modification. The crate wraps the two client-side network
//! primitives, reroutes custom-scheme GETs to an archive reader, and passes
//! every other request through to the real network untouched.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────┐   ┌──────────────────┐
//! │ FetchInterceptor │   │  XhrInterceptor  │   interception layer
//! └────────┬─────────┘   └────────┬─────────┘
//!          └──────────┬───────────┘
//!                     ▼
//!           ┌──────────────────┐
//!           │  URL classifier  │                scheme / coordinate split
//!           └────────┬─────────┘
//!                    ▼
//!           ┌──────────────────┐
//!           │    Dispatcher    │                tile vs metadata routing
//!           └────────┬─────────┘
//!                    ▼
//!           ┌──────────────────┐
//!           │  ReaderRegistry  │                one reader per archive
//!           └────────┬─────────┘
//!                    ▼
//!           ┌──────────────────┐
//!           │  ArchiveReader   │                external collaborator
//!           └──────────────────┘
//! ```
//!
//! - [`scheme`] - custom-scheme detection, normalization, tile-coordinate
//!   classification
//! - [`archive`] - the archive collaborator traits and the reader registry
//! - [`dispatch`] - routing a classified request to a tile / metadata /
//!   not-found outcome
//! - [`intercept`] - the two interceptors and the ambient registration
//!   facade
//! - [`net`] - reqwest-backed real-network defaults for both primitives
//!
//! ## Example
//!
//! ```rust,no_run
//! use pmtiles_protocol::{fetch, register};
//! # use pmtiles_protocol::{ArchiveError, ArchiveHeader, ArchiveReader, ArchiveSource};
//! # use async_trait::async_trait;
//! # use bytes::Bytes;
//! # struct MySource;
//! # struct MyReader;
//! # #[async_trait]
//! # impl ArchiveReader for MyReader {
//! #     async fn tile(&self, _: u32, _: u32, _: u32) -> Result<Option<Bytes>, ArchiveError> { Ok(None) }
//! #     async fn tile_json(&self, _: &str) -> Result<serde_json::Value, ArchiveError> { Ok(serde_json::json!({})) }
//! #     async fn header(&self) -> Result<ArchiveHeader, ArchiveError> { Ok(ArchiveHeader { tile_type: 1 }) }
//! # }
//! # #[async_trait]
//! # impl ArchiveSource for MySource {
//! #     type Reader = MyReader;
//! #     async fn open(&self, _: &str) -> Result<Self::Reader, ArchiveError> { Ok(MyReader) }
//! # }
//!
//! #[tokio::main]
//! async fn main() {
//!     // Route pmtiles:// requests through an archive source
//!     let registration = register(MySource);
//!
//!     // Existing code keeps calling the ambient primitive unchanged
//!     let tile = fetch("pmtiles://tiles/planet.pmtiles/3/1/2.mvt").await;
//!     let metadata = fetch("pmtiles://tiles/planet.pmtiles").await;
//!
//!     // Everything else still reaches the real network
//!     let page = fetch("https://example.com/").await;
//!
//!     registration.restore();
//! }
//! ```

pub mod archive;
pub mod dispatch;
pub mod error;
pub mod intercept;
pub mod net;
pub mod scheme;

// Re-export commonly used types
pub use archive::{ArchiveHeader, ArchiveReader, ArchiveSource, ReaderRegistry, TileType};
pub use dispatch::{Dispatcher, Outcome};
pub use error::{ArchiveError, FetchError};
pub use intercept::install::fetch;
pub use intercept::{
    ambient_client, ambient_request_factory, new_request, register, EventCallback, EventKind,
    EventedRequest, EventedRequestFactory, FetchInterceptor, FetchRequest, HttpClient,
    ProgressEvent, Registration, SharedHttpClient, XhrInterceptor,
};
pub use net::{ReqwestClient, ReqwestEventedRequest};
pub use scheme::{
    classify, is_pmtiles_url, normalize, ClassifiedUrl, TileCoord, TileExtension, SCHEME,
};
