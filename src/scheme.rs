//! URL classification for the `pmtiles://` scheme.
//!
//! Pure functions that decide how an outgoing request address is routed:
//!
//! - [`is_pmtiles_url`]: does the address use the custom scheme at all?
//! - [`normalize`]: strip the scheme prefix and repair the known
//!   `http(s)//` mangling artifact (some URL stacks drop the colon of a
//!   nested scheme when resolving `pmtiles://https://…` addresses).
//! - [`classify`]: split a normalized address into the archive base URL
//!   and, when the trailing path segment matches `/{z}/{x}/{y}.{ext}`, a
//!   parsed [`TileCoord`]. No match means the request targets archive-level
//!   metadata, not a tile.
//!
//! Two requests that should hit the same archive normalize to byte-identical
//! base URLs; the base URL is the reader registry's cache key.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// The custom scheme token recognized by the interceptors.
pub const SCHEME: &str = "pmtiles";

/// The full scheme prefix, matched case-sensitively at the start of a URL.
const SCHEME_PREFIX: &str = "pmtiles://";

/// Tile payload extensions accepted in the trailing coordinate segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TileExtension {
    /// Mapbox vector tile
    Mvt,
    Png,
    Jpg,
    Webp,
    Avif,
}

impl TileExtension {
    /// The extension as it appears in a request path.
    pub fn as_str(&self) -> &'static str {
        match self {
            TileExtension::Mvt => "mvt",
            TileExtension::Png => "png",
            TileExtension::Jpg => "jpg",
            TileExtension::Webp => "webp",
            TileExtension::Avif => "avif",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "mvt" => Some(TileExtension::Mvt),
            "png" => Some(TileExtension::Png),
            "jpg" => Some(TileExtension::Jpg),
            "webp" => Some(TileExtension::Webp),
            "avif" => Some(TileExtension::Avif),
            _ => None,
        }
    }
}

impl std::fmt::Display for TileExtension {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A tile coordinate parsed from the trailing path segment of a request URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileCoord {
    /// Zoom level
    pub z: u32,
    /// Column (increases eastward)
    pub x: u32,
    /// Row (increases southward)
    pub y: u32,
    /// Requested payload extension
    pub ext: TileExtension,
}

/// The routing decision for one normalized request URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedUrl {
    /// Archive address: the URL minus any trailing tile segment.
    pub base_url: String,
    /// Parsed tile coordinate, or `None` for a metadata request.
    pub coord: Option<TileCoord>,
}

/// Get the trailing tile-coordinate pattern: `/{z}/{x}/{y}.{ext}`.
///
/// Captures:
/// - Group 1: zoom (decimal digits)
/// - Group 2: x (decimal digits)
/// - Group 3: y (decimal digits)
/// - Group 4: extension (one of mvt, png, jpg, webp, avif)
fn tile_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"/(\d+)/(\d+)/(\d+)\.(mvt|png|jpg|webp|avif)$").unwrap())
}

/// True iff the URL begins with the literal `pmtiles://` prefix.
///
/// The match is case-sensitive and exact; `PMTILES://` or a bare `pmtiles:`
/// is not recognized and falls through to the real network.
pub fn is_pmtiles_url(url: &str) -> bool {
    url.starts_with(SCHEME_PREFIX)
}

/// Strip the scheme prefix and repair the `http(s)//` mangling artifact.
///
/// The repair only touches the start of the remaining string: a nested
/// address whose scheme lost its colon (`https//example.com/a.pmtiles`) is
/// restored to `https://example.com/a.pmtiles`, while the same byte sequence
/// later in the path is left alone.
///
/// Idempotent: normalizing an already-normalized URL is a no-op.
pub fn normalize(url: &str) -> String {
    let rest = url.strip_prefix(SCHEME_PREFIX).unwrap_or(url);
    if let Some(tail) = rest.strip_prefix("https//") {
        return format!("https://{tail}");
    }
    if let Some(tail) = rest.strip_prefix("http//") {
        return format!("http://{tail}");
    }
    rest.to_string()
}

/// Split a normalized URL into its archive base and optional tile coordinate.
///
/// When the trailing segment matches the tile pattern, the base URL is the
/// input with that segment removed. Otherwise the full input is the base and
/// the request targets archive-level metadata, including the empty or
/// otherwise malformed remainder case, which is passed through for the
/// reader to reject.
///
/// A numeric component that overflows `u32` is treated as non-matching.
pub fn classify(url: &str) -> ClassifiedUrl {
    if let Some((start, coord)) = parse_tile_suffix(url) {
        return ClassifiedUrl {
            base_url: url[..start].to_string(),
            coord: Some(coord),
        };
    }
    ClassifiedUrl {
        base_url: url.to_string(),
        coord: None,
    }
}

/// Parse the trailing tile segment, returning its byte offset and coordinate.
fn parse_tile_suffix(url: &str) -> Option<(usize, TileCoord)> {
    let caps = tile_pattern().captures(url)?;
    let z = caps.get(1)?.as_str().parse::<u32>().ok()?;
    let x = caps.get(2)?.as_str().parse::<u32>().ok()?;
    let y = caps.get(3)?.as_str().parse::<u32>().ok()?;
    let ext = TileExtension::parse(caps.get(4)?.as_str())?;
    let start = caps.get(0)?.start();
    Some((start, TileCoord { z, x, y, ext }))
}
