use thiserror::Error;

/// Errors raised by the archive reader collaborator.
///
/// A tile that is simply absent from an archive is *not* an error; reader
/// implementations return `Ok(None)` for that case. These variants cover
/// genuine failures: unreachable sources, malformed archives, decode errors.
///
/// Cloneable so a single open result can be shared with every waiter of a
/// singleflight open.
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// I/O failure while reaching the archive (network, filesystem)
    #[error("archive I/O error: {0}")]
    Io(String),

    /// The archive exists but its structure cannot be decoded
    #[error("malformed archive: {0}")]
    Malformed(String),

    /// No archive exists at the requested address
    #[error("archive not found: {0}")]
    NotFound(String),
}

/// Errors surfaced by the fetch interceptor and the real-network backends.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Failure from the archive reader during an intercepted request
    #[error("archive error: {0}")]
    Archive(#[from] ArchiveError),

    /// Failure from the real network layer on a passed-through request
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The request address could not be parsed by the real network layer
    #[error("invalid URL: {0}")]
    InvalidUrl(String),

    /// Response construction failed
    #[error("HTTP error: {0}")]
    Http(#[from] http::Error),

    /// Metadata document serialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
