use thiserror::Error;

/// A failure to obtain a usable document for one URL. Never fatal to a run:
/// the URL is skipped and stays eligible for the next one.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("timed out after {waited_ms}ms waiting for {url}")]
    Timeout { url: String, waited_ms: u64 },

    #[error("request to {url} failed: {message}")]
    Unreachable { url: String, message: String },

    #[error("{url} answered with status {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned no document")]
    EmptyDocument { url: String },

    #[error("no page has been loaded yet")]
    NoPage,
}

impl FetchError {
    pub fn unreachable(url: &str, err: impl std::fmt::Display) -> Self {
        FetchError::Unreachable {
            url: url.to_string(),
            message: err.to_string(),
        }
    }
}

/// Why listing discovery ended before pagination ran out.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("pagination unusable before any detail link was found: {0}")]
    NothingDiscovered(#[source] FetchError),

    #[error("listing page {page} could not be loaded: {source}")]
    PageFailed {
        page: u32,
        #[source]
        source: FetchError,
    },

    #[error("advancing past listing page {page} failed: {source}")]
    AdvanceFailed {
        page: u32,
        #[source]
        source: FetchError,
    },
}
