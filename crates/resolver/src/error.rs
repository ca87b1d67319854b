use {snare_browser::BrowserError, snare_cache::StoreError, thiserror::Error};

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("invalid request: {0}")]
    InvalidInput(String),

    /// Reading the cache failed. Write failures never surface here.
    #[error("stream cache unavailable: {0}")]
    StoreUnavailable(#[source] StoreError),

    #[error(transparent)]
    Browser(#[from] BrowserError),
}

impl ResolveError {
    /// True for failures caused by the caller rather than the pipeline.
    pub fn is_client_error(&self) -> bool {
        matches!(self, Self::InvalidInput(_))
    }
}
