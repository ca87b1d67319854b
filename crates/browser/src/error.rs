//! Browser error types.

use thiserror::Error;

/// Errors that can occur while capturing a page's stream requests.
#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser not available: {0}")]
    BrowserNotAvailable(String),

    #[error("browser launch failed: {0}")]
    LaunchFailed(String),

    #[error("request interception setup failed: {0}")]
    InterceptionSetup(String),

    #[error("navigation failed: {0}")]
    NavigationFailed(String),

    #[error("navigation did not reach DOMContentLoaded within {timeout_ms}ms")]
    NavigationTimeout { timeout_ms: u64 },

    #[error("no manifest request observed within {timeout_ms}ms")]
    ManifestNotObserved { timeout_ms: u64 },

    #[error("browser closed unexpectedly")]
    BrowserClosed,

    #[error("CDP error: {0}")]
    Cdp(String),
}

impl From<chromiumoxide::error::CdpError> for BrowserError {
    fn from(err: chromiumoxide::error::CdpError) -> Self {
        BrowserError::Cdp(err.to_string())
    }
}
