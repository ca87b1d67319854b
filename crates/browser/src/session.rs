//! The seam between request capture and a concrete browser.
//!
//! [`ChromeLauncher`](crate::launcher::ChromeLauncher) drives a real
//! Chromium over CDP; the `testing` module provides a scripted stand-in.

use std::sync::Arc;

use {
    async_trait::async_trait,
    futures::stream::BoxStream,
    tracing::{debug, warn},
};

use crate::{
    error::BrowserError,
    types::{PausedRequest, Verdict},
};

/// One isolated browser with a single page.
#[async_trait]
pub trait BrowserSession: Send + Sync {
    /// Enable interception of every outgoing request and return the stream
    /// of paused requests. Each item must be settled with [`Self::settle`].
    async fn paused_requests(&self)
    -> Result<BoxStream<'static, PausedRequest>, BrowserError>;

    /// Release a paused request.
    async fn settle(&self, request_id: &str, verdict: Verdict) -> Result<(), BrowserError>;

    /// Navigate the page and resolve once DOMContentLoaded fires.
    async fn navigate(&self, url: &str) -> Result<(), BrowserError>;

    /// Tear the session down. Must be idempotent.
    async fn close(&self) -> Result<(), BrowserError>;
}

/// Produces a fresh session per lookup attempt.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    async fn launch(&self) -> Result<Arc<dyn BrowserSession>, BrowserError>;
}

/// Owns a session for the duration of one attempt.
///
/// [`SessionGuard::close`] is the normal exit. If the guard is dropped
/// without it (timeout, error, cancellation) the close runs on a spawned
/// task instead.
pub struct SessionGuard {
    session: Option<Arc<dyn BrowserSession>>,
}

impl SessionGuard {
    pub fn new(session: Arc<dyn BrowserSession>) -> Self {
        Self {
            session: Some(session),
        }
    }

    pub fn session(&self) -> Option<&Arc<dyn BrowserSession>> {
        self.session.as_ref()
    }

    pub async fn close(mut self) {
        if let Some(session) = self.session.take()
            && let Err(e) = session.close().await
        {
            warn!(error = %e, "failed to close browser session");
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(session) = self.session.take() else {
            return;
        };
        debug!("browser session dropped without close, closing in background");
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = session.close().await {
                        warn!(error = %e, "background session close failed");
                    }
                });
            },
            // No runtime left: the session's own Drop kills the process.
            Err(_) => drop(session),
        }
    }
}
