//! One lookup attempt: launch, race, tear down.

use std::sync::Arc;

use tracing::{info, warn};

use crate::{
    error::BrowserError,
    race::{self, Capture},
    session::{SessionGuard, SessionLauncher},
    types::{RaceConfig, UrlPatterns, embed_url},
};

/// Captures the stream requests an embed page makes for an identifier.
#[derive(Clone)]
pub struct StreamCapture {
    launcher: Arc<dyn SessionLauncher>,
    embed_template: String,
    patterns: UrlPatterns,
    race: RaceConfig,
}

impl StreamCapture {
    pub fn new(
        launcher: Arc<dyn SessionLauncher>,
        embed_template: impl Into<String>,
        patterns: UrlPatterns,
        race: RaceConfig,
    ) -> Self {
        Self {
            launcher,
            embed_template: embed_template.into(),
            patterns,
            race,
        }
    }

    pub fn from_config(
        config: &snare_config::SnareConfig,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Self {
        Self::new(
            launcher,
            config.resolver.embed_url.clone(),
            UrlPatterns::from(&config.resolver),
            RaceConfig::from_config(config),
        )
    }

    pub fn embed_url(&self, id: &str) -> String {
        embed_url(&self.embed_template, id)
    }

    /// Run exactly one browser session for `id`. The session is closed on
    /// every exit path, including cancellation of the returned future.
    pub async fn capture(&self, id: &str) -> Result<Capture, BrowserError> {
        let url = self.embed_url(id);
        let session = self.launcher.launch().await?;
        let guard = SessionGuard::new(Arc::clone(&session));

        let result = race::run(session, &url, self.patterns.clone(), self.race).await;
        guard.close().await;

        match &result {
            Ok(capture) => info!(
                stream_id = id,
                observed = capture.observations.len(),
                aborted = capture.stats.aborted_stylesheets + capture.stats.aborted_fonts,
                elapsed_ms = u64::try_from(capture.elapsed.as_millis()).unwrap_or(u64::MAX),
                "stream capture finished"
            ),
            Err(e) => warn!(stream_id = id, %url, error = %e, "stream capture failed"),
        }
        result
    }
}
