//! Cache-first stream resolution.

use std::{fmt, sync::Arc, time::Duration};

use {
    serde::Serialize,
    snare_browser::{BrowserError, SessionLauncher, StreamCapture},
    snare_cache::{CacheGateway, StreamId},
    snare_config::SnareConfig,
    tokio::{sync::Semaphore, time::Instant},
    tracing::{debug, info, warn},
};

use crate::{
    assemble::{ResolutionResult, assemble},
    error::ResolveError,
};

/// Where a result came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Cache,
    Live,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Cache => "cache",
            Self::Live => "live",
        })
    }
}

/// How a single lookup uses the cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CachePolicy {
    /// Serve a fresh record if present, persist live results.
    #[default]
    Use,
    /// Skip the read, persist the live result.
    Refresh,
    /// Neither read nor write.
    Bypass,
}

#[derive(Debug, Clone)]
pub struct ResolveOutcome {
    pub result: ResolutionResult,
    pub source: Source,
    pub elapsed: Duration,
}

/// Resolves identifiers to stream URLs, consulting the cache before
/// launching a browser.
#[derive(Clone)]
pub struct StreamResolver {
    cache: Option<CacheGateway>,
    capture: StreamCapture,
    permits: Option<Arc<Semaphore>>,
}

impl StreamResolver {
    pub fn new(cache: Option<CacheGateway>, capture: StreamCapture) -> Self {
        Self {
            cache,
            capture,
            permits: None,
        }
    }

    pub fn from_config(
        config: &SnareConfig,
        cache: Option<CacheGateway>,
        launcher: Arc<dyn SessionLauncher>,
    ) -> Self {
        Self::new(cache, StreamCapture::from_config(config, launcher))
            .with_max_sessions(config.browser.max_sessions)
    }

    /// Cap concurrent live sessions. Zero means unlimited.
    #[must_use]
    pub fn with_max_sessions(mut self, max: usize) -> Self {
        self.permits = (max > 0).then(|| Arc::new(Semaphore::new(max)));
        self
    }

    pub fn cache(&self) -> Option<&CacheGateway> {
        self.cache.as_ref()
    }

    pub async fn resolve(&self, raw_id: &str) -> Result<ResolveOutcome, ResolveError> {
        self.resolve_with(raw_id, CachePolicy::Use).await
    }

    pub async fn resolve_with(
        &self,
        raw_id: &str,
        policy: CachePolicy,
    ) -> Result<ResolveOutcome, ResolveError> {
        let id = StreamId::new(raw_id)
            .ok_or_else(|| ResolveError::InvalidInput("id must be a non-empty string".into()))?;
        let started = Instant::now();

        if policy == CachePolicy::Use
            && let Some(cache) = &self.cache
        {
            let hit = cache
                .fresh(&id)
                .await
                .map_err(ResolveError::StoreUnavailable)?;
            if let Some(record) = hit {
                debug!(stream_id = %id, "served from cache");
                return Ok(ResolveOutcome {
                    result: record.into(),
                    source: Source::Cache,
                    elapsed: started.elapsed(),
                });
            }
        }

        let result = self.resolve_live(&id).await?;

        if policy != CachePolicy::Bypass
            && result.has_manifest()
            && let Some(cache) = &self.cache
        {
            let record = cache.stamp(
                id.clone(),
                result.manifest_url.clone(),
                result.subtitle_urls.clone(),
            );
            if let Err(e) = cache.put(&record).await {
                warn!(stream_id = %id, error = %e, "failed to persist resolved stream");
            }
        }

        let elapsed = started.elapsed();
        info!(
            stream_id = %id,
            subtitles = result.subtitle_urls.len(),
            elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            "stream resolved live"
        );
        Ok(ResolveOutcome {
            result,
            source: Source::Live,
            elapsed,
        })
    }

    async fn resolve_live(&self, id: &StreamId) -> Result<ResolutionResult, ResolveError> {
        let _permit = match &self.permits {
            Some(permits) => Some(
                permits
                    .acquire()
                    .await
                    .map_err(|_| BrowserError::BrowserClosed)?,
            ),
            None => None,
        };
        let capture = self.capture.capture(id.as_str()).await?;
        Ok(assemble(&capture.observations))
    }
}
