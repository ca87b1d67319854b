//! Request interception: abort cosmetic resources, report stream URLs.

use std::sync::{
    Arc,
    atomic::{AtomicU64, Ordering},
};

use {
    futures::StreamExt,
    serde::Serialize,
    tokio::{
        sync::mpsc::{self, UnboundedReceiver},
        task::JoinHandle,
    },
    tracing::{debug, trace, warn},
};

use crate::{
    error::BrowserError,
    session::BrowserSession,
    types::{InterceptedRequest, ResourceKind, UrlPatterns, Verdict},
};

/// Classify a paused request.
///
/// Resource type is checked first, so a stylesheet whose URL happens to
/// contain the manifest pattern is still a stylesheet. Unknown or empty
/// types fall through to URL matching.
pub fn classify(resource_type: &str, url: &str, patterns: &UrlPatterns) -> ResourceKind {
    if resource_type.eq_ignore_ascii_case("stylesheet") {
        return ResourceKind::Stylesheet;
    }
    if resource_type.eq_ignore_ascii_case("font") {
        return ResourceKind::Font;
    }
    if patterns.is_manifest(url) {
        ResourceKind::ManifestCandidate
    } else if patterns.is_subtitle(url) {
        ResourceKind::SubtitleCandidate
    } else {
        ResourceKind::Other
    }
}

/// Decision counters for one session.
#[derive(Debug, Default)]
pub struct InterceptStats {
    continued: AtomicU64,
    aborted_stylesheets: AtomicU64,
    aborted_fonts: AtomicU64,
    manifests: AtomicU64,
    subtitles: AtomicU64,
    settle_failures: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub continued: u64,
    pub aborted_stylesheets: u64,
    pub aborted_fonts: u64,
    pub manifests: u64,
    pub subtitles: u64,
    pub settle_failures: u64,
}

impl InterceptStats {
    fn record(&self, kind: ResourceKind) {
        let counter = match kind {
            ResourceKind::Stylesheet => &self.aborted_stylesheets,
            ResourceKind::Font => &self.aborted_fonts,
            ResourceKind::ManifestCandidate => {
                self.manifests.fetch_add(1, Ordering::Relaxed);
                &self.continued
            },
            ResourceKind::SubtitleCandidate => {
                self.subtitles.fetch_add(1, Ordering::Relaxed);
                &self.continued
            },
            ResourceKind::Other => &self.continued,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            continued: self.continued.load(Ordering::Relaxed),
            aborted_stylesheets: self.aborted_stylesheets.load(Ordering::Relaxed),
            aborted_fonts: self.aborted_fonts.load(Ordering::Relaxed),
            manifests: self.manifests.load(Ordering::Relaxed),
            subtitles: self.subtitles.load(Ordering::Relaxed),
            settle_failures: self.settle_failures.load(Ordering::Relaxed),
        }
    }
}

/// Background task settling every paused request of a session.
///
/// Stream URLs are sent on the returned channel before the request is
/// released, so an observation is never later than the browser acting on
/// it. The task is aborted when the interceptor is dropped.
pub struct Interceptor {
    task: JoinHandle<()>,
    stats: Arc<InterceptStats>,
}

impl Interceptor {
    pub async fn start(
        session: Arc<dyn BrowserSession>,
        patterns: UrlPatterns,
    ) -> Result<(Self, UnboundedReceiver<InterceptedRequest>), BrowserError> {
        let mut paused = session.paused_requests().await?;
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(InterceptStats::default());

        let task_stats = Arc::clone(&stats);
        let task = tokio::spawn(async move {
            while let Some(request) = paused.next().await {
                let kind = classify(&request.resource_type, &request.url, &patterns);
                trace!(url = %request.url, resource_type = %request.resource_type, %kind, "request paused");

                if kind.is_candidate() {
                    debug!(url = %request.url, %kind, "stream request observed");
                    // Receiver gone means the race is over; keep settling.
                    let _ = tx.send(InterceptedRequest {
                        url: request.url.clone(),
                        kind,
                    });
                }

                let verdict = if kind.is_blocked() {
                    Verdict::Abort
                } else {
                    Verdict::Continue
                };
                task_stats.record(kind);

                if let Err(e) = session.settle(&request.request_id, verdict).await {
                    task_stats.settle_failures.fetch_add(1, Ordering::Relaxed);
                    warn!(url = %request.url, ?verdict, error = %e, "failed to settle request");
                }
            }
            debug!("paused request stream ended");
        });

        Ok((Self { task, stats }, rx))
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Stop settling requests and return the final counters.
    pub fn stop(self) -> StatsSnapshot {
        self.task.abort();
        self.stats.snapshot()
    }
}

impl Drop for Interceptor {
    fn drop(&mut self) {
        self.task.abort();
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{ScriptedSession, Step},
        rstest::rstest,
        std::time::Duration,
    };

    #[rstest]
    #[case("Stylesheet", "https://x/site.css", ResourceKind::Stylesheet)]
    #[case("Font", "https://x/a.woff2", ResourceKind::Font)]
    #[case("Stylesheet", "https://x/evil.m3u8.css", ResourceKind::Stylesheet)]
    #[case("XHR", "https://cdn/master.m3u8", ResourceKind::ManifestCandidate)]
    #[case("Fetch", "https://cdn/eng.vtt", ResourceKind::SubtitleCandidate)]
    #[case("", "https://cdn/master.m3u8", ResourceKind::ManifestCandidate)]
    #[case("Bogus", "https://x/app.js", ResourceKind::Other)]
    #[case("Script", "https://x/app.js", ResourceKind::Other)]
    fn classifies(#[case] ty: &str, #[case] url: &str, #[case] expected: ResourceKind) {
        assert_eq!(classify(ty, url, &UrlPatterns::default()), expected);
    }

    #[tokio::test(start_paused = true)]
    async fn aborts_cosmetics_and_reports_streams() {
        let session = Arc::new(ScriptedSession::new(vec![
            Step::request("Stylesheet", "https://x/a.css"),
            Step::request("XHR", "https://cdn/master.m3u8"),
            Step::request("Font", "https://x/a.woff"),
            Step::request("XHR", "https://cdn/en.vtt"),
            Step::request("Image", "https://x/poster.png"),
        ]));

        let (interceptor, mut rx) =
            Interceptor::start(session.clone(), UrlPatterns::default())
                .await
                .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.kind, ResourceKind::ManifestCandidate);
        assert_eq!(second.url, "https://cdn/en.vtt");

        let stats = interceptor.stop();
        assert_eq!(stats.aborted_stylesheets, 1);
        assert_eq!(stats.aborted_fonts, 1);
        assert_eq!(stats.continued, 3);

        let decisions = session.decisions();
        assert_eq!(decisions.aborted_by_type.get("Stylesheet"), Some(&1));
        assert_eq!(decisions.aborted_by_type.get("Font"), Some(&1));
        assert_eq!(decisions.continued, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn settle_failure_does_not_stop_interception() {
        let session = Arc::new(
            ScriptedSession::new(vec![
                Step::request("Script", "https://x/a.js"),
                Step::request("XHR", "https://cdn/master.m3u8"),
            ])
            .fail_settle(),
        );

        let (interceptor, mut rx) =
            Interceptor::start(session, UrlPatterns::default()).await.unwrap();
        assert_eq!(rx.recv().await.unwrap().kind, ResourceKind::ManifestCandidate);
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(interceptor.stats().settle_failures, 2);
    }

    #[tokio::test]
    async fn setup_failure_is_reported() {
        let session = Arc::new(ScriptedSession::new(vec![]).fail_interception());
        let err = Interceptor::start(session, UrlPatterns::default())
            .await
            .err()
            .unwrap();
        assert!(matches!(err, BrowserError::InterceptionSetup(_)));
    }
}
