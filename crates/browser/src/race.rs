//! Navigation versus the manifest deadline.

use std::{sync::Arc, time::Duration};

use {tokio::time::Instant, tracing::debug};

use crate::{
    error::BrowserError,
    intercept::{Interceptor, StatsSnapshot},
    session::BrowserSession,
    types::{InterceptedRequest, RaceConfig, ResourceKind, UrlPatterns},
};

/// Everything observed during one successful attempt, in arrival order.
#[derive(Debug, Clone)]
pub struct Capture {
    pub observations: Vec<InterceptedRequest>,
    pub stats: StatsSnapshot,
    pub elapsed: Duration,
}

/// Navigate to `url` with interception enabled and wait until the page
/// reached DOMContentLoaded and at least one manifest request was seen.
///
/// The manifest deadline is checked before anything else on every wake-up,
/// so a manifest arriving after it elapsed does not count.
pub async fn run(
    session: Arc<dyn BrowserSession>,
    url: &str,
    patterns: UrlPatterns,
    config: RaceConfig,
) -> Result<Capture, BrowserError> {
    let started = Instant::now();
    let (interceptor, mut rx) = Interceptor::start(Arc::clone(&session), patterns).await?;

    let manifest_deadline = tokio::time::sleep(config.manifest_timeout);
    let navigation_deadline = tokio::time::sleep(config.navigation_timeout);
    let navigation = session.navigate(url);
    tokio::pin!(manifest_deadline, navigation_deadline, navigation);

    let mut observations = Vec::new();
    let mut navigated = false;
    let mut manifest_seen = false;

    while !(navigated && manifest_seen) {
        tokio::select! {
            biased;
            _ = &mut manifest_deadline, if !manifest_seen => {
                debug!(url, observed = observations.len(), "manifest deadline elapsed");
                return Err(BrowserError::ManifestNotObserved {
                    timeout_ms: millis(config.manifest_timeout),
                });
            },
            _ = &mut navigation_deadline, if !navigated => {
                return Err(BrowserError::NavigationTimeout {
                    timeout_ms: millis(config.navigation_timeout),
                });
            },
            result = &mut navigation, if !navigated => {
                result?;
                debug!(url, elapsed_ms = millis(started.elapsed()), "DOMContentLoaded");
                navigated = true;
            },
            Some(observed) = rx.recv() => {
                manifest_seen |= observed.kind == ResourceKind::ManifestCandidate;
                observations.push(observed);
            },
        }
    }

    while let Ok(observed) = rx.try_recv() {
        observations.push(observed);
    }
    let stats = interceptor.stop();

    Ok(Capture {
        observations,
        stats,
        elapsed: started.elapsed(),
    })
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::testing::{ScriptedSession, Step},
    };

    fn config() -> RaceConfig {
        RaceConfig {
            manifest_timeout: Duration::from_millis(20_000),
            navigation_timeout: Duration::from_millis(30_000),
        }
    }

    async fn go(session: ScriptedSession) -> (Result<Capture, BrowserError>, Arc<ScriptedSession>) {
        let session = Arc::new(session);
        let result = run(
            session.clone(),
            "https://embed/abc",
            UrlPatterns::default(),
            config(),
        )
        .await;
        (result, session)
    }

    #[tokio::test(start_paused = true)]
    async fn completes_when_both_conditions_hold() {
        let (result, session) = go(ScriptedSession::new(vec![
            Step::request("XHR", "https://cdn/master.m3u8").after_ms(100),
            Step::request("XHR", "https://cdn/en.vtt").after_ms(10),
        ])
        .dom_ready_after_ms(500))
        .await;

        let capture = result.unwrap();
        let urls: Vec<_> = capture.observations.iter().map(|o| o.url.as_str()).collect();
        assert_eq!(urls, ["https://cdn/master.m3u8", "https://cdn/en.vtt"]);
        assert_eq!(session.navigations(), ["https://embed/abc"]);
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_manifest_after_dom_ready() {
        let (result, _) = go(ScriptedSession::new(vec![
            Step::request("XHR", "https://cdn/master.m3u8").after_ms(5_000),
        ])
        .dom_ready_after_ms(10))
        .await;
        let capture = result.unwrap();
        assert!(capture.elapsed >= Duration::from_millis(5_000));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_dom_ready_after_manifest() {
        let (result, _) = go(ScriptedSession::new(vec![
            Step::request("XHR", "https://cdn/master.m3u8"),
            Step::request("XHR", "https://cdn/second.m3u8").after_ms(1_000),
        ])
        .dom_ready_after_ms(3_000))
        .await;
        assert_eq!(result.unwrap().observations.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn no_manifest_times_out() {
        let (result, _) = go(ScriptedSession::new(vec![Step::request(
            "XHR",
            "https://cdn/en.vtt",
        )]))
        .await;
        assert!(matches!(
            result,
            Err(BrowserError::ManifestNotObserved { timeout_ms: 20_000 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn late_manifest_does_not_rescue() {
        let (result, _) = go(ScriptedSession::new(vec![
            Step::request("XHR", "https://cdn/master.m3u8").after_ms(20_001),
        ])
        .never_dom_ready())
        .await;
        assert!(matches!(result, Err(BrowserError::ManifestNotObserved { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn stuck_navigation_times_out() {
        let (result, _) = go(ScriptedSession::new(vec![Step::request(
            "XHR",
            "https://cdn/master.m3u8",
        )])
        .never_dom_ready())
        .await;
        assert!(matches!(
            result,
            Err(BrowserError::NavigationTimeout { timeout_ms: 30_000 })
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn navigation_error_propagates() {
        let (result, _) = go(ScriptedSession::new(vec![]).fail_navigation("net::ERR_NAME_NOT_RESOLVED"))
            .await;
        assert!(matches!(result, Err(BrowserError::NavigationFailed(m)) if m.contains("NAME_NOT_RESOLVED")));
    }
}
