#![allow(clippy::unwrap_used, clippy::expect_used)]
//! End-to-end resolution against scripted browser sessions.

use std::{
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
    time::Duration,
};

use {
    async_trait::async_trait,
    chrono::{DateTime, TimeZone, Utc},
    snare_browser::{
        BrowserError, RaceConfig, StreamCapture, UrlPatterns,
        testing::{ScriptedLauncher, ScriptedSession, Step},
    },
    snare_cache::{CacheGateway, CacheRecord, InMemoryStreamStore, StoreError, StreamId, StreamStore},
    snare_resolver::{CachePolicy, ResolveError, Source, StreamResolver},
};

const EMBED: &str = "https://embed.test/v2/embed-4/{id}?z=&_debug=true";

fn epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 18, 10, 30, 0).unwrap()
}

struct Harness {
    store: Arc<InMemoryStreamStore>,
    launcher: Arc<ScriptedLauncher>,
    resolver: StreamResolver,
}

fn harness(session: ScriptedSession) -> Harness {
    let store = Arc::new(InMemoryStreamStore::new());
    let launcher = Arc::new(ScriptedLauncher::new(session));
    let resolver = resolver_over(store.clone(), launcher.clone());
    Harness {
        store,
        launcher,
        resolver,
    }
}

fn resolver_over(store: Arc<dyn StreamStore>, launcher: Arc<ScriptedLauncher>) -> StreamResolver {
    let capture = StreamCapture::new(launcher, EMBED, UrlPatterns::default(), RaceConfig {
        manifest_timeout: Duration::from_secs(20),
        navigation_timeout: Duration::from_secs(30),
    });
    StreamResolver::new(Some(CacheGateway::new(store, epoch())), capture)
}

fn abc123_page() -> ScriptedSession {
    ScriptedSession::new(vec![
        Step::request("Document", "https://embed.test/v2/embed-4/abc123?z=&_debug=true"),
        Step::request("Stylesheet", "https://embed.test/css/player.css"),
        Step::request("Font", "https://embed.test/fonts/icons.woff2"),
        Step::request("XHR", "https://x/en.vtt").after_ms(280),
        Step::request("XHR", "https://x/fr.vtt").after_ms(10),
        Step::request("XHR", "https://x/a.m3u8").after_ms(10),
    ])
    .dom_ready_after_ms(150)
}

#[tokio::test(start_paused = true)]
async fn abc123_resolves_live_then_from_cache() {
    let h = harness(abc123_page());

    let first = h.resolver.resolve("abc123").await.unwrap();
    assert_eq!(first.source, Source::Live);
    assert_eq!(first.result.manifest_url, "https://x/a.m3u8");
    assert_eq!(first.result.subtitle_urls, ["https://x/en.vtt", "https://x/fr.vtt"]);

    let stored = h.store.snapshot(&StreamId::new("abc123").unwrap()).unwrap();
    assert_eq!(stored.recorded_at, epoch());
    assert_eq!(stored.manifest_url, "https://x/a.m3u8");

    let second = h.resolver.resolve("abc123").await.unwrap();
    assert_eq!(second.source, Source::Cache);
    assert_eq!(second.result, first.result);
    assert_eq!(h.launcher.launches(), 1);
}

#[tokio::test(start_paused = true)]
async fn fresh_hit_launches_nothing() {
    let h = harness(abc123_page());
    h.store.insert(CacheRecord {
        id: StreamId::new("cached").unwrap(),
        recorded_at: epoch(),
        manifest_url: "https://cached/m.m3u8".into(),
        subtitle_urls: vec![],
    });

    let outcome = h.resolver.resolve("cached").await.unwrap();
    assert_eq!(outcome.source, Source::Cache);
    assert_eq!(outcome.result.manifest_url, "https://cached/m.m3u8");
    assert_eq!(h.launcher.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn stale_record_is_refreshed_once() {
    let h = harness(abc123_page());
    let id = StreamId::new("abc123").unwrap();
    h.store.insert(CacheRecord {
        id: id.clone(),
        recorded_at: Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap(),
        manifest_url: "https://old/m.m3u8".into(),
        subtitle_urls: vec!["https://old/en.vtt".into()],
    });

    let outcome = h.resolver.resolve("abc123").await.unwrap();
    assert_eq!(outcome.source, Source::Live);
    assert_eq!(h.launcher.launches(), 1);

    let stored = h.store.snapshot(&id).unwrap();
    assert_eq!(stored.manifest_url, "https://x/a.m3u8");
    assert_eq!(stored.recorded_at, epoch());
}

#[tokio::test(start_paused = true)]
async fn missing_manifest_fails_without_writing() {
    let h = harness(ScriptedSession::new(vec![Step::request(
        "XHR",
        "https://x/en.vtt",
    )]));

    let err = h.resolver.resolve("nothing").await.unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Browser(BrowserError::ManifestNotObserved { .. })
    ));
    assert!(h.store.is_empty());
    assert_eq!(h.launcher.launches(), 1);
    assert_eq!(h.launcher.closes(), 1);
}

#[tokio::test(start_paused = true)]
async fn later_manifest_wins() {
    let h = harness(ScriptedSession::new(vec![
        Step::request("XHR", "https://x/first.m3u8"),
        Step::request("XHR", "https://x/second.m3u8").after_ms(50),
    ])
    .dom_ready_after_ms(100));

    let outcome = h.resolver.resolve("two").await.unwrap();
    assert_eq!(outcome.result.manifest_url, "https://x/second.m3u8");
}

#[tokio::test(start_paused = true)]
async fn cosmetics_are_aborted_never_matched() {
    let h = harness(ScriptedSession::new(vec![
        Step::request("Stylesheet", "https://x/theme.m3u8.css"),
        Step::request("Font", "https://x/glyphs.vtt.woff"),
        Step::request("XHR", "https://x/a.m3u8"),
    ]));

    let outcome = h.resolver.resolve("abc").await.unwrap();
    assert_eq!(outcome.result.manifest_url, "https://x/a.m3u8");
    assert!(outcome.result.subtitle_urls.is_empty());

    let decisions = h.launcher.last_session().unwrap().decisions();
    assert_eq!(decisions.aborted_by_type.get("Stylesheet"), Some(&1));
    assert_eq!(decisions.aborted_by_type.get("Font"), Some(&1));
    assert_eq!(decisions.continued, 1);
}

#[tokio::test(start_paused = true)]
async fn session_closed_on_every_path() {
    let ok = harness(abc123_page());
    ok.resolver.resolve("abc123").await.unwrap();
    assert_eq!(ok.launcher.closes(), 1);

    let timeout = harness(ScriptedSession::new(vec![]));
    timeout.resolver.resolve("abc123").await.unwrap_err();
    assert_eq!(timeout.launcher.closes(), 1);

    let broken = harness(ScriptedSession::new(vec![]).fail_interception());
    let err = broken.resolver.resolve("abc123").await.unwrap_err();
    assert!(matches!(
        err,
        ResolveError::Browser(BrowserError::InterceptionSetup(_))
    ));
    assert_eq!(broken.launcher.closes(), 1);
}

#[tokio::test]
async fn blank_id_is_invalid_input() {
    let h = harness(abc123_page());
    for raw in ["", "   "] {
        let err = h.resolver.resolve(raw).await.unwrap_err();
        assert!(err.is_client_error());
    }
    assert_eq!(h.launcher.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn embed_url_encodes_identifier() {
    let h = harness(abc123_page());
    h.resolver.resolve("a b/c").await.unwrap();
    let session = h.launcher.last_session().unwrap();
    assert_eq!(session.navigations(), [
        "https://embed.test/v2/embed-4/a%20b%2Fc?z=&_debug=true"
    ]);
}

/// Store double whose reads and/or writes fail.
#[derive(Default)]
struct FlakyStore {
    fail_get: bool,
    fail_put: bool,
    puts: AtomicUsize,
}

#[async_trait]
impl StreamStore for FlakyStore {
    async fn get(&self, _id: &StreamId) -> snare_cache::Result<Option<CacheRecord>> {
        if self.fail_get {
            return Err(StoreError::message("connection refused"));
        }
        Ok(None)
    }

    async fn put(&self, _record: &CacheRecord) -> snare_cache::Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put {
            return Err(StoreError::message("read-only replica"));
        }
        Ok(())
    }

    async fn purge(&self, _id: &StreamId) -> snare_cache::Result<bool> {
        Ok(false)
    }

    async fn count(&self) -> snare_cache::Result<u64> {
        Ok(0)
    }

    fn backend(&self) -> &'static str {
        "flaky"
    }
}

#[tokio::test(start_paused = true)]
async fn read_failure_is_store_unavailable() {
    let launcher = Arc::new(ScriptedLauncher::new(abc123_page()));
    let store = Arc::new(FlakyStore {
        fail_get: true,
        ..FlakyStore::default()
    });
    let resolver = resolver_over(store, launcher.clone());

    let err = resolver.resolve("abc123").await.unwrap_err();
    assert!(matches!(err, ResolveError::StoreUnavailable(_)));
    assert_eq!(launcher.launches(), 0);
}

#[tokio::test(start_paused = true)]
async fn write_failure_is_swallowed() {
    let launcher = Arc::new(ScriptedLauncher::new(abc123_page()));
    let store = Arc::new(FlakyStore {
        fail_put: true,
        ..FlakyStore::default()
    });
    let resolver = resolver_over(store.clone(), launcher);

    let outcome = resolver.resolve("abc123").await.unwrap();
    assert_eq!(outcome.result.manifest_url, "https://x/a.m3u8");
    assert_eq!(store.puts.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn refresh_skips_read_and_bypass_skips_write() {
    let h = harness(abc123_page());
    let id = StreamId::new("abc123").unwrap();
    h.store.insert(CacheRecord {
        id: id.clone(),
        recorded_at: epoch(),
        manifest_url: "https://cached/m.m3u8".into(),
        subtitle_urls: vec![],
    });

    let bypass = h
        .resolver
        .resolve_with("abc123", CachePolicy::Bypass)
        .await
        .unwrap();
    assert_eq!(bypass.source, Source::Live);
    assert_eq!(h.store.snapshot(&id).unwrap().manifest_url, "https://cached/m.m3u8");

    let refresh = h
        .resolver
        .resolve_with("abc123", CachePolicy::Refresh)
        .await
        .unwrap();
    assert_eq!(refresh.source, Source::Live);
    assert_eq!(h.store.snapshot(&id).unwrap().manifest_url, "https://x/a.m3u8");
    assert_eq!(h.launcher.launches(), 2);
}

#[tokio::test(start_paused = true)]
async fn session_cap_serialises_live_lookups() {
    let launcher = Arc::new(ScriptedLauncher::new(abc123_page()));
    let resolver = resolver_over(Arc::new(InMemoryStreamStore::new()), launcher.clone())
        .with_max_sessions(1);

    let (a, b) = tokio::join!(resolver.resolve("one"), resolver.resolve("two"));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert_eq!(launcher.launches(), 2);
    // Each capture takes 300ms of scripted time; serialised, one waits.
    assert!(a.elapsed.max(b.elapsed) >= a.elapsed.min(b.elapsed) + Duration::from_millis(300));
}

#[tokio::test(start_paused = true)]
async fn without_cache_always_goes_live() {
    let launcher = Arc::new(ScriptedLauncher::new(abc123_page()));
    let capture = StreamCapture::new(
        launcher.clone(),
        EMBED,
        UrlPatterns::default(),
        RaceConfig::default(),
    );
    let resolver = StreamResolver::new(None, capture);

    resolver.resolve("abc123").await.unwrap();
    resolver.resolve("abc123").await.unwrap();
    assert_eq!(launcher.launches(), 2);
}
