//! Session configuration and request classification types.

use std::{fmt, time::Duration};

use serde::Serialize;

/// Runtime browser configuration.
#[derive(Debug, Clone)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    pub mobile: bool,
    pub has_touch: bool,
    pub landscape: bool,
    pub user_agent: Option<String>,
    /// Extra switches appended after [`crate::launcher::HARDENING_ARGS`].
    pub chrome_args: Vec<String>,
    pub no_sandbox: bool,
    pub launch_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self::from(&snare_config::BrowserConfig::default())
    }
}

impl From<&snare_config::BrowserConfig> for BrowserConfig {
    fn from(cfg: &snare_config::BrowserConfig) -> Self {
        Self {
            chrome_path: cfg.chrome_path.clone(),
            headless: cfg.headless,
            viewport_width: cfg.viewport_width,
            viewport_height: cfg.viewport_height,
            device_scale_factor: cfg.device_scale_factor,
            mobile: cfg.mobile,
            has_touch: cfg.has_touch,
            landscape: cfg.landscape,
            user_agent: cfg.user_agent.clone(),
            chrome_args: cfg.chrome_args.clone(),
            no_sandbox: cfg.no_sandbox,
            launch_timeout: Duration::from_millis(cfg.launch_timeout_ms),
        }
    }
}

/// Budgets for one navigation attempt.
#[derive(Debug, Clone, Copy)]
pub struct RaceConfig {
    /// Wait for the first manifest request. Authoritative: a manifest seen
    /// after this elapses does not count.
    pub manifest_timeout: Duration,
    /// Wait for DOMContentLoaded.
    pub navigation_timeout: Duration,
}

impl RaceConfig {
    pub fn from_config(config: &snare_config::SnareConfig) -> Self {
        Self {
            manifest_timeout: Duration::from_millis(config.resolver.manifest_timeout_ms),
            navigation_timeout: Duration::from_millis(config.browser.navigation_timeout_ms),
        }
    }
}

impl Default for RaceConfig {
    fn default() -> Self {
        Self::from_config(&snare_config::SnareConfig::default())
    }
}

/// URL substrings that mark the requests worth recording.
#[derive(Debug, Clone)]
pub struct UrlPatterns {
    pub manifest: String,
    pub subtitle: String,
}

impl UrlPatterns {
    pub fn new(manifest: impl Into<String>, subtitle: impl Into<String>) -> Self {
        Self {
            manifest: manifest.into(),
            subtitle: subtitle.into(),
        }
    }

    pub fn is_manifest(&self, url: &str) -> bool {
        url.contains(&self.manifest)
    }

    pub fn is_subtitle(&self, url: &str) -> bool {
        url.contains(&self.subtitle)
    }
}

impl Default for UrlPatterns {
    fn default() -> Self {
        Self::from(&snare_config::ResolverConfig::default())
    }
}

impl From<&snare_config::ResolverConfig> for UrlPatterns {
    fn from(cfg: &snare_config::ResolverConfig) -> Self {
        Self::new(cfg.manifest_pattern.clone(), cfg.subtitle_pattern.clone())
    }
}

/// What the interceptor decided a request is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResourceKind {
    Stylesheet,
    Font,
    ManifestCandidate,
    SubtitleCandidate,
    Other,
}

impl ResourceKind {
    /// Stylesheets and fonts are never needed to find the manifest.
    pub fn is_blocked(self) -> bool {
        matches!(self, Self::Stylesheet | Self::Font)
    }

    pub fn is_candidate(self) -> bool {
        matches!(self, Self::ManifestCandidate | Self::SubtitleCandidate)
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Stylesheet => "stylesheet",
            Self::Font => "font",
            Self::ManifestCandidate => "manifest",
            Self::SubtitleCandidate => "subtitle",
            Self::Other => "other",
        };
        f.write_str(s)
    }
}

/// A manifest or subtitle request seen during one navigation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterceptedRequest {
    pub url: String,
    pub kind: ResourceKind,
}

/// A request paused by the browser, waiting for a [`Verdict`].
#[derive(Debug, Clone)]
pub struct PausedRequest {
    pub request_id: String,
    pub url: String,
    /// Raw CDP resource type (`"Stylesheet"`, `"Font"`, `"XHR"`, ...).
    pub resource_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Abort,
}

/// Substitute the percent-encoded identifier into the embed URL template.
pub fn embed_url(template: &str, id: &str) -> String {
    template.replace("{id}", &urlencoding::encode(id))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn embed_url_fills_placeholder() {
        assert_eq!(
            embed_url("https://host/v2/embed-4/{id}?z=&_debug=true", "abc123"),
            "https://host/v2/embed-4/abc123?z=&_debug=true"
        );
    }

    #[test]
    fn embed_url_encodes_identifier() {
        assert_eq!(
            embed_url("https://host/e/{id}", "a b/../c?x=1"),
            "https://host/e/a%20b%2F..%2Fc%3Fx%3D1"
        );
    }

    #[test]
    fn patterns_match_substrings() {
        let p = UrlPatterns::default();
        assert!(p.is_manifest("https://cdn/x/master.m3u8?token=1"));
        assert!(!p.is_manifest("https://cdn/x/seg-1.ts"));
        assert!(p.is_subtitle("https://cdn/subs/eng-2.vtt"));
    }

    #[test]
    fn blocked_kinds() {
        assert!(ResourceKind::Stylesheet.is_blocked());
        assert!(ResourceKind::Font.is_blocked());
        assert!(!ResourceKind::ManifestCandidate.is_blocked());
        assert!(!ResourceKind::Other.is_candidate());
    }

    #[test]
    fn config_defaults_flow_through() {
        let cfg = BrowserConfig::default();
        assert_eq!((cfg.viewport_width, cfg.viewport_height), (360, 640));
        assert!(cfg.mobile && !cfg.has_touch && !cfg.landscape);
        let race = RaceConfig::default();
        assert_eq!(race.manifest_timeout, Duration::from_secs(20));
    }
}
