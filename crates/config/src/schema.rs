/// Config schema types (server, browser, resolver, cache).
use {
    chrono::{DateTime, TimeZone, Utc},
    secrecy::{ExposeSecret, Secret},
    serde::{Deserialize, Serialize},
};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SnareConfig {
    pub server: ServerConfig,
    pub browser: BrowserConfig,
    pub resolver: ResolverConfig,
    pub cache: CacheConfig,
}

/// HTTP gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Address to bind to. Defaults to "127.0.0.1".
    pub bind: String,
    /// Port to listen on.
    pub port: u16,
    /// Log every HTTP request/response at debug level.
    pub http_request_logs: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 3000,
            http_request_logs: false,
        }
    }
}

/// Headless browser configuration.
///
/// Defaults describe a small portrait phone: the embed page takes its mobile
/// rendering path there, which requests the playlist more reliably.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Path to Chrome/Chromium binary (auto-detected if not set).
    pub chrome_path: Option<String>,
    /// Whether to run in headless mode.
    pub headless: bool,
    pub viewport_width: u32,
    pub viewport_height: u32,
    pub device_scale_factor: f64,
    /// Report a mobile device to the page.
    pub mobile: bool,
    pub has_touch: bool,
    pub landscape: bool,
    /// User agent override (Chrome's own UA, stealth-patched, if not set).
    pub user_agent: Option<String>,
    /// Extra Chrome switches appended after the built-in hardening set.
    pub chrome_args: Vec<String>,
    /// Pass `--no-sandbox` (needed when running as root inside containers).
    pub no_sandbox: bool,
    /// Budget for starting the browser process, in milliseconds.
    pub launch_timeout_ms: u64,
    /// Budget for the embed page to reach DOMContentLoaded, in milliseconds.
    pub navigation_timeout_ms: u64,
    /// Maximum concurrent live resolutions (0 = unlimited).
    pub max_sessions: usize,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            viewport_width: 360,
            viewport_height: 640,
            device_scale_factor: 1.0,
            mobile: true,
            has_touch: false,
            landscape: false,
            user_agent: None,
            chrome_args: Vec::new(),
            no_sandbox: false,
            launch_timeout_ms: 20_000,
            navigation_timeout_ms: 30_000,
            max_sessions: 4,
        }
    }
}

/// Where to navigate and what to look for.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Embed page URL; `{id}` is replaced by the percent-encoded identifier.
    pub embed_url: String,
    /// Substring identifying the playlist request.
    pub manifest_pattern: String,
    /// Substring identifying subtitle track requests.
    pub subtitle_pattern: String,
    /// How long to wait for the first playlist request, in milliseconds.
    pub manifest_timeout_ms: u64,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            embed_url: "https://rabbitstream.net/v2/embed-4/{id}?z=&_debug=true".into(),
            manifest_pattern: ".m3u8".into(),
            subtitle_pattern: ".vtt".into(),
            manifest_timeout_ms: 20_000,
        }
    }
}

/// Cache backend selection.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Sqlite,
    Postgrest,
    Memory,
}

impl std::fmt::Display for CacheBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite => write!(f, "sqlite"),
            Self::Postgrest => write!(f, "postgrest"),
            Self::Memory => write!(f, "memory"),
        }
    }
}

impl std::str::FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "postgrest" | "supabase" => Ok(Self::Postgrest),
            "memory" => Ok(Self::Memory),
            other => Err(format!("unknown cache backend: {other}")),
        }
    }
}

/// Stream cache configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// When false every lookup launches a browser and nothing is written.
    pub enabled: bool,
    pub backend: CacheBackend,
    /// Cache-epoch marker. Only records stamped with exactly this instant are
    /// served; change it to invalidate every entry at once.
    pub epoch: DateTime<Utc>,
    pub sqlite: SqliteConfig,
    pub postgrest: PostgrestConfig,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            backend: CacheBackend::default(),
            epoch: default_epoch(),
            sqlite: SqliteConfig::default(),
            postgrest: PostgrestConfig::default(),
        }
    }
}

/// 2024-03-18T10:30:00.000Z
pub fn default_epoch() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, 18, 10, 30, 0)
        .single()
        .unwrap_or_default()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SqliteConfig {
    /// sqlx database URL. Defaults to `<data_dir>/snare.db`.
    pub database_url: Option<String>,
}

/// PostgREST (e.g. Supabase) table configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PostgrestConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`.
    pub url: Option<String>,
    /// Service or anon key, sent as `apikey` and bearer token.
    #[serde(
        default,
        serialize_with = "serialize_option_secret",
        skip_serializing_if = "Option::is_none"
    )]
    pub api_key: Option<Secret<String>>,
    pub table: String,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for PostgrestConfig {
    fn default() -> Self {
        Self {
            url: None,
            api_key: None,
            table: "streams".into(),
            timeout_secs: 10,
        }
    }
}

fn serialize_option_secret<S: serde::Serializer>(
    secret: &Option<Secret<String>>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    match secret {
        Some(s) => serializer.serialize_some(s.expose_secret()),
        None => serializer.serialize_none(),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_mobile_profile() {
        let cfg = SnareConfig::default();
        assert_eq!(cfg.browser.viewport_width, 360);
        assert_eq!(cfg.browser.viewport_height, 640);
        assert!(cfg.browser.mobile);
        assert!(!cfg.browser.has_touch);
        assert!(!cfg.browser.landscape);
        assert_eq!(cfg.resolver.manifest_timeout_ms, 20_000);
    }

    #[test]
    fn default_epoch_is_stable() {
        assert_eq!(
            default_epoch().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
            "2024-03-18T10:30:00.000Z"
        );
    }

    #[test]
    fn epoch_parses_from_toml() {
        let cfg: SnareConfig = toml::from_str(
            r#"
            [cache]
            epoch = "2025-01-01T00:00:00Z"
            backend = "memory"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.cache.backend, CacheBackend::Memory);
        assert_eq!(cfg.cache.epoch.timestamp(), 1_735_689_600);
    }

    #[test]
    fn backend_from_str_accepts_supabase_alias() {
        assert_eq!(
            "Supabase".parse::<CacheBackend>().unwrap(),
            CacheBackend::Postgrest
        );
        assert!("redis".parse::<CacheBackend>().is_err());
    }

    #[test]
    fn api_key_serializes_exposed() {
        let mut cfg = SnareConfig::default();
        cfg.cache.postgrest.api_key = Some(Secret::new("k".into()));
        let out = toml::to_string(&cfg).unwrap();
        assert!(out.contains("api_key = \"k\""));
    }
}
