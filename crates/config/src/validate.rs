//! Semantic checks on a parsed configuration.
//!
//! Parsing already rejects malformed values; this pass reports settings that
//! parse fine but cannot work (a template without `{id}`, zero timeouts, a
//! PostgREST backend with no URL).

use std::path::Path;

use crate::{
    loader::load_config,
    schema::{CacheBackend, SnareConfig},
};

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Dotted path, e.g. "resolver.embed_url"
    pub path: &'static str,
    pub message: String,
}

impl Diagnostic {
    fn error(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            path,
            message: message.into(),
        }
    }

    fn warning(path: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            path,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}] {}", self.severity, self.path, self.message)
    }
}

/// Load `path` and report a read or parse failure as an error.
///
/// [`crate::discover_and_load`] falls back to defaults when the file is
/// broken, so [`validate`] on its result cannot see these.
pub fn check_file(path: &Path) -> Option<Diagnostic> {
    load_config(path)
        .err()
        .map(|e| Diagnostic::error("config", format!("{}: {e}", path.display())))
}

/// Validate a configuration, returning every problem found.
pub fn validate(config: &SnareConfig) -> Vec<Diagnostic> {
    let mut out = Vec::new();

    let resolver = &config.resolver;
    if !resolver.embed_url.contains("{id}") {
        out.push(Diagnostic::error(
            "resolver.embed_url",
            "template must contain an {id} placeholder",
        ));
    }
    match url::Url::parse(&resolver.embed_url.replace("{id}", "id")) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {},
        Ok(url) => out.push(Diagnostic::error(
            "resolver.embed_url",
            format!("unsupported scheme {}, expected http(s)", url.scheme()),
        )),
        Err(e) => out.push(Diagnostic::error(
            "resolver.embed_url",
            format!("not a valid URL: {e}"),
        )),
    }
    if resolver.manifest_pattern.is_empty() {
        out.push(Diagnostic::error(
            "resolver.manifest_pattern",
            "empty pattern would match every request",
        ));
    }
    if resolver.subtitle_pattern.is_empty() {
        out.push(Diagnostic::warning(
            "resolver.subtitle_pattern",
            "empty pattern records every request as a subtitle",
        ));
    }
    if resolver.manifest_timeout_ms == 0 {
        out.push(Diagnostic::error(
            "resolver.manifest_timeout_ms",
            "must be greater than zero",
        ));
    }

    let browser = &config.browser;
    if browser.navigation_timeout_ms == 0 {
        out.push(Diagnostic::error(
            "browser.navigation_timeout_ms",
            "must be greater than zero",
        ));
    }
    if browser.navigation_timeout_ms < resolver.manifest_timeout_ms {
        out.push(Diagnostic::warning(
            "browser.navigation_timeout_ms",
            "shorter than resolver.manifest_timeout_ms; slow pages fail before the playlist wait ends",
        ));
    }
    if browser.viewport_width == 0 || browser.viewport_height == 0 {
        out.push(Diagnostic::error(
            "browser.viewport_width",
            "viewport dimensions must be non-zero",
        ));
    }

    if config.cache.enabled && config.cache.backend == CacheBackend::Postgrest {
        if config.cache.postgrest.url.is_none() {
            out.push(Diagnostic::error(
                "cache.postgrest.url",
                "required when cache.backend = \"postgrest\"",
            ));
        }
        if config.cache.postgrest.api_key.is_none() {
            out.push(Diagnostic::warning(
                "cache.postgrest.api_key",
                "no key set; requests will be anonymous",
            ));
        }
    }
    if config.cache.enabled && config.cache.backend == CacheBackend::Memory {
        out.push(Diagnostic::warning(
            "cache.backend",
            "memory cache is lost on restart",
        ));
    }

    out
}
