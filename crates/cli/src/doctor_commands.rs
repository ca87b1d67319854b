//! `snare doctor`: browser, config, and cache backend audit.
//!
//! Prints one `[ok]`, `[warn]`, `[fail]`, or `[info]` line per check.

use {
    anyhow::Result,
    snare_browser::detect,
    snare_config::{Severity, SnareConfig},
};

// ── ANSI helpers ────────────────────────────────────────────────────────────

const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Info,
}

impl Status {
    fn label(self) -> &'static str {
        match self {
            Self::Ok => "ok",
            Self::Warn => "warn",
            Self::Fail => "fail",
            Self::Info => "info",
        }
    }

    fn color(self) -> &'static str {
        match self {
            Self::Ok => GREEN,
            Self::Warn => YELLOW,
            Self::Fail => RED,
            Self::Info => CYAN,
        }
    }
}

struct CheckItem {
    status: Status,
    message: String,
}

impl CheckItem {
    fn new(status: Status, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

fn print_section(title: &str, items: &[CheckItem]) {
    eprintln!("{BOLD}{title}{RESET}");
    for item in items {
        eprintln!(
            "  {}[{}]{RESET} {}",
            item.status.color(),
            item.status.label(),
            item.message
        );
    }
    eprintln!();
}

fn config_checks(config: &SnareConfig) -> Vec<CheckItem> {
    let path = snare_config::find_or_default_config_path();
    let mut items = vec![if path.exists() {
        CheckItem::new(Status::Info, format!("config file: {}", path.display()))
    } else {
        CheckItem::new(Status::Info, "no config file, using defaults")
    }];

    let diagnostics = crate::config_commands::collect_diagnostics(config, &path);
    if diagnostics.is_empty() {
        items.push(CheckItem::new(Status::Ok, "configuration is valid"));
    }
    items.extend(diagnostics.into_iter().map(|d| {
        let status = match d.severity {
            Severity::Error => Status::Fail,
            Severity::Warning => Status::Warn,
        };
        CheckItem::new(status, format!("{}: {}", d.path, d.message))
    }));
    items.push(CheckItem::new(
        Status::Info,
        format!("embed url: {}", config.resolver.embed_url),
    ));
    items
}

fn browser_checks(config: &SnareConfig) -> Vec<CheckItem> {
    match detect::locate(config.browser.chrome_path.as_deref()) {
        Ok(found) => vec![
            CheckItem::new(
                Status::Ok,
                format!("browser: {} ({:?})", found.path.display(), found.origin),
            ),
            CheckItem::new(
                Status::Info,
                format!(
                    "viewport {}x{} @{} mobile={} headless={}",
                    config.browser.viewport_width,
                    config.browser.viewport_height,
                    config.browser.device_scale_factor,
                    config.browser.mobile,
                    config.browser.headless
                ),
            ),
        ],
        Err(e) => vec![CheckItem::new(Status::Fail, e.to_string())],
    }
}

async fn cache_checks(config: &SnareConfig) -> Vec<CheckItem> {
    if !config.cache.enabled {
        return vec![CheckItem::new(Status::Warn, "cache disabled, every lookup launches a browser")];
    }
    match snare_cache::open_gateway(&config.cache).await {
        Ok(cache) => match cache.count().await {
            Ok(n) => vec![
                CheckItem::new(
                    Status::Ok,
                    format!("{} backend reachable, {n} record(s)", cache.backend()),
                ),
                CheckItem::new(Status::Info, format!("epoch: {}", cache.epoch().to_rfc3339())),
            ],
            Err(e) => vec![CheckItem::new(
                Status::Fail,
                format!("{} backend unreadable: {e}", cache.backend()),
            )],
        },
        Err(e) => vec![CheckItem::new(
            Status::Fail,
            format!("{} backend failed to open: {e}", config.cache.backend),
        )],
    }
}

pub async fn handle_doctor(config: &SnareConfig) -> Result<()> {
    let sections = [
        ("Configuration", config_checks(config)),
        ("Browser", browser_checks(config)),
        ("Cache", cache_checks(config).await),
    ];

    let mut failures = 0;
    for (title, items) in &sections {
        print_section(title, items);
        failures += items.iter().filter(|i| i.status == Status::Fail).count();
    }

    if failures > 0 {
        eprintln!("{RED}{failures} check(s) failed{RESET}");
        std::process::exit(1);
    }
    eprintln!("{GREEN}All checks passed.{RESET}");
    Ok(())
}
