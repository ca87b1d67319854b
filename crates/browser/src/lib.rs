//! Headless-browser capture of an embed page's stream requests.
//!
//! A [`StreamCapture`] launches one isolated Chromium session per attempt,
//! intercepts every outgoing request (stylesheets and fonts are aborted,
//! manifest and subtitle URLs are recorded), and races navigation against
//! a manifest deadline.

pub mod capture;
pub mod detect;
pub mod error;
pub mod intercept;
pub mod launcher;
pub mod race;
pub mod session;
#[cfg(any(test, feature = "testing"))]
pub mod testing;
pub mod types;

pub use {
    capture::StreamCapture,
    error::BrowserError,
    intercept::{InterceptStats, Interceptor, StatsSnapshot, classify},
    launcher::{ChromeLauncher, HARDENING_ARGS},
    race::Capture,
    session::{BrowserSession, SessionGuard, SessionLauncher},
    types::{
        BrowserConfig, InterceptedRequest, PausedRequest, RaceConfig, ResourceKind, UrlPatterns,
        Verdict, embed_url,
    },
};
