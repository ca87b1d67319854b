//! Locating a Chromium-based binary to drive.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::BrowserError;

/// Executable names looked up on `PATH`, most specific first.
const EXECUTABLE_NAMES: &[&str] = &[
    "google-chrome-stable",
    "google-chrome",
    "chrome",
    "chromium",
    "chromium-browser",
    "headless-shell",
    "microsoft-edge-stable",
    "msedge",
    "brave-browser",
];

#[cfg(target_os = "macos")]
const PLATFORM_PATHS: &[&str] = &[
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
    "/Applications/Microsoft Edge.app/Contents/MacOS/Microsoft Edge",
];

#[cfg(target_os = "windows")]
const PLATFORM_PATHS: &[&str] = &[
    r"C:\Program Files\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
    r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
];

// Container images usually ship the binary outside PATH.
#[cfg(not(any(target_os = "macos", target_os = "windows")))]
const PLATFORM_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/lib/chromium/chromium",
    "/opt/google/chrome/chrome",
    "/headless-shell/headless-shell",
];

/// Where a binary was found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    Configured,
    EnvVar,
    PlatformPath,
    SearchPath,
}

#[derive(Debug, Clone)]
pub struct Detected {
    pub path: PathBuf,
    pub origin: Origin,
}

/// Find a browser binary.
///
/// Order: configured path, `CHROME` env var, platform install locations,
/// then well-known names on `PATH`. A configured path that does not exist is
/// an error rather than a silent fallback.
pub fn locate(configured: Option<&str>) -> Result<Detected, BrowserError> {
    locate_with(configured, std::env::var("CHROME").ok().as_deref(), |name| {
        which::which(name).ok()
    })
}

pub(crate) fn locate_with(
    configured: Option<&str>,
    env_chrome: Option<&str>,
    search: impl Fn(&str) -> Option<PathBuf>,
) -> Result<Detected, BrowserError> {
    if let Some(path) = configured.filter(|p| !p.trim().is_empty()) {
        let p = PathBuf::from(path);
        if is_file(&p) {
            return Ok(Detected {
                path: p,
                origin: Origin::Configured,
            });
        }
        return Err(BrowserError::BrowserNotAvailable(format!(
            "configured chrome_path {path} does not exist"
        )));
    }

    if let Some(path) = env_chrome.filter(|p| !p.trim().is_empty()) {
        let p = PathBuf::from(path);
        if is_file(&p) {
            return Ok(Detected {
                path: p,
                origin: Origin::EnvVar,
            });
        }
        warn!(path, "CHROME points at a missing file, continuing search");
    }

    if let Some(p) = PLATFORM_PATHS.iter().map(PathBuf::from).find(|p| is_file(p)) {
        return Ok(Detected {
            path: p,
            origin: Origin::PlatformPath,
        });
    }

    for name in EXECUTABLE_NAMES {
        if let Some(path) = search(name) {
            debug!(name, path = %path.display(), "browser found on PATH");
            return Ok(Detected {
                path,
                origin: Origin::SearchPath,
            });
        }
    }

    Err(BrowserError::BrowserNotAvailable(install_hint()))
}

fn is_file(path: &Path) -> bool {
    path.is_file()
}

/// Platform-specific install instructions.
pub fn install_hint() -> String {
    let instructions = if cfg!(target_os = "macos") {
        "  brew install --cask google-chrome"
    } else if cfg!(target_os = "windows") {
        "  winget install Google.Chrome"
    } else {
        "  Debian/Ubuntu: sudo apt install chromium\n  \
         Fedora:        sudo dnf install chromium\n  \
         Alpine:        apk add chromium"
    };

    format!(
        "no Chromium-based browser found. Install one:\n\n\
         {instructions}\n\n\
         or point snare at an existing binary:\n  \
         [browser]\n  \
         chrome_path = \"/path/to/chrome\"\n\n\
         (SNARE_CHROME_PATH and CHROME are honoured too)"
    )
}

/// Log the detection outcome. Returns whether a browser is usable.
pub fn check_and_log(configured: Option<&str>) -> bool {
    match locate(configured) {
        Ok(found) => {
            info!(path = %found.path.display(), origin = ?found.origin, "browser detected");
            true
        },
        Err(e) => {
            warn!(error = %e, "browser not available, live resolution will fail");
            false
        },
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn nothing_on_path(_: &str) -> Option<PathBuf> {
        None
    }

    #[test]
    fn configured_path_wins() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("chrome");
        std::fs::write(&bin, "").unwrap();

        let found = locate_with(bin.to_str(), Some("/elsewhere"), nothing_on_path).unwrap();
        assert_eq!(found.path, bin);
        assert_eq!(found.origin, Origin::Configured);
    }

    #[test]
    fn missing_configured_path_is_an_error() {
        let err = locate_with(Some("/nonexistent/chrome"), None, |_| {
            Some(PathBuf::from("/usr/bin/chromium"))
        })
        .unwrap_err();
        assert!(matches!(err, BrowserError::BrowserNotAvailable(msg) if msg.contains("/nonexistent/chrome")));
    }

    #[test]
    fn env_var_used_when_unconfigured() {
        let dir = tempfile::tempdir().unwrap();
        let bin = dir.path().join("chromium");
        std::fs::write(&bin, "").unwrap();

        let found = locate_with(None, bin.to_str(), nothing_on_path).unwrap();
        assert_eq!(found.origin, Origin::EnvVar);
    }

    #[test]
    fn falls_back_to_search_path() {
        // Platform paths may exist on the test host; only assert when they don't.
        if PLATFORM_PATHS.iter().any(|p| Path::new(p).is_file()) {
            return;
        }
        let found = locate_with(None, Some("/missing"), |name| {
            (name == "chromium").then(|| PathBuf::from("/opt/bin/chromium"))
        })
        .unwrap();
        assert_eq!(found.origin, Origin::SearchPath);
        assert_eq!(found.path, PathBuf::from("/opt/bin/chromium"));
    }

    #[test]
    fn not_found_carries_install_hint() {
        if PLATFORM_PATHS.iter().any(|p| Path::new(p).is_file()) {
            return;
        }
        let err = locate_with(None, None, nothing_on_path).unwrap_err();
        assert!(err.to_string().contains("chrome_path"));
    }
}
