use std::{
    path::{Path, PathBuf},
    sync::RwLock,
};

use {
    secrecy::Secret,
    tracing::{debug, warn},
};

use crate::{
    env_subst::substitute_env,
    error::{ConfigError, Result},
    schema::SnareConfig,
};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &["snare.toml", "snare.yaml", "snare.yml", "snare.json"];

static CONFIG_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);
static DATA_DIR_OVERRIDE: RwLock<Option<PathBuf>> = RwLock::new(None);

/// Override the user-global config directory (e.g. from `--config-dir`).
pub fn set_config_dir(dir: PathBuf) {
    *CONFIG_DIR_OVERRIDE
        .write()
        .unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

/// Override the data directory (e.g. from `--data-dir`).
pub fn set_data_dir(dir: PathBuf) {
    *DATA_DIR_OVERRIDE.write().unwrap_or_else(|e| e.into_inner()) = Some(dir);
}

/// Returns the user-global config directory (`~/.config/snare/`).
pub fn config_dir() -> Option<PathBuf> {
    if let Some(dir) = CONFIG_DIR_OVERRIDE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return Some(dir);
    }
    directories::ProjectDirs::from("", "", "snare").map(|d| d.config_dir().to_path_buf())
}

/// Returns the data directory holding the default SQLite cache.
pub fn data_dir() -> PathBuf {
    if let Some(dir) = DATA_DIR_OVERRIDE
        .read()
        .unwrap_or_else(|e| e.into_inner())
        .clone()
    {
        return dir;
    }
    directories::ProjectDirs::from("", "", "snare")
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from(".snare"))
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<SnareConfig> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_config(&substitute_env(&raw), path)
}

/// Discover and load config from standard locations, then apply `SNARE_*`
/// environment overrides.
///
/// Search order:
/// 1. `./snare.{toml,yaml,yml,json}`
/// 2. `~/.config/snare/snare.{toml,yaml,yml,json}`
///
/// Falls back to `SnareConfig::default()` when nothing is found or the file
/// does not parse.
pub fn discover_and_load() -> SnareConfig {
    let config = match find_config_file() {
        Some(path) => {
            debug!(path = %path.display(), "loading config");
            load_config(&path).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                SnareConfig::default()
            })
        },
        None => {
            debug!("no config file found, using defaults");
            SnareConfig::default()
        },
    };
    apply_env_overrides(config)
}

fn find_config_file() -> Option<PathBuf> {
    let local = CONFIG_FILENAMES.iter().map(PathBuf::from);
    let global = config_dir()
        .into_iter()
        .flat_map(|dir| CONFIG_FILENAMES.iter().map(move |name| dir.join(name)));
    local.chain(global).find(|p| p.exists())
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    find_config_file().unwrap_or_else(|| {
        config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("snare.toml")
    })
}

/// Apply `SNARE_*` environment overrides on top of a loaded config.
pub fn apply_env_overrides(config: SnareConfig) -> SnareConfig {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

fn apply_env_overrides_with(
    mut config: SnareConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> SnareConfig {
    let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

    if let Some(bind) = get("SNARE_BIND") {
        config.server.bind = bind;
    }
    if let Some(port) = get("SNARE_PORT") {
        match port.parse() {
            Ok(port) => config.server.port = port,
            Err(_) => warn!(value = %port, "ignoring invalid SNARE_PORT"),
        }
    }
    if let Some(path) = get("SNARE_CHROME_PATH") {
        config.browser.chrome_path = Some(path);
    }
    if let Some(backend) = get("SNARE_CACHE_BACKEND") {
        match backend.parse() {
            Ok(backend) => config.cache.backend = backend,
            Err(e) => warn!(error = %e, "ignoring invalid SNARE_CACHE_BACKEND"),
        }
    }
    if let Some(epoch) = get("SNARE_CACHE_EPOCH") {
        match chrono::DateTime::parse_from_rfc3339(&epoch) {
            Ok(epoch) => config.cache.epoch = epoch.with_timezone(&chrono::Utc),
            Err(e) => warn!(value = %epoch, error = %e, "ignoring invalid SNARE_CACHE_EPOCH"),
        }
    }
    if let Some(url) = get("SNARE_DATABASE_URL") {
        config.cache.sqlite.database_url = Some(url);
    }
    if let Some(url) = get("SNARE_POSTGREST_URL").or_else(|| get("SUPABASE_URL")) {
        config.cache.postgrest.url = Some(url);
    }
    if let Some(key) = get("SNARE_POSTGREST_KEY").or_else(|| get("SUPABASE_KEY")) {
        config.cache.postgrest.api_key = Some(Secret::new(key));
    }
    config
}

/// Serialize `config` to TOML and write it to `path`, creating parents.
pub fn save_config_to(config: &SnareConfig, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    let toml_str = toml::to_string_pretty(config).map_err(|e| ConfigError::Write {
        path: path.to_path_buf(),
        source: std::io::Error::other(e),
    })?;
    std::fs::write(path, toml_str).map_err(|source| ConfigError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

fn parse_config(raw: &str, path: &Path) -> Result<SnareConfig> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match ext {
        "toml" => Ok(toml::from_str(raw)?),
        "yaml" | "yml" => Ok(serde_yaml::from_str(raw)?),
        "json" => Ok(serde_json::from_str(raw)?),
        _ => Err(ConfigError::UnsupportedFormat {
            extension: ext.to_string(),
        }),
    }
}
