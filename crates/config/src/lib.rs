//! Configuration loading, validation and env substitution.
//!
//! Config files: `snare.toml`, `snare.yaml`, or `snare.json`
//! Searched in `./` then `~/.config/snare/`.
//!
//! Supports `${ENV_VAR}` and `${ENV_VAR:-fallback}` substitution in all
//! string values, and `SNARE_*` environment overrides for the common knobs.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod template;
pub mod validate;

pub use {
    error::{ConfigError, Result},
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_or_default_config_path,
        load_config, save_config_to, set_config_dir, set_data_dir,
    },
    schema::{
        BrowserConfig, CacheBackend, CacheConfig, PostgrestConfig, ResolverConfig, ServerConfig,
        SnareConfig, SqliteConfig,
    },
    validate::{Diagnostic, Severity, check_file, validate},
};
