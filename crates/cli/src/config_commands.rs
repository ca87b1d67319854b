use std::path::Path;

use {
    anyhow::{Result, bail},
    clap::Subcommand,
    snare_config::{Diagnostic, Severity, SnareConfig},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the effective configuration and report errors/warnings.
    Check,
    /// Write a commented default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
    /// Print the effective configuration as JSON (secrets redacted).
    Show,
}

pub fn handle_config(config: &SnareConfig, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Check => check(config),
        ConfigAction::Init { force } => init(config, force),
        ConfigAction::Show => {
            println!("{}", redacted_json(config)?);
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(config: &SnareConfig) -> Result<()> {
    let path = snare_config::find_or_default_config_path();
    if path.exists() {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let diagnostics = collect_diagnostics(config, &path);
    for d in &diagnostics {
        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
        };
        eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
    }

    let errors = diagnostics
        .iter()
        .filter(|d| d.severity == Severity::Error)
        .count();
    let warnings = diagnostics.len() - errors;

    if diagnostics.is_empty() {
        eprintln!("No issues found.");
    } else {
        eprintln!("\n{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }
    Ok(())
}

/// File-level failures first, then semantic checks on the effective config.
pub(crate) fn collect_diagnostics(config: &SnareConfig, path: &Path) -> Vec<Diagnostic> {
    let mut out: Vec<Diagnostic> = if path.exists() {
        snare_config::check_file(path).into_iter().collect()
    } else {
        Vec::new()
    };
    out.extend(snare_config::validate(config));
    out
}

fn init(config: &SnareConfig, force: bool) -> Result<()> {
    let path = snare_config::config_dir()
        .unwrap_or_else(|| std::path::PathBuf::from("."))
        .join("snare.toml");
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(
        &path,
        snare_config::template::default_config_template(config.server.port),
    )?;
    eprintln!("Wrote {}", path.display());
    Ok(())
}

fn redacted_json(config: &SnareConfig) -> Result<String> {
    let mut value = serde_json::to_value(config)?;
    if let Some(key) = value.pointer_mut("/cache/postgrest/api_key")
        && !key.is_null()
    {
        *key = serde_json::Value::String("[REDACTED]".into());
    }
    Ok(serde_json::to_string_pretty(&value)?)
}
