mod cache_commands;
mod config_commands;
mod doctor_commands;

use std::{path::PathBuf, sync::Arc};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    snare_browser::ChromeLauncher,
    snare_config::SnareConfig,
    snare_resolver::{CachePolicy, StreamResolver},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "snare", version, about = "Snare: embed stream resolver")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,

    /// Address to bind to (overrides config value).
    #[arg(long, global = true)]
    bind: Option<String>,
    /// Port to listen on (overrides config value).
    #[arg(long, global = true)]
    port: Option<u16>,
    /// Custom config directory (overrides default ~/.config/snare/).
    #[arg(long, global = true, env = "SNARE_CONFIG_DIR")]
    config_dir: Option<PathBuf>,
    /// Custom data directory (overrides default data dir).
    #[arg(long, global = true, env = "SNARE_DATA_DIR")]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP gateway (default when no subcommand is provided).
    Serve,
    /// Resolve one identifier and print the result as JSON.
    Resolve {
        id: String,
        /// Skip the cache read but store the fresh result.
        #[arg(long, conflicts_with = "no_cache")]
        refresh: bool,
        /// Neither read nor write the cache.
        #[arg(long)]
        no_cache: bool,
    },
    /// Inspect or modify the stream cache.
    Cache {
        #[command(subcommand)]
        action: cache_commands::CacheAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
    /// Check the browser, configuration, and cache backend.
    Doctor,
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(
                fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false)
                    .with_writer(std::io::stderr),
            )
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true)
                    .with_writer(std::io::stderr),
            )
            .init();
    }
}

/// Config directories first, then the file, then `SNARE_*` env, then flags.
fn load_config(cli: &Cli) -> SnareConfig {
    if let Some(ref dir) = cli.config_dir {
        snare_config::set_config_dir(dir.clone());
    }
    if let Some(ref dir) = cli.data_dir {
        snare_config::set_data_dir(dir.clone());
    }

    apply_flag_overrides(cli, snare_config::discover_and_load())
}

fn apply_flag_overrides(cli: &Cli, mut config: SnareConfig) -> SnareConfig {
    if let Some(ref bind) = cli.bind {
        config.server.bind = bind.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }
    config
}

/// Wire the cache and a Chromium launcher into a resolver.
async fn build_resolver(config: &SnareConfig) -> anyhow::Result<StreamResolver> {
    let cache = if config.cache.enabled {
        Some(
            snare_cache::open_gateway(&config.cache)
                .await
                .context("failed to open stream cache")?,
        )
    } else {
        info!("stream cache disabled");
        None
    };
    let launcher = Arc::new(ChromeLauncher::new((&config.browser).into()));
    Ok(StreamResolver::from_config(config, cache, launcher))
}

async fn resolve(config: &SnareConfig, id: &str, policy: CachePolicy) -> anyhow::Result<()> {
    let resolver = build_resolver(config).await?;
    let outcome = resolver.resolve_with(id, policy).await?;
    println!("{}", serde_json::to_string_pretty(&outcome.result)?);
    eprintln!(
        "{} in {} ms",
        outcome.source,
        outcome.elapsed.as_millis()
    );
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    init_telemetry(&cli);
    let config = load_config(&cli);

    match cli.command {
        None | Some(Commands::Serve) => {
            info!(version = env!("CARGO_PKG_VERSION"), "snare starting");
            snare_browser::detect::check_and_log(config.browser.chrome_path.as_deref());
            let resolver = build_resolver(&config).await?;
            snare_gateway::start_gateway(&config.server, resolver).await
        },
        Some(Commands::Resolve {
            id,
            refresh,
            no_cache,
        }) => {
            let policy = if no_cache {
                CachePolicy::Bypass
            } else if refresh {
                CachePolicy::Refresh
            } else {
                CachePolicy::Use
            };
            resolve(&config, &id, policy).await
        },
        Some(Commands::Cache { action }) => cache_commands::handle_cache(&config, action).await,
        Some(Commands::Config { action }) => config_commands::handle_config(&config, action),
        Some(Commands::Doctor) => doctor_commands::handle_doctor(&config).await,
    }
}
