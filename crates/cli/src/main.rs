mod config_commands;
mod master_command;
mod sessions_commands;

use std::path::PathBuf;

use {
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

#[derive(Parser)]
#[command(name = "herald", about = "Herald: location registry and channel broker")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory searched first for herald.{toml,yaml,yml,json}.
    #[arg(long, global = true, env = "HERALD_CONFIG_DIR")]
    config_dir: Option<PathBuf>,

    /// Journal and database root, overriding `home` from the config.
    #[arg(long, global = true, env = "HERALD_HOME")]
    home: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the broker until interrupted.
    Master,
    /// Query the session index.
    Sessions {
        #[command(subcommand)]
        action: sessions_commands::SessionAction,
    },
    /// Configuration management.
    Config {
        #[command(subcommand)]
        action: config_commands::ConfigAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    if let Some(dir) = &cli.config_dir {
        herald_config::set_config_dir(dir.clone());
    }
    let mut config = herald_config::discover_and_load();
    if let Some(home) = cli.home {
        config.home = Some(home);
    }

    info!(version = env!("CARGO_PKG_VERSION"), home = %config.home_dir().display(), "herald starting");

    match cli.command {
        Commands::Master => master_command::run(&config).await,
        Commands::Sessions { action } => sessions_commands::handle_sessions(action, &config).await,
        Commands::Config { action } => config_commands::handle_config(action, &config),
    }
}
