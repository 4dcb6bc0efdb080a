//! CallRelay agent entry point.

mod app;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "callrelay-agent", version, about = "Uploads new call recordings to the call records server")]
struct Cli {
    /// Configuration file (default: ~/.config/callrelay/agent.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Watch the recordings folder and upload new files (default).
    Run {
        /// Folder to watch, overriding the configuration file.
        #[arg(long)]
        watch_dir: Option<PathBuf>,

        /// Server base URL, overriding the configuration file.
        #[arg(long)]
        server_url: Option<String>,

        /// Also upload recordings already in the folder.
        #[arg(long)]
        scan_existing: bool,
    },
    /// Log in and store the session token.
    Login {
        #[arg(long)]
        username: String,

        #[arg(long, env = "CALLRELAY_PASSWORD", hide_env_values = true)]
        password: String,
    },
    /// Remove the stored session token.
    Logout,
    /// Show configuration and login state.
    Status,
}

fn main() -> anyhow::Result<()> {
    // Initialize structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,callrelay=debug")),
        )
        .init();

    let cli = Cli::parse();
    let config_path = match cli.config {
        Some(path) => path,
        None => config::default_config_path()?,
    };
    let mut config = config::Config::load_from(&config_path)?;
    tracing::debug!(path = %config_path.display(), "configuration loaded");

    match cli.command.unwrap_or(Command::Run {
        watch_dir: None,
        server_url: None,
        scan_existing: false,
    }) {
        Command::Run {
            watch_dir,
            server_url,
            scan_existing,
        } => {
            if let Some(dir) = watch_dir {
                config.watch_dir = dir;
            }
            if let Some(url) = server_url {
                config.server_url = url;
            }
            config.scan_existing_on_start |= scan_existing;

            tracing::info!(
                version = env!("CARGO_PKG_VERSION"),
                "starting CallRelay agent"
            );
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(app::run(config))?;
            tracing::info!("agent shut down cleanly");
        }
        Command::Login { username, password } => {
            let rt = tokio::runtime::Runtime::new()?;
            rt.block_on(app::login(&config, &username, &password))?;
        }
        Command::Logout => app::logout(&config)?,
        Command::Status => app::status(&config)?,
    }

    Ok(())
}
