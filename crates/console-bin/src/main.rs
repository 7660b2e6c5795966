//! Zo operations console - session management command-line interface.

mod auth;
mod state;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use console_config_and_utils::{init_logging, Config, Paths};
use state::ConsoleState;

/// Zo console command-line interface.
#[derive(Parser)]
#[command(name = "zo-console")]
#[command(about = "Zo operations console session management")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "warn", global = true)]
    log_level: String,

    /// Base directory for runtime files (credentials, logs, config). Defaults to ~/.zo-console
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Log in with a mobile number and OTP
    Login,
    /// Log out and clear the stored session
    Logout,
    /// Show the current session state
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level);

    let paths = match cli.base_dir {
        Some(base) => Paths::with_base_dir(base),
        None => Paths::new()?,
    };
    let config = Config::load(&paths)?;
    let state = ConsoleState::build(config, &paths)?;

    match cli.command {
        Some(Commands::Login) => auth::login(&state).await?,
        Some(Commands::Logout) => auth::logout(&state).await?,
        Some(Commands::Status) | None => auth::status(&state).await?,
    }

    Ok(())
}
