use anyhow::Result;
use bcv_rate::core::log::init_logging;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for bcv_rate::AppCommand {
    fn from(cmd: Commands) -> bcv_rate::AppCommand {
        match cmd {
            Commands::Serve => bcv_rate::AppCommand::Serve,
            Commands::Refresh => bcv_rate::AppCommand::Refresh,
            Commands::Latest => bcv_rate::AppCommand::Latest,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the HTTP API (default)
    Serve,
    /// Fetch the current rate once and store it
    Refresh,
    /// Print the most recent stored rate
    Latest,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command.unwrap_or(Commands::Serve) {
        Commands::Setup => bcv_rate::cli::setup::setup(),
        cmd => bcv_rate::run_command(cmd.into(), cli.config_path.as_deref()).await,
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
