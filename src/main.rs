use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use quotevault::core::log::init_logging;

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

impl From<Commands> for quotevault::AppCommand {
    fn from(cmd: Commands) -> quotevault::AppCommand {
        match cmd {
            Commands::Serve => quotevault::AppCommand::Serve,
            Commands::Price { symbols, currency } => {
                quotevault::AppCommand::Price { symbols, currency }
            }
            Commands::Search { query } => quotevault::AppCommand::Search { query },
            Commands::News { symbol } => quotevault::AppCommand::News { symbol },
            Commands::Rate { base, target } => quotevault::AppCommand::Rate { base, target },
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// Run the HTTP price service
    Serve,
    /// Resolve prices through the cache
    Price {
        /// Ticker symbols, e.g. AAPL MSFT ASML.AS
        #[arg(required = true)]
        symbols: Vec<String>,
        /// Requested currency, defaults to the configured one
        #[arg(long)]
        currency: Option<String>,
    },
    /// Search for symbols by name or ticker
    Search { query: String },
    /// Show recent headlines for a symbol
    News { symbol: String },
    /// Show the exchange rate between two currencies
    Rate { base: String, target: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let serving = matches!(cli.command, Some(Commands::Serve));
    init_logging(cli.verbose, serving);

    let result = match cli.command {
        Some(Commands::Setup) => quotevault::cli::setup::setup(),
        Some(cmd) => quotevault::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
