mod crm;
mod search;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "realty-cli")]
#[command(about = "Realty listing search and CRM command line interface")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Run a listing search and print the report as JSON.
    Search(search::SearchArgs),
    /// Fetch the price history of one Zillow property (needs a Bright Data key).
    PriceHistory {
        /// Zillow property id.
        zpid: String,
    },
    /// Print a Go High Level authorization URL with a fresh state token.
    AuthUrl,
    /// Query the Go High Level REST API.
    Crm {
        /// Access token from a completed OAuth login.
        #[arg(long, env = "GHL_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
        #[command(subcommand)]
        command: crm::CrmCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = realty_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Search(args) => search::run_search(&config, args).await,
        Commands::PriceHistory { zpid } => search::run_price_history(&config, &zpid).await,
        Commands::AuthUrl => crm::print_auth_url(&config),
        Commands::Crm { token, command } => crm::run_crm(&config, &token, command).await,
    }
}
