//! `search` command: one listing search against the configured data source.

use clap::Args;
use realty_core::AppConfig;
use realty_listings::{
    BrightDataClient, ListingSearch, PollBudget, SearchOutcome, SearchQuery, SnapshotPoller,
    TerminalState,
};

#[derive(Debug, Args)]
pub(crate) struct SearchArgs {
    #[arg(long, default_value = "Miami, FL")]
    pub location: String,
    #[arg(long, default_value = "Houses")]
    pub home_type: String,
    #[arg(long = "category", default_value = "House for sale")]
    pub listing_category: String,
    /// Maximum days on market, e.g. `7` or `7 days`. Omit for any.
    #[arg(long = "days")]
    pub days_on_market: Option<String>,
    #[arg(long, default_value_t = 1)]
    pub min_price: u64,
    #[arg(long, default_value_t = 10_000_000)]
    pub max_price: u64,
    /// Scrape this listing URL instead of building a search URL.
    #[arg(long)]
    pub property_url: Option<String>,
}

impl From<SearchArgs> for SearchQuery {
    fn from(args: SearchArgs) -> Self {
        Self {
            location: args.location,
            home_type: args.home_type,
            listing_category: args.listing_category,
            days_on_market: args.days_on_market.unwrap_or_default(),
            min_price: args.min_price,
            max_price: args.max_price,
            property_url: args.property_url,
        }
    }
}

/// Runs the search and prints the report. Outcomes other than `found` are
/// reported on stderr but are not errors.
///
/// # Errors
///
/// Returns an error if the fallback dataset cannot be loaded or the search
/// client cannot be built.
pub(crate) async fn run_search(config: &AppConfig, args: SearchArgs) -> anyhow::Result<()> {
    let query = SearchQuery::from(args);
    let (fallback, _) = realty_core::load_fallback_or_builtin(&config.fallback_listings_path)?;
    let search = ListingSearch::from_config(&config.search, fallback)?;
    if !search.is_live() {
        eprintln!("note: BRIGHT_DATA_API_KEY not set; serving fallback listings");
    }

    let report = search.run(&query).await;
    match report.outcome {
        SearchOutcome::Found => {}
        SearchOutcome::NoData => eprintln!("no properties found"),
        SearchOutcome::NoMatchesInRange => {
            eprintln!("no properties found in the specified price range");
        }
    }
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

/// Triggers a price-history job for one property and prints the snapshot.
///
/// # Errors
///
/// Returns an error if no Bright Data API key is configured, the job cannot
/// be started, it does not finish within the poll budget, or the snapshot
/// cannot be downloaded.
pub(crate) async fn run_price_history(config: &AppConfig, zpid: &str) -> anyhow::Result<()> {
    let Some(client) = BrightDataClient::from_config(&config.search)? else {
        anyhow::bail!("BRIGHT_DATA_API_KEY is required for price history");
    };

    let job = client.trigger_price_history(zpid).await?;
    let report = SnapshotPoller::new(&client, PollBudget::from_config(&config.search))
        .poll(&job.job_id)
        .await;
    if report.terminal != TerminalState::DataReady {
        anyhow::bail!(
            "price history job {} did not complete ({:?} after {} attempts)",
            job.job_id,
            report.stop_reason,
            report.attempts
        );
    }

    let body = client.snapshot(&job.job_id).await?;
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) => println!("{}", serde_json::to_string_pretty(&value)?),
        Err(_) => println!("{body}"),
    }
    Ok(())
}
