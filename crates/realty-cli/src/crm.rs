//! `auth-url` and `crm` commands.

use clap::Subcommand;
use realty_core::AppConfig;
use realty_crm::{CrmClient, OAuthProvider, OAuthService};
use serde::Serialize;

#[derive(Debug, Subcommand)]
pub(crate) enum CrmCommands {
    /// List locations (sub-accounts) visible to the token.
    Locations,
    Contacts {
        #[arg(long)]
        location_id: String,
    },
    Pipelines {
        #[arg(long)]
        location_id: String,
    },
    Opportunities {
        #[arg(long)]
        pipeline_id: String,
    },
}

/// # Errors
///
/// Returns an error if `GHL_CLIENT_ID` is not configured.
pub(crate) fn print_auth_url(config: &AppConfig) -> anyhow::Result<()> {
    let service = OAuthService::new(
        OAuthProvider::gohighlevel(&config.ghl),
        config.ghl.request_timeout_secs,
    )?;
    let state = OAuthService::generate_state();
    let url = service.authorization_url(&state)?;
    println!("{url}");
    eprintln!("state: {state}");
    Ok(())
}

/// # Errors
///
/// Returns an error if the CRM rejects the token or the request fails.
pub(crate) async fn run_crm(
    config: &AppConfig,
    token: &str,
    command: CrmCommands,
) -> anyhow::Result<()> {
    let client = CrmClient::from_config(&config.ghl)?;
    match command {
        CrmCommands::Locations => print_json(&client.list_locations(token).await?),
        CrmCommands::Contacts { location_id } => {
            print_json(&client.list_contacts(token, &location_id).await?)
        }
        CrmCommands::Pipelines { location_id } => {
            print_json(&client.list_pipelines(token, &location_id).await?)
        }
        CrmCommands::Opportunities { pipeline_id } => {
            print_json(&client.list_opportunities(token, &pipeline_id).await?)
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
