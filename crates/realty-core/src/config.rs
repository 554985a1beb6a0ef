use crate::app_config::{AppConfig, Environment, GhlConfig, ListingSearchConfig};
use crate::ConfigError;

const DEFAULT_GHL_SCOPE: &str = "contacts/readonly contacts/write locations/readonly \
opportunities/readonly opportunities/write pipelines/readonly";

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if values are invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so it can be tested with a pure
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    // Blank values behave like unset ones so `.env` templates with empty
    // placeholders do not switch features on.
    let optional = |var: &str| -> Option<String> {
        lookup(var)
            .ok()
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let parse_addr = |var: &str, default: &str| -> Result<SocketAddr, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<SocketAddr>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u32>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<u64>().map_err(|e| ConfigError::InvalidEnvVar {
            var: var.to_string(),
            reason: e.to_string(),
        })
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        let raw = or_default(var, default);
        raw.parse::<usize>()
            .map_err(|e| ConfigError::InvalidEnvVar {
                var: var.to_string(),
                reason: e.to_string(),
            })
    };

    let env = parse_environment(&or_default("REALTY_ENV", "development"))?;
    let bind_addr = parse_addr("REALTY_BIND_ADDR", "0.0.0.0:3000")?;
    let log_level = or_default("REALTY_LOG_LEVEL", "info");
    let fallback_listings_path = PathBuf::from(or_default(
        "REALTY_FALLBACK_LISTINGS_PATH",
        "./config/fallback_listings.yaml",
    ));

    let ghl = GhlConfig {
        client_id: optional("GHL_CLIENT_ID"),
        client_secret: optional("GHL_CLIENT_SECRET"),
        redirect_uri: or_default(
            "GHL_REDIRECT_URI",
            "http://localhost:3000/api/auth/callback",
        ),
        scope: or_default("GHL_SCOPE", DEFAULT_GHL_SCOPE),
        authorize_url: or_default(
            "GHL_AUTHORIZE_URL",
            "https://marketplace.gohighlevel.com/oauth/chooselocation",
        ),
        api_base_url: or_default("GHL_API_BASE_URL", "https://services.leadconnectorhq.com"),
        api_version: or_default("GHL_API_VERSION", "2023-07-01"),
        request_timeout_secs: parse_u64("GHL_REQUEST_TIMEOUT_SECS", "30")?,
    };

    let search = ListingSearchConfig {
        bright_data_api_key: optional("BRIGHT_DATA_API_KEY"),
        bright_data_base_url: or_default("BRIGHT_DATA_BASE_URL", "https://api.brightdata.com"),
        dataset_id: or_default("BRIGHT_DATA_DATASET_ID", "gd_lfqkr8wm13ixtbd8f5"),
        price_history_dataset_id: or_default(
            "BRIGHT_DATA_PRICE_HISTORY_DATASET_ID",
            "gd_lxu1cz9r88uiqsosl",
        ),
        max_wait_ms: parse_u64("REALTY_SEARCH_MAX_WAIT_MS", "15000")?,
        poll_interval_ms: parse_u64("REALTY_SEARCH_POLL_INTERVAL_MS", "1000")?,
        max_poll_attempts: parse_u32("REALTY_SEARCH_MAX_POLL_ATTEMPTS", "10")?,
        result_limit: parse_usize("REALTY_SEARCH_RESULT_LIMIT", "3")?,
        trigger_timeout_ms: parse_u64("REALTY_TRIGGER_TIMEOUT_MS", "15000")?,
        status_timeout_ms: parse_u64("REALTY_STATUS_TIMEOUT_MS", "5000")?,
        result_timeout_ms: parse_u64("REALTY_RESULT_TIMEOUT_MS", "10000")?,
    };

    if search.poll_interval_ms == 0 {
        return Err(ConfigError::InvalidEnvVar {
            var: "REALTY_SEARCH_POLL_INTERVAL_MS".to_string(),
            reason: "must be greater than zero".to_string(),
        });
    }

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        fallback_listings_path,
        ghl,
        search,
    })
}

fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "REALTY_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
