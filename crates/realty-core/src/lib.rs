//! Shared configuration and domain types for the realty workspace.

mod app_config;
mod config;
mod fallback;
mod listing;

use thiserror::Error;

pub use app_config::{AppConfig, Environment, GhlConfig, ListingSearchConfig};
pub use config::{load_app_config, load_app_config_from_env};
pub use fallback::{
    builtin_fallback_listings, load_fallback_listings, load_fallback_or_builtin, FallbackFile,
    FallbackSource,
};
pub use listing::ListingRecord;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidEnvVar { var: String, reason: String },

    #[error("failed to read fallback listings file {path}: {source}")]
    FallbackFileIo {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse fallback listings file: {0}")]
    FallbackFileParse(#[from] serde_yaml::Error),

    #[error("fallback listings validation failed: {0}")]
    Validation(String),
}
