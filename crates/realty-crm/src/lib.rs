//! Go High Level CRM integration: the OAuth 2.0 authorization-code flow and a
//! typed client for the REST endpoints the dashboard uses.

pub mod client;
pub mod error;
pub mod oauth;
pub(crate) mod retry;
pub mod types;

pub use client::CrmClient;
pub use error::CrmError;
pub use oauth::{OAuthProvider, OAuthService};
pub use types::{
    Contact, CrmUser, Location, LocationBusiness, NewLocation, NewOpportunity, Opportunity,
    Pipeline, PipelineStage, TokenSet,
};
