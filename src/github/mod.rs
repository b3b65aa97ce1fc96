//! The GitHub gateway: auth resolution, a per-host Octocrab client, GraphQL
//! queries/mutations, and the [`GitHubGateway`] facade that unifies them
//! into the one-method-per-capability contract described in §4.3.

pub mod auth;
mod client;
pub mod error;
mod gateway;
pub mod mutations;
pub mod queries;
pub mod rate_limit;

pub use error::{GatewayError, GatewayResult, classify_graphql_errors, classify_octocrab_error};
pub use gateway::{GitHubGateway, PrActivityPage};
