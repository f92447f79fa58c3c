pub mod api_types;
pub mod cached_client;
pub mod client;
pub mod error;
pub mod resources;

pub use api_types::*;
pub use cached_client::FundClient;
pub use client::{ApiClient, Transport};
pub use error::ApiError;
pub use resources::{AnalyticsFilters, Resource};
