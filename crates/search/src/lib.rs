//! Document store access.
//!
//! - [`SearchClient`]: the call shape the run pipeline depends on
//! - [`ElasticsearchClient`]: HTTP implementation against the `_search` API

pub mod client;
pub mod elasticsearch;

pub use client::{SearchClient, SearchError};
pub use elasticsearch::ElasticsearchClient;
