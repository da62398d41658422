//! Shared building blocks for the alerting engine.
//!
//! - [`Config`]: process configuration (environment + `.env`)
//! - [`ExecutionContext`]: the per-run value handed through every stage
//! - [`SearchRequest`] / [`DecisionProcedure`]: values shared between stages
//! - [`ConfigError`]: configuration validation failures

pub mod config;
pub mod context;
pub mod error;
pub mod request;

pub use config::{Config, FileConfig};
pub use context::{ExecutionContext, Metadata};
pub use error::*;
pub use request::{DecisionProcedure, SearchRequest};
