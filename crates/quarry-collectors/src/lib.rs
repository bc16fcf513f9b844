//! Research collectors and the plumbing they share.
//!
//! A [`Collector`] queries one external source for a list of search queries,
//! gating every request through its [`RateLimiter`], and returns a
//! [`CollectorResult`] summary. The [`CollectorRegistry`] maps names to
//! collectors for the research coordinator.

pub mod collector;
pub mod error;
pub mod github;
pub mod openalex;
pub mod rate_limit;
pub mod registry;
pub mod types;

pub use collector::{ensure_not_cancelled, retain_unseen, slugify, write_yaml_artifact, Collector};
pub use error::CollectorError;
pub use github::{GitHubScout, GITHUB_RATE_POLICY, GITHUB_SCOUT};
pub use openalex::{OpenAlexCollector, OPENALEX, OPENALEX_RATE_POLICY};
pub use rate_limit::{RateLimitPolicy, RateLimiter};
pub use registry::CollectorRegistry;
pub use types::{CollectorConfig, CollectorResult};
