//! # benchpress
//!
//! Pulls benchmark-run telemetry out of a document store and collapses the
//! many raw per-datapoint records of each run into a single flat summary row
//! for downstream reporting (CSV, object storage).
//!
//! ## Architecture
//!
//! - **Collector**: scroll-paging query client that retrieves raw metric
//!   documents per run from an OpenSearch-compatible endpoint
//! - **Normalizer**: pure per-run transform — groups datapoints by label
//!   fingerprint, re-nests them by label precedence, flattens the tree into
//!   one row, redacts volatile metadata, and attaches a cluster health score
//! - **Exporter**: CSV serialization and chunked object-storage upload
//!
//! The normalizer is synchronous and side-effect free; each run is processed
//! independently, so callers may normalize distinct runs concurrently.

pub mod collector;
pub mod config;
pub mod export;
pub mod normalize;
pub mod telemetry;

mod error;

pub use error::{Error, Result};
