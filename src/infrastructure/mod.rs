//! Infrastructure Layer - External concerns and implementations
//!
//! This module handles external systems: remote vulnerability databases,
//! the HTTP plumbing in front of them, and the persistent cache.

pub mod cache;
pub mod http;
pub mod sources;

pub use cache::{BlobStore, FsBlobStore, VulnCache};
pub use http::{ConcurrencyGate, HttpTransport};
pub use sources::{BatchVulnerabilitySource, GhsaBatchSource, OsvBatchSource};
