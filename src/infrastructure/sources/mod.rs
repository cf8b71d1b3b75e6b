//! Batch vulnerability sources
//!
//! Each source implements one query strategy against a remote vulnerability
//! database and hides its caching and batching behind `fetch_batch`.

use std::collections::HashMap;

use async_trait::async_trait;

use crate::application::errors::VulnerabilityError;
use crate::domain::{Dependency, Vulnerability};

pub mod ghsa;
pub mod osv;

pub use ghsa::GhsaBatchSource;
pub use osv::OsvBatchSource;

/// The ecosystem this engine audits
pub const ECOSYSTEM: &str = "npm";

/// A provider-specific batched lookup strategy.
///
/// Implementations guarantee that the returned map contains exactly one entry
/// (possibly an empty list) for every dependency passed in.
#[async_trait]
pub trait BatchVulnerabilitySource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Retune internal concurrency for an estimated workload size
    fn retune(&self, _dependency_count: usize) {}

    async fn fetch_batch(
        &self,
        dependencies: &[Dependency],
        bypass_cache: bool,
    ) -> Result<HashMap<String, Vec<Vulnerability>>, VulnerabilityError>;
}

/// Pre-fill a result map with one empty entry per dependency
pub(crate) fn empty_results(dependencies: &[Dependency]) -> HashMap<String, Vec<Vulnerability>> {
    dependencies
        .iter()
        .map(|dep| (dep.name.clone(), Vec::new()))
        .collect()
}

/// Group dependencies so that neither the batch-size ceiling nor the encoded
/// query-length ceiling is exceeded; a new batch starts as soon as either
/// limit would be crossed.
pub(crate) fn split_into_batches<F>(
    dependencies: &[Dependency],
    max_size: usize,
    max_query_len: usize,
    item_len: F,
) -> Vec<Vec<Dependency>>
where
    F: Fn(&Dependency) -> usize,
{
    let mut batches = Vec::new();
    let mut current: Vec<Dependency> = Vec::new();
    let mut current_len = 0usize;

    for dep in dependencies {
        let len = item_len(dep);
        // +1 accounts for the separator joining items in the query parameter
        let projected = if current.is_empty() {
            len
        } else {
            current_len + 1 + len
        };

        if !current.is_empty() && (current.len() >= max_size || projected > max_query_len) {
            batches.push(std::mem::take(&mut current));
            current_len = len;
        } else {
            current_len = projected;
        }
        current.push(dep.clone());
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
