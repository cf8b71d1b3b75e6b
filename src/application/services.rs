//! Application services for orchestrating vulnerability lookups

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::errors::{ApplicationError, VulnerabilityError};
use crate::config::Config;
use crate::domain::{CvssScorer, Dependency, SeverityBreakdown, Vulnerability};
use crate::infrastructure::cache::{FsBlobStore, VulnCache};
use crate::infrastructure::http::HttpTransport;
use crate::infrastructure::sources::{BatchVulnerabilitySource, GhsaBatchSource, OsvBatchSource};

/// The sole entry point the presentation layer and report-export logic
/// depend on: one map from dependency name to its vulnerability list.
#[async_trait]
pub trait AuditService: Send + Sync {
    /// For any N dependencies the returned map has exactly one entry per
    /// dependency name, each a (possibly empty) list.
    async fn get_batch_vulnerabilities(
        &self,
        dependencies: &[Dependency],
        bypass_cache: bool,
    ) -> Result<HashMap<String, Vec<Vulnerability>>, ApplicationError>;
}

/// Fans one dependency list out to every configured batch source and merges
/// the maps. Providers are not deduplicated against each other; each record's
/// `sources` field carries its provenance.
pub struct AuditServiceImpl {
    sources: Vec<Arc<dyn BatchVulnerabilitySource>>,
}

impl AuditServiceImpl {
    pub fn new(sources: Vec<Arc<dyn BatchVulnerabilitySource>>) -> Self {
        Self { sources }
    }

    /// Wire up the full engine from configuration: shared transport and
    /// scorer, one persistent cache, and both batch sources.
    pub fn from_config(config: &Config) -> Self {
        let transport = Arc::new(HttpTransport::new(
            Duration::from_secs(config.http.timeout_seconds),
            config.http.retries,
        ));
        let scorer = Arc::new(CvssScorer::new());
        let cache = Arc::new(
            VulnCache::new(
                Arc::new(FsBlobStore::new(config.cache.directory.clone())),
                Duration::from_secs(config.cache.ttl_minutes * 60),
            )
            .with_compression_threshold(config.cache.compression_threshold_bytes)
            .with_high_severity_refresh(config.cache.refresh_high_severity),
        );

        let osv = OsvBatchSource::with_base_url(
            transport.clone(),
            cache.clone(),
            scorer.clone(),
            config.apis.osv.base_url.clone(),
        );
        let ghsa = GhsaBatchSource::with_base_url(
            transport,
            cache,
            scorer,
            config.apis.ghsa.token.clone(),
            config.apis.ghsa.base_url.clone(),
        );

        Self::new(vec![Arc::new(osv), Arc::new(ghsa)])
    }
}

#[async_trait]
impl AuditService for AuditServiceImpl {
    #[tracing::instrument(skip(self, dependencies), fields(dependency_count = dependencies.len()))]
    async fn get_batch_vulnerabilities(
        &self,
        dependencies: &[Dependency],
        bypass_cache: bool,
    ) -> Result<HashMap<String, Vec<Vulnerability>>, ApplicationError> {
        let mut results: HashMap<String, Vec<Vulnerability>> = dependencies
            .iter()
            .map(|dep| (dep.name.clone(), Vec::new()))
            .collect();
        if dependencies.is_empty() {
            return Ok(results);
        }

        for source in &self.sources {
            source.retune(dependencies.len());
        }

        let mut join_set: JoinSet<(
            &'static str,
            Result<HashMap<String, Vec<Vulnerability>>, VulnerabilityError>,
        )> = JoinSet::new();
        for source in &self.sources {
            let source = source.clone();
            let dependencies = dependencies.to_vec();
            join_set.spawn(async move {
                let name = source.name();
                (name, source.fetch_batch(&dependencies, bypass_cache).await)
            });
        }

        let mut successful_sources = 0usize;
        let mut first_unrecoverable: Option<VulnerabilityError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((name, Ok(partial))) => {
                    successful_sources += 1;
                    let found: usize = partial.values().map(|v| v.len()).sum();
                    debug!(source = name, found, "source completed");
                    for (dep_name, vulnerabilities) in partial {
                        results.entry(dep_name).or_default().extend(vulnerabilities);
                    }
                }
                Ok((name, Err(e))) => {
                    warn!(
                        source = name,
                        kind = e.kind(),
                        recoverable = e.is_recoverable(),
                        "source failed, its results degrade to empty lists: {e}"
                    );
                    if !e.is_recoverable() && first_unrecoverable.is_none() {
                        first_unrecoverable = Some(e);
                    }
                }
                Err(e) => warn!("source task join error: {e}"),
            }
        }

        // A partial scan is strictly better than no scan; only a total
        // failure with invalid credentials or a locked-out provider is
        // surfaced to the caller.
        if successful_sources == 0 {
            if let Some(error) = first_unrecoverable {
                return Err(ApplicationError::Vulnerability(error));
            }
        }

        let breakdown =
            SeverityBreakdown::from_severities(results.values().flatten().map(|v| &v.severity));
        info!(
            dependencies = dependencies.len(),
            vulnerabilities = breakdown.total(),
            critical = breakdown.critical,
            high = breakdown.high,
            medium = breakdown.medium,
            low = breakdown.low,
            "vulnerability scan completed"
        );

        Ok(results)
    }
}
