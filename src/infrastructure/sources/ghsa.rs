//! Recursive-split batch source against the GitHub Security Advisories REST API
//!
//! Dependencies are packed into `affects=` query batches bounded by both a
//! batch-size and a URL-length ceiling. A failing batch is halved and retried
//! recursively down to single dependencies, so one poisoned entry can only
//! ever take out itself. Once the provider signals rate limiting the source
//! stops talking to the network for the rest of the process.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::Deserialize;
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::{empty_results, split_into_batches, BatchVulnerabilitySource, ECOSYSTEM};
use crate::application::errors::VulnerabilityError;
use crate::domain::{
    CvssCandidate, CvssScorer, Dependency, Vulnerability, VulnerabilityId, VulnerabilitySource,
};
use crate::infrastructure::cache::{cache_key, VulnCache};
use crate::infrastructure::http::{
    ConcurrencyGate, HttpTransport, RequestOptions, DEFAULT_CONCURRENCY,
    HIGH_THROUGHPUT_CONCURRENCY,
};

const DEFAULT_BASE_URL: &str = "https://api.github.com";
/// Ceiling on dependencies per batch
const MAX_BATCH_SIZE: usize = 500;
/// Ceiling on the encoded `affects` parameter length
const MAX_QUERY_LEN: usize = 8000;
/// Hard cap on followed result pages per batch
const MAX_PAGES: usize = 10;

#[derive(Debug, Clone, Deserialize)]
struct GhsaAdvisory {
    ghsa_id: String,
    summary: Option<String>,
    description: Option<String>,
    severity: Option<String>,
    cvss: Option<GhsaCvss>,
    cvss_severities: Option<GhsaCvssSeverities>,
    cwes: Option<Vec<GhsaCwe>>,
    vulnerabilities: Option<Vec<GhsaAffected>>,
    references: Option<Vec<String>>,
    published_at: Option<String>,
    updated_at: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GhsaCvss {
    vector_string: Option<String>,
    score: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
struct GhsaCvssSeverities {
    cvss_v3: Option<GhsaCvss>,
    cvss_v4: Option<GhsaCvss>,
}

#[derive(Debug, Clone, Deserialize)]
struct GhsaCwe {
    cwe_id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct GhsaAffected {
    package: Option<GhsaPackage>,
    vulnerable_version_range: Option<String>,
    first_patched_version: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GhsaPackage {
    ecosystem: String,
    name: String,
}

/// The executor carries everything a spawned batch task needs, so batches can
/// run concurrently while the source itself stays borrowed behind `&self`.
#[derive(Clone)]
struct GhsaExecutor {
    transport: Arc<HttpTransport>,
    gate: Arc<ConcurrencyGate>,
    scorer: Arc<CvssScorer>,
    base_url: String,
    token: Option<String>,
    rate_limited: Arc<AtomicBool>,
}

type BatchResult = Result<HashMap<String, Vec<Vulnerability>>, VulnerabilityError>;

impl GhsaExecutor {
    fn request_options(&self) -> RequestOptions {
        let mut headers = vec![
            (
                "Accept".to_string(),
                "application/vnd.github+json".to_string(),
            ),
            (
                "X-GitHub-Api-Version".to_string(),
                "2022-11-28".to_string(),
            ),
        ];
        if let Some(token) = &self.token {
            headers.push(("Authorization".to_string(), format!("Bearer {token}")));
        }
        RequestOptions {
            headers,
            ..Default::default()
        }
    }

    /// Flip the breaker when the provider signals rate limiting
    fn note_failure(&self, error: VulnerabilityError) -> VulnerabilityError {
        if error.is_rate_limit() && !self.rate_limited.swap(true, Ordering::SeqCst) {
            warn!(
                "provider signalled rate limiting, halting further requests for this session: {error}"
            );
        }
        error
    }

    /// Query one batch, recursively halving it on recoverable failure.
    /// A single dependency that still fails yields an empty result;
    /// unrecoverable errors propagate so the breaker can engage.
    fn query_split(&self, batch: Vec<Dependency>) -> Pin<Box<dyn Future<Output = BatchResult> + Send + '_>> {
        Box::pin(async move {
            match self.query_batch(&batch).await {
                Ok(map) => Ok(map),
                Err(e) if !e.is_recoverable() => Err(e),
                Err(e) => {
                    if batch.len() <= 1 {
                        let identifier =
                            batch.first().map(|d| d.identifier()).unwrap_or_default();
                        warn!(
                            dependency = %identifier,
                            "single-dependency batch failed, yielding empty result: {e}"
                        );
                        Ok(empty_results(&batch))
                    } else {
                        debug!(size = batch.len(), "halving failed batch: {e}");
                        let mut left = batch;
                        let right = left.split_off(left.len() / 2);
                        let (left_result, right_result) =
                            tokio::join!(self.query_split(left), self.query_split(right));
                        let mut merged = left_result?;
                        merged.extend(right_result?);
                        Ok(merged)
                    }
                }
            }
        })
    }

    /// Issue the advisory query for one batch, following pagination cursors
    async fn query_batch(&self, batch: &[Dependency]) -> BatchResult {
        let affects = batch
            .iter()
            .map(|dep| urlencoding::encode(&dep.identifier()).into_owned())
            .collect::<Vec<_>>()
            .join(",");
        let mut url = format!(
            "{}/advisories?ecosystem={}&affects={}&per_page=100",
            self.base_url, ECOSYSTEM, affects
        );
        let options = self.request_options();

        let mut advisories: Vec<GhsaAdvisory> = Vec::new();
        let mut pages = 0usize;
        loop {
            let response = self
                .gate
                .run(self.transport.request(Method::GET, &url, None, &options))
                .await
                .map_err(|e| self.note_failure(e))?;

            let page: Vec<GhsaAdvisory> = response.json()?;
            advisories.extend(page);
            pages += 1;

            match parse_next_link(response.link.as_deref()) {
                Some(next) => {
                    if pages >= MAX_PAGES {
                        warn!(pages, "pagination cap reached, truncating advisory results");
                        break;
                    }
                    url = next;
                }
                None => break,
            }
        }

        Ok(self.map_advisories(batch, advisories))
    }

    /// Attach each advisory's affected packages to the matching queried
    /// dependencies; packages nobody asked about are dropped.
    fn map_advisories(
        &self,
        batch: &[Dependency],
        advisories: Vec<GhsaAdvisory>,
    ) -> HashMap<String, Vec<Vulnerability>> {
        let mut results = empty_results(batch);

        for advisory in &advisories {
            for affected in advisory.vulnerabilities.as_deref().unwrap_or_default() {
                let Some(package) = &affected.package else {
                    continue;
                };
                if !package.ecosystem.eq_ignore_ascii_case(ECOSYSTEM) {
                    continue;
                }
                let Some(entry) = results.get_mut(&package.name) else {
                    continue;
                };
                if let Some(vulnerability) = self.convert_advisory(advisory, affected) {
                    entry.push(vulnerability);
                }
            }
        }
        results
    }

    fn convert_advisory(
        &self,
        advisory: &GhsaAdvisory,
        affected: &GhsaAffected,
    ) -> Option<Vulnerability> {
        let id = match VulnerabilityId::new(advisory.ghsa_id.clone()) {
            Ok(id) => id,
            Err(e) => {
                warn!("skipping advisory with invalid id: {e}");
                return None;
            }
        };

        let title = advisory
            .summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| format!("Advisory {}", advisory.ghsa_id));
        let description = advisory
            .description
            .clone()
            .or_else(|| advisory.summary.clone())
            .unwrap_or_default();

        // Candidates in provider order; the scorer applies version priority
        let mut candidates: Vec<CvssCandidate> = Vec::new();
        let mut provider_scores: Vec<Option<f64>> = Vec::new();
        let severities = advisory.cvss_severities.as_ref();
        for entry in [
            severities.and_then(|s| s.cvss_v4.as_ref()),
            severities.and_then(|s| s.cvss_v3.as_ref()),
            advisory.cvss.as_ref(),
        ]
        .into_iter()
        .flatten()
        {
            if let Some(candidate) = entry
                .vector_string
                .as_deref()
                .and_then(CvssCandidate::from_vector)
            {
                candidates.push(candidate);
                provider_scores.push(entry.score);
            }
        }

        let selection = self.scorer.select_best(&candidates);
        let cvss_score = selection.as_ref().and_then(|s| s.score).or_else(|| {
            // Fall back to the provider-computed number when the vector
            // itself does not yield one
            selection.as_ref().and_then(|s| {
                candidates
                    .iter()
                    .position(|c| c.vector == s.vector)
                    .and_then(|i| provider_scores.get(i).copied().flatten())
            })
        });
        let severity =
            CvssScorer::normalize_severity(cvss_score, advisory.severity.as_deref());

        let affected_versions = affected
            .vulnerable_version_range
            .clone()
            .map(|r| r.trim().to_string())
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| "*".to_string());

        let mut vulnerability = Vulnerability::new(
            id,
            title,
            description,
            severity,
            affected_versions,
            vec![VulnerabilitySource::Ghsa],
        )
        .ok()?;

        if let Some(selection) = selection {
            vulnerability.cvss_version = Some(selection.version);
            vulnerability.vector_string = Some(selection.vector);
        }
        vulnerability.cvss_score = cvss_score;
        vulnerability.patched_versions = affected.first_patched_version.clone();
        vulnerability.references = advisory.references.clone().unwrap_or_default();
        vulnerability.cwe_ids = advisory
            .cwes
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|c| c.cwe_id.clone())
            .collect();
        vulnerability.published_at = advisory.published_at.as_deref().and_then(parse_rfc3339);
        vulnerability.last_modified_at = advisory.updated_at.as_deref().and_then(parse_rfc3339);

        Some(vulnerability)
    }
}

fn parse_rfc3339(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

/// Extract the rel="next" cursor from a Link response header
fn parse_next_link(link: Option<&str>) -> Option<String> {
    for part in link?.split(',') {
        let mut sections = part.split(';');
        let url = sections.next().unwrap_or_default().trim();
        if sections.any(|param| param.trim() == "rel=\"next\"") {
            return Some(
                url.trim_start_matches('<')
                    .trim_end_matches('>')
                    .to_string(),
            );
        }
    }
    None
}

/// URL-length-bounded recursive-split batch source
pub struct GhsaBatchSource {
    executor: GhsaExecutor,
    cache: Arc<VulnCache>,
}

impl GhsaBatchSource {
    pub fn new(
        transport: Arc<HttpTransport>,
        cache: Arc<VulnCache>,
        scorer: Arc<CvssScorer>,
        token: Option<String>,
    ) -> Self {
        Self::with_base_url(transport, cache, scorer, token, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        transport: Arc<HttpTransport>,
        cache: Arc<VulnCache>,
        scorer: Arc<CvssScorer>,
        token: Option<String>,
        base_url: String,
    ) -> Self {
        Self {
            executor: GhsaExecutor {
                transport,
                gate: Arc::new(ConcurrencyGate::new(DEFAULT_CONCURRENCY)),
                scorer,
                base_url,
                token,
                rate_limited: Arc::new(AtomicBool::new(false)),
            },
            cache,
        }
    }

    /// Whether the rate-limit breaker has engaged for this instance
    pub fn is_rate_limited(&self) -> bool {
        self.executor.rate_limited.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BatchVulnerabilitySource for GhsaBatchSource {
    fn name(&self) -> &'static str {
        "ghsa"
    }

    fn retune(&self, dependency_count: usize) {
        let limit = if dependency_count < 50 {
            DEFAULT_CONCURRENCY
        } else if dependency_count <= 200 {
            25
        } else {
            HIGH_THROUGHPUT_CONCURRENCY
        };
        self.executor.gate.set_limit(limit);
    }

    async fn fetch_batch(
        &self,
        dependencies: &[Dependency],
        bypass_cache: bool,
    ) -> Result<HashMap<String, Vec<Vulnerability>>, VulnerabilityError> {
        let mut results = empty_results(dependencies);
        if dependencies.is_empty() {
            return Ok(results);
        }

        if self.is_rate_limited() {
            warn!(
                dependencies = dependencies.len(),
                "rate-limit breaker engaged, returning empty results without network calls"
            );
            return Ok(results);
        }

        let mut pending: Vec<Dependency> = Vec::new();
        if bypass_cache {
            pending = dependencies.to_vec();
        } else {
            for dep in dependencies {
                let key = cache_key(self.name(), &dep.name, &dep.version);
                match self.cache.get::<Vec<Vulnerability>>(&key).await {
                    Some(hit) => {
                        results.insert(dep.name.clone(), hit);
                    }
                    None => pending.push(dep.clone()),
                }
            }
        }

        if pending.is_empty() {
            debug!("all dependencies served from cache");
            return Ok(results);
        }

        let batches = split_into_batches(&pending, MAX_BATCH_SIZE, MAX_QUERY_LEN, |dep| {
            urlencoding::encode(&dep.identifier()).len()
        });
        debug!(
            pending = pending.len(),
            batches = batches.len(),
            "querying advisory database"
        );

        let mut join_set: JoinSet<BatchResult> = JoinSet::new();
        for batch in batches {
            let executor = self.executor.clone();
            join_set.spawn(async move { executor.query_split(batch).await });
        }

        let mut first_error: Option<VulnerabilityError> = None;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok(partial)) => {
                    for (name, vulnerabilities) in partial {
                        results.insert(name, vulnerabilities);
                    }
                }
                Ok(Err(e)) => {
                    if first_error.is_none() {
                        first_error = Some(e);
                    }
                }
                Err(e) => warn!("batch task join error: {e}"),
            }
        }

        if let Some(error) = first_error {
            return Err(error);
        }

        for dep in &pending {
            let Some(vulnerabilities) = results.get(&dep.name) else {
                continue;
            };
            let cache = self.cache.clone();
            let key = cache_key(self.name(), &dep.name, &dep.version);
            let payload = vulnerabilities.clone();
            tokio::spawn(async move {
                if let Err(e) = cache.put(&key, &payload).await {
                    debug!(%key, "cache write-back failed: {e}");
                }
            });
        }

        Ok(results)
    }
}
