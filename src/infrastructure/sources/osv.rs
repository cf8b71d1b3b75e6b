//! Hybrid batch source against the OSV bulk vulnerability database
//!
//! Two-phase strategy: one cheap batch request discovers which vulnerability
//! IDs affect each package@version, then full records are hydrated per unique
//! ID. Detail records are highly cacheable across packages sharing a
//! vulnerability, so they are kept in an in-process cache on top of the
//! persistent one.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
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

const DEFAULT_BASE_URL: &str = "https://api.osv.dev";
/// Ceiling on queries carried by one batch request
const MAX_BATCH_SIZE: usize = 500;

/// Request payload for the querybatch endpoint
#[derive(Debug, Serialize)]
struct OsvBatchRequest {
    queries: Vec<OsvQuery>,
}

#[derive(Debug, Serialize)]
struct OsvQuery {
    package: OsvPackage,
    version: String,
}

#[derive(Debug, Serialize)]
struct OsvPackage {
    name: String,
    ecosystem: String,
}

/// Response from the querybatch endpoint: one slot per query, in order
#[derive(Debug, Deserialize)]
struct OsvBatchResponse {
    results: Vec<OsvIdList>,
}

#[derive(Debug, Default, Deserialize)]
struct OsvIdList {
    vulns: Option<Vec<OsvIdRef>>,
}

#[derive(Debug, Deserialize)]
struct OsvIdRef {
    id: String,
}

/// Full vulnerability record from the detail endpoint
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct OsvRecord {
    id: String,
    summary: Option<String>,
    details: Option<String>,
    severity: Option<Vec<OsvSeverity>>,
    affected: Option<Vec<OsvAffected>>,
    references: Option<Vec<OsvReference>>,
    published: Option<String>,
    modified: Option<String>,
    database_specific: Option<OsvDatabaseSpecific>,
}

#[derive(Debug, Clone, Deserialize)]
struct OsvSeverity {
    #[serde(rename = "type")]
    #[allow(dead_code)]
    severity_type: String,
    score: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OsvAffected {
    package: Option<OsvAffectedPackage>,
    ranges: Option<Vec<OsvRange>>,
}

#[derive(Debug, Clone, Deserialize)]
struct OsvAffectedPackage {
    name: String,
    ecosystem: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OsvRange {
    events: Vec<OsvEvent>,
}

/// One version event; OSV emits objects carrying a single key each
#[derive(Debug, Clone, Default, Deserialize)]
struct OsvEvent {
    introduced: Option<String>,
    fixed: Option<String>,
    last_affected: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct OsvReference {
    url: String,
}

#[derive(Debug, Clone, Deserialize)]
struct OsvDatabaseSpecific {
    severity: Option<String>,
    cwe_ids: Option<Vec<String>>,
}

/// Hybrid (ID-then-detail) batch source
pub struct OsvBatchSource {
    transport: Arc<HttpTransport>,
    gate: Arc<ConcurrencyGate>,
    cache: Arc<VulnCache>,
    scorer: Arc<CvssScorer>,
    base_url: String,
    detail_cache: Mutex<HashMap<String, Arc<OsvRecord>>>,
}

impl OsvBatchSource {
    pub fn new(
        transport: Arc<HttpTransport>,
        cache: Arc<VulnCache>,
        scorer: Arc<CvssScorer>,
    ) -> Self {
        Self::with_base_url(transport, cache, scorer, DEFAULT_BASE_URL.to_string())
    }

    pub fn with_base_url(
        transport: Arc<HttpTransport>,
        cache: Arc<VulnCache>,
        scorer: Arc<CvssScorer>,
        base_url: String,
    ) -> Self {
        Self {
            transport,
            // OSV tolerates high request rates, so the detail fan-out gets
            // the larger default
            gate: Arc::new(ConcurrencyGate::new(HIGH_THROUGHPUT_CONCURRENCY)),
            cache,
            scorer,
            base_url,
            detail_cache: Mutex::new(HashMap::new()),
        }
    }

    /// Discover vulnerability IDs for every pending dependency, chunk by
    /// chunk. A failed or mismatched chunk degrades to empty lists for its
    /// dependencies instead of aborting the whole scan.
    async fn discover_ids(&self, pending: &[Dependency]) -> HashMap<String, Vec<String>> {
        let batches = split_into_batches(pending, MAX_BATCH_SIZE, usize::MAX / 2, |dep| {
            dep.identifier().len()
        });

        let mut join_set: JoinSet<Option<(Vec<Dependency>, OsvBatchResponse)>> = JoinSet::new();
        for batch in batches {
            let transport = self.transport.clone();
            let gate = self.gate.clone();
            let url = format!("{}/v1/querybatch", self.base_url);

            join_set.spawn(async move {
                let request = serde_json::to_value(OsvBatchRequest {
                    queries: batch
                        .iter()
                        .map(|dep| OsvQuery {
                            package: OsvPackage {
                                name: dep.name.clone(),
                                ecosystem: ECOSYSTEM.to_string(),
                            },
                            version: dep.version.clone(),
                        })
                        .collect(),
                })
                .ok()?;

                let outcome = gate
                    .run(transport.request(
                        Method::POST,
                        &url,
                        Some(&request),
                        &RequestOptions::default(),
                    ))
                    .await
                    .and_then(|response| response.json::<OsvBatchResponse>());

                match outcome {
                    Ok(response) => Some((batch, response)),
                    Err(e) => {
                        warn!(batch_size = batch.len(), "batch query failed: {e}");
                        None
                    }
                }
            });
        }

        let mut ids_by_dep: HashMap<String, Vec<String>> = HashMap::new();
        while let Some(joined) = join_set.join_next().await {
            let Ok(Some((batch, response))) = joined else {
                continue;
            };

            if response.results.len() != batch.len() {
                warn!(
                    expected = batch.len(),
                    received = response.results.len(),
                    "batch result count mismatch, degrading chunk to empty lists"
                );
                continue;
            }

            for (dep, slot) in batch.iter().zip(response.results) {
                let ids = slot
                    .vulns
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| v.id)
                    .collect();
                ids_by_dep.insert(dep.name.clone(), ids);
            }
        }
        ids_by_dep
    }

    /// Hydrate full records for every unique ID, consulting the in-process
    /// detail cache first. Individual fetch failures are logged and the ID is
    /// simply omitted from results.
    async fn hydrate_details(
        &self,
        ids_by_dep: &HashMap<String, Vec<String>>,
    ) -> HashMap<String, Arc<OsvRecord>> {
        let mut details: HashMap<String, Arc<OsvRecord>> = HashMap::new();
        let mut to_fetch: Vec<String> = Vec::new();

        {
            let cached = self.detail_cache.lock().await;
            for id in ids_by_dep.values().flatten() {
                if details.contains_key(id) || to_fetch.iter().any(|f| f == id) {
                    continue;
                }
                match cached.get(id) {
                    Some(record) => {
                        details.insert(id.clone(), record.clone());
                    }
                    None => to_fetch.push(id.clone()),
                }
            }
        }

        if to_fetch.is_empty() {
            return details;
        }
        debug!(count = to_fetch.len(), "hydrating vulnerability details");

        let mut join_set: JoinSet<Option<(String, OsvRecord)>> = JoinSet::new();
        for id in to_fetch {
            let transport = self.transport.clone();
            let gate = self.gate.clone();
            let url = format!("{}/v1/vulns/{}", self.base_url, id);

            join_set.spawn(async move {
                let outcome = gate
                    .run(transport.request(Method::GET, &url, None, &RequestOptions::default()))
                    .await
                    .and_then(|response| response.json::<OsvRecord>());

                match outcome {
                    Ok(record) => Some((id, record)),
                    Err(e) => {
                        warn!(%id, "detail fetch failed, omitting from results: {e}");
                        None
                    }
                }
            });
        }

        let mut fetched: Vec<(String, Arc<OsvRecord>)> = Vec::new();
        while let Some(joined) = join_set.join_next().await {
            if let Ok(Some((id, record))) = joined {
                fetched.push((id, Arc::new(record)));
            }
        }

        let mut cached = self.detail_cache.lock().await;
        for (id, record) in fetched {
            cached.insert(id.clone(), record.clone());
            details.insert(id, record);
        }
        details
    }

    /// Convert a raw record into the internal vulnerability shape
    fn convert_record(&self, record: &OsvRecord, dep: &Dependency) -> Option<Vulnerability> {
        let id = match VulnerabilityId::new(record.id.clone()) {
            Ok(id) => id,
            Err(e) => {
                warn!("skipping record with invalid id: {e}");
                return None;
            }
        };

        let title = record
            .summary
            .clone()
            .filter(|s| !s.trim().is_empty())
            .or_else(|| {
                record
                    .details
                    .as_ref()
                    .and_then(|d| d.split('.').next())
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
            })
            .unwrap_or_else(|| format!("Vulnerability {}", record.id));
        let description = record.details.clone().unwrap_or_default();

        let candidates: Vec<CvssCandidate> = record
            .severity
            .as_deref()
            .unwrap_or_default()
            .iter()
            .filter_map(|s| CvssCandidate::from_vector(&s.score))
            .collect();
        let selection = self.scorer.select_best(&candidates);

        let label = record
            .database_specific
            .as_ref()
            .and_then(|d| d.severity.as_deref());
        let severity = CvssScorer::normalize_severity(
            selection.as_ref().and_then(|s| s.score),
            label,
        );

        let (affected_versions, fixed_versions) = affected_range_for(record, &dep.name);

        let mut vulnerability = Vulnerability::new(
            id,
            title,
            description,
            severity,
            affected_versions,
            vec![VulnerabilitySource::Osv],
        )
        .ok()?;

        if let Some(selection) = selection {
            vulnerability.cvss_score = selection.score;
            vulnerability.cvss_version = Some(selection.version);
            vulnerability.vector_string = Some(selection.vector);
        }
        if !fixed_versions.is_empty() {
            vulnerability.patched_versions = Some(fixed_versions.join(" || "));
        }
        vulnerability.references = record
            .references
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.clone())
            .collect();
        vulnerability.cwe_ids = record
            .database_specific
            .as_ref()
            .and_then(|d| d.cwe_ids.clone())
            .unwrap_or_default();
        vulnerability.published_at = record.published.as_deref().and_then(parse_rfc3339);
        vulnerability.last_modified_at = record.modified.as_deref().and_then(parse_rfc3339);

        Some(vulnerability)
    }
}

fn parse_rfc3339(value: &str) -> Option<chrono::DateTime<chrono::Utc>> {
    chrono::DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

/// Build the semver-range string and fixed-version list for one package.
///
/// Upstream events map onto range clauses:
/// introduced+fixed → `>=X <Y`, introduced+last_affected → `>=X <=Y`,
/// introduced alone → `>=X`, fixed alone → `<X`. Multiple ranges are
/// OR-joined; no range at all yields the wildcard.
fn affected_range_for(record: &OsvRecord, package_name: &str) -> (String, Vec<String>) {
    let mut clauses: Vec<String> = Vec::new();
    let mut fixed_versions: Vec<String> = Vec::new();

    for affected in record.affected.as_deref().unwrap_or_default() {
        let matches = affected.package.as_ref().is_some_and(|p| {
            p.ecosystem.eq_ignore_ascii_case(ECOSYSTEM) && p.name == package_name
        });
        if !matches {
            continue;
        }

        for range in affected.ranges.as_deref().unwrap_or_default() {
            let mut introduced: Option<&str> = None;
            for event in &range.events {
                if let Some(version) = event.introduced.as_deref() {
                    // A dangling earlier segment closes as an open lower bound
                    if let Some(open) = introduced.take() {
                        clauses.push(format!(">={open}"));
                    }
                    introduced = Some(version);
                } else if let Some(version) = event.fixed.as_deref() {
                    fixed_versions.push(version.to_string());
                    match introduced.take() {
                        Some(from) => clauses.push(format!(">={from} <{version}")),
                        None => clauses.push(format!("<{version}")),
                    }
                } else if let Some(version) = event.last_affected.as_deref() {
                    match introduced.take() {
                        Some(from) => clauses.push(format!(">={from} <={version}")),
                        None => clauses.push(format!("<={version}")),
                    }
                }
            }
            if let Some(open) = introduced {
                clauses.push(format!(">={open}"));
            }
        }
    }

    fixed_versions.dedup();
    if clauses.is_empty() {
        ("*".to_string(), fixed_versions)
    } else {
        (clauses.join(" || "), fixed_versions)
    }
}

#[async_trait]
impl BatchVulnerabilitySource for OsvBatchSource {
    fn name(&self) -> &'static str {
        "osv"
    }

    fn retune(&self, dependency_count: usize) {
        let limit = if dependency_count < 50 {
            DEFAULT_CONCURRENCY
        } else if dependency_count <= 200 {
            25
        } else {
            HIGH_THROUGHPUT_CONCURRENCY
        };
        self.gate.set_limit(limit);
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
        debug!(
            total = dependencies.len(),
            pending = pending.len(),
            "querying bulk vulnerability database"
        );

        let ids_by_dep = self.discover_ids(&pending).await;
        let details = self.hydrate_details(&ids_by_dep).await;

        for dep in &pending {
            let Some(ids) = ids_by_dep.get(&dep.name) else {
                continue;
            };
            let vulnerabilities: Vec<Vulnerability> = ids
                .iter()
                .filter_map(|id| details.get(id))
                .filter_map(|record| self.convert_record(record, dep))
                .collect();
            results.insert(dep.name.clone(), vulnerabilities.clone());

            let cache = self.cache.clone();
            let key = cache_key(self.name(), &dep.name, &dep.version);
            tokio::spawn(async move {
                if let Err(e) = cache.put(&key, &vulnerabilities).await {
                    debug!(%key, "cache write-back failed: {e}");
                }
            });
        }

        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::cache::FsBlobStore;
    use crate::infrastructure::cache::DEFAULT_TTL;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn make_source(base_url: String, dir: &TempDir) -> OsvBatchSource {
        let transport = Arc::new(HttpTransport::new(Duration::from_secs(5), 1));
        let cache = Arc::new(VulnCache::new(
            Arc::new(FsBlobStore::new(dir.path().to_path_buf())),
            DEFAULT_TTL,
        ));
        OsvBatchSource::with_base_url(transport, cache, Arc::new(CvssScorer::new()), base_url)
    }

    fn dep(name: &str, version: &str) -> Dependency {
        Dependency::new(name.to_string(), version.to_string()).unwrap()
    }

    fn lodash_record() -> serde_json::Value {
        json!({
            "id": "GHSA-p6mc-m468-83gw",
            "summary": "Prototype pollution in lodash",
            "details": "lodash versions prior to 4.17.21 are vulnerable to prototype pollution.",
            "severity": [
                {"type": "CVSS_V3", "score": "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:L/I:L/A:L"}
            ],
            "affected": [{
                "package": {"name": "lodash", "ecosystem": "npm"},
                "ranges": [{
                    "type": "SEMVER",
                    "events": [{"introduced": "0"}, {"fixed": "4.17.21"}]
                }]
            }],
            "references": [
                {"type": "ADVISORY", "url": "https://example.com/advisory"}
            ],
            "database_specific": {"severity": "HIGH", "cwe_ids": ["CWE-1321"]},
            "published": "2021-02-15T00:00:00Z",
            "modified": "2021-03-01T00:00:00Z"
        })
    }

    #[tokio::test]
    async fn test_empty_dependency_list_makes_no_network_calls() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/querybatch")
            .expect(0)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = make_source(server.url(), &dir);
        let results = source.fetch_batch(&[], false).await.unwrap();

        mock.assert_async().await;
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_hybrid_flow_discovers_and_hydrates() {
        let mut server = Server::new_async().await;

        let batch_mock = server
            .mock("POST", "/v1/querybatch")
            .match_body(Matcher::PartialJson(json!({
                "queries": [
                    {"package": {"name": "lodash", "ecosystem": "npm"}, "version": "4.17.20"}
                ]
            })))
            .with_status(200)
            .with_body(
                json!({"results": [{"vulns": [{"id": "GHSA-p6mc-m468-83gw"}]}]}).to_string(),
            )
            .expect(1)
            .create_async()
            .await;
        let detail_mock = server
            .mock("GET", "/v1/vulns/GHSA-p6mc-m468-83gw")
            .with_status(200)
            .with_body(lodash_record().to_string())
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = make_source(server.url(), &dir);
        let results = source
            .fetch_batch(&[dep("lodash", "4.17.20")], true)
            .await
            .unwrap();

        batch_mock.assert_async().await;
        detail_mock.assert_async().await;

        let vulns = &results["lodash"];
        assert_eq!(vulns.len(), 1);
        let vuln = &vulns[0];
        assert_eq!(vuln.id.as_str(), "GHSA-p6mc-m468-83gw");
        assert_eq!(vuln.cvss_version, Some(crate::domain::CvssVersion::V3_1));
        // CVSS:3.1 with C:L/I:L/A:L scores 7.3, which is high
        assert_eq!(vuln.severity, crate::domain::Severity::High);
        assert_eq!(vuln.affected_versions, ">=0 <4.17.21");
        assert_eq!(vuln.patched_versions.as_deref(), Some("4.17.21"));
        assert_eq!(vuln.sources, vec![VulnerabilitySource::Osv]);
        assert_eq!(vuln.cwe_ids, vec!["CWE-1321"]);
    }

    #[tokio::test]
    async fn test_result_count_mismatch_degrades_to_empty() {
        let mut server = Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(200)
            .with_body(json!({"results": []}).to_string())
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = make_source(server.url(), &dir);
        let deps = vec![dep("lodash", "4.17.20"), dep("express", "4.17.1")];
        let results = source.fetch_batch(&deps, true).await.unwrap();

        assert_eq!(results.len(), 2);
        assert!(results["lodash"].is_empty());
        assert!(results["express"].is_empty());
    }

    #[tokio::test]
    async fn test_detail_failure_omits_id_without_aborting() {
        let mut server = Server::new_async().await;
        let _batch_mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(200)
            .with_body(
                json!({"results": [{"vulns": [
                    {"id": "GHSA-p6mc-m468-83gw"},
                    {"id": "GHSA-broken-record-id"}
                ]}]})
                .to_string(),
            )
            .create_async()
            .await;
        let _detail_mock = server
            .mock("GET", "/v1/vulns/GHSA-p6mc-m468-83gw")
            .with_status(200)
            .with_body(lodash_record().to_string())
            .create_async()
            .await;
        let _failing_mock = server
            .mock("GET", "/v1/vulns/GHSA-broken-record-id")
            .with_status(404)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = make_source(server.url(), &dir);
        let results = source
            .fetch_batch(&[dep("lodash", "4.17.20")], true)
            .await
            .unwrap();

        assert_eq!(results["lodash"].len(), 1);
        assert_eq!(results["lodash"][0].id.as_str(), "GHSA-p6mc-m468-83gw");
    }

    #[tokio::test]
    async fn test_detail_cache_prevents_refetch() {
        let mut server = Server::new_async().await;
        let _batch_mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(200)
            .with_body(
                json!({"results": [{"vulns": [{"id": "GHSA-p6mc-m468-83gw"}]}]}).to_string(),
            )
            .expect(2)
            .create_async()
            .await;
        let detail_mock = server
            .mock("GET", "/v1/vulns/GHSA-p6mc-m468-83gw")
            .with_status(200)
            .with_body(lodash_record().to_string())
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = make_source(server.url(), &dir);
        let deps = vec![dep("lodash", "4.17.20")];

        source.fetch_batch(&deps, true).await.unwrap();
        source.fetch_batch(&deps, true).await.unwrap();

        detail_mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_persistent_cache_hit_skips_network() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/querybatch")
            .with_status(200)
            .with_body(
                json!({"results": [{"vulns": []}]}).to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let dir = TempDir::new().unwrap();
        let source = make_source(server.url(), &dir);
        let deps = vec![dep("lodash", "4.17.20")];

        // First call misses the cache and writes back an empty list
        source.fetch_batch(&deps, false).await.unwrap();
        // Give the fire-and-forget write a moment to land
        tokio::time::sleep(Duration::from_millis(50)).await;

        // Second call is served entirely from the persistent cache
        let results = source.fetch_batch(&deps, false).await.unwrap();
        mock.assert_async().await;
        assert!(results["lodash"].is_empty());
    }

    #[test]
    fn test_affected_range_conversion() {
        let record: OsvRecord = serde_json::from_value(json!({
            "id": "OSV-1",
            "affected": [{
                "package": {"name": "pkg", "ecosystem": "npm"},
                "ranges": [
                    {"events": [{"introduced": "1.0.0"}, {"fixed": "1.2.0"}]},
                    {"events": [{"introduced": "2.0.0"}, {"last_affected": "2.3.0"}]},
                    {"events": [{"introduced": "3.0.0"}]},
                    {"events": [{"fixed": "0.9.0"}]}
                ]
            }]
        }))
        .unwrap();

        let (range, fixed) = affected_range_for(&record, "pkg");
        assert_eq!(
            range,
            ">=1.0.0 <1.2.0 || >=2.0.0 <=2.3.0 || >=3.0.0 || <0.9.0"
        );
        assert_eq!(fixed, vec!["1.2.0", "0.9.0"]);
    }

    #[test]
    fn test_affected_range_absent_yields_wildcard() {
        let record: OsvRecord = serde_json::from_value(json!({"id": "OSV-2"})).unwrap();
        let (range, fixed) = affected_range_for(&record, "pkg");
        assert_eq!(range, "*");
        assert!(fixed.is_empty());
    }

    #[test]
    fn test_affected_range_ignores_other_packages() {
        let record: OsvRecord = serde_json::from_value(json!({
            "id": "OSV-3",
            "affected": [{
                "package": {"name": "other", "ecosystem": "npm"},
                "ranges": [{"events": [{"introduced": "1.0.0"}]}]
            }]
        }))
        .unwrap();

        let (range, _) = affected_range_for(&record, "pkg");
        assert_eq!(range, "*");
    }
}
