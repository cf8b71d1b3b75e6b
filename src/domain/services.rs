//! Domain services containing business logic

use std::collections::HashMap;
use std::sync::Mutex;

use polycvss::{Score, Vector};
use tracing::debug;

use super::value_objects::{CvssVersion, Severity};

/// One CVSS entry attached to a vulnerability record, as reported by a provider
#[derive(Debug, Clone, PartialEq)]
pub struct CvssCandidate {
    pub version: CvssVersion,
    pub vector: String,
}

impl CvssCandidate {
    /// Build a candidate from a raw vector string, detecting its version from
    /// the prefix. Vectors without a recognizable prefix are discarded.
    pub fn from_vector(vector: &str) -> Option<Self> {
        CvssVersion::from_vector(vector).map(|version| Self {
            version,
            vector: vector.to_string(),
        })
    }
}

/// The single entry selected from a record's CVSS candidates
#[derive(Debug, Clone, PartialEq)]
pub struct CvssSelection {
    pub version: CvssVersion,
    pub vector: String,
    pub score: Option<f64>,
}

/// Computes and memoizes CVSS base scores, and selects the authoritative
/// entry when a record carries vectors of mixed specification versions.
pub struct CvssScorer {
    memo: Mutex<HashMap<(CvssVersion, String), Option<f64>>>,
}

impl CvssScorer {
    pub fn new() -> Self {
        Self {
            memo: Mutex::new(HashMap::new()),
        }
    }

    /// Select exactly one CVSS entry using strict version priority
    /// 4.0 > 3.1 > 3.0 > 2.0; ties within a version keep first-seen order.
    /// Returns None only when no candidate exists at all.
    pub fn select_best(&self, candidates: &[CvssCandidate]) -> Option<CvssSelection> {
        let best = candidates
            .iter()
            .enumerate()
            // max_by_key returns the last maximum, so invert the index to
            // keep the first-seen entry among equal versions
            .max_by_key(|(index, c)| (c.version, std::cmp::Reverse(*index)))
            .map(|(_, c)| c)?;

        Some(CvssSelection {
            version: best.version,
            vector: best.vector.clone(),
            score: self.score(best.version, &best.vector),
        })
    }

    /// Compute the numeric base score for a vector using the version-specific
    /// published CVSS algorithm. Malformed vectors, empty strings, and vectors
    /// whose prefix contradicts the claimed version all yield None. Results,
    /// including None, are memoized by (version, vector).
    pub fn score(&self, version: CvssVersion, vector: &str) -> Option<f64> {
        let key = (version, vector.to_string());
        {
            let memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
            if let Some(cached) = memo.get(&key) {
                return *cached;
            }
        }

        let computed = Self::compute(version, vector);
        if computed.is_none() {
            debug!(version = %version, vector, "CVSS vector did not produce a score");
        }

        let mut memo = self.memo.lock().unwrap_or_else(|e| e.into_inner());
        memo.insert(key, computed);
        computed
    }

    fn compute(version: CvssVersion, vector: &str) -> Option<f64> {
        if !vector.starts_with(version.vector_prefix()) {
            return None;
        }

        let parsed = vector.parse::<Vector>().ok()?;
        let score = f64::from(f32::from(Score::from(parsed)));
        // Base scores are defined on [0, 10]
        Some(score.clamp(0.0, 10.0))
    }

    /// Normalize a severity from whatever a provider reported. A numeric base
    /// score always wins over a qualitative label; with neither, default to
    /// medium.
    pub fn normalize_severity(score: Option<f64>, label: Option<&str>) -> Severity {
        if let Some(score) = score {
            return Severity::from_score(score);
        }
        if let Some(severity) = label.and_then(Severity::from_label) {
            return severity;
        }
        debug!(?label, "no usable severity signal, defaulting to medium");
        Severity::Medium
    }

    /// Number of memoized (version, vector) results, for diagnostics
    pub fn memo_len(&self) -> usize {
        self.memo.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Default for CvssScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const V31_HIGH: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H";
    const V31_LOW_IMPACT: &str = "CVSS:3.1/AV:N/AC:L/PR:N/UI:N/S:U/C:L/I:L/A:L";
    const V30_HIGH: &str = "CVSS:3.0/AV:N/AC:L/PR:N/UI:N/S:U/C:H/I:H/A:H";
    const V2_PARTIAL: &str = "CVSS:2.0/AV:N/AC:L/Au:N/C:P/I:P/A:P";
    const V4_HIGH: &str = "CVSS:4.0/AV:N/AC:L/AT:N/PR:N/UI:N/VC:H/VI:H/VA:H/SC:N/SI:N/SA:N";

    fn candidates(vectors: &[&str]) -> Vec<CvssCandidate> {
        vectors
            .iter()
            .filter_map(|v| CvssCandidate::from_vector(v))
            .collect()
    }

    #[test]
    fn test_score_known_v31_vector() {
        let scorer = CvssScorer::new();
        let score = scorer.score(CvssVersion::V3_1, V31_HIGH).unwrap();
        assert!((score - 9.8).abs() < 0.05, "expected 9.8, got {score}");
    }

    #[test]
    fn test_score_low_impact_v31_vector() {
        let scorer = CvssScorer::new();
        let score = scorer.score(CvssVersion::V3_1, V31_LOW_IMPACT).unwrap();
        assert!((score - 7.3).abs() < 0.05, "expected 7.3, got {score}");
        assert_eq!(Severity::from_score(score), Severity::High);
    }

    #[test]
    fn test_invalid_vectors_yield_none() {
        let scorer = CvssScorer::new();
        assert_eq!(scorer.score(CvssVersion::V3_1, ""), None);
        assert_eq!(scorer.score(CvssVersion::V3_1, "not a vector"), None);
        assert_eq!(scorer.score(CvssVersion::V3_1, "CVSS:3.1/AV:Q"), None);
        // Version tag contradicting the claimed version
        assert_eq!(scorer.score(CvssVersion::V3_1, V30_HIGH), None);
    }

    #[test]
    fn test_none_results_are_memoized() {
        let scorer = CvssScorer::new();
        assert_eq!(scorer.score(CvssVersion::V3_1, "garbage"), None);
        assert_eq!(scorer.memo_len(), 1);
        assert_eq!(scorer.score(CvssVersion::V3_1, "garbage"), None);
        assert_eq!(scorer.memo_len(), 1);
    }

    #[test]
    fn test_select_best_prefers_highest_version() {
        let scorer = CvssScorer::new();

        // Shuffled combinations always select the maximum version present
        let selection = scorer
            .select_best(&candidates(&[V2_PARTIAL, V31_HIGH, V30_HIGH, V4_HIGH]))
            .unwrap();
        assert_eq!(selection.version, CvssVersion::V4_0);

        let selection = scorer
            .select_best(&candidates(&[V30_HIGH, V2_PARTIAL, V31_HIGH]))
            .unwrap();
        assert_eq!(selection.version, CvssVersion::V3_1);

        let selection = scorer
            .select_best(&candidates(&[V2_PARTIAL, V30_HIGH]))
            .unwrap();
        assert_eq!(selection.version, CvssVersion::V3_0);

        let selection = scorer.select_best(&candidates(&[V2_PARTIAL])).unwrap();
        assert_eq!(selection.version, CvssVersion::V2_0);
    }

    #[test]
    fn test_select_best_ties_keep_first_seen() {
        let scorer = CvssScorer::new();
        let first = CvssCandidate::from_vector(V31_HIGH).unwrap();
        let second = CvssCandidate::from_vector(V31_LOW_IMPACT).unwrap();

        let selection = scorer
            .select_best(&[first.clone(), second])
            .unwrap();
        assert_eq!(selection.vector, first.vector);
    }

    #[test]
    fn test_select_best_empty_is_none() {
        let scorer = CvssScorer::new();
        assert!(scorer.select_best(&[]).is_none());
    }

    #[test]
    fn test_normalize_severity_score_takes_priority() {
        // Numeric score wins even when a contradictory label is present
        assert_eq!(
            CvssScorer::normalize_severity(Some(9.8), Some("low")),
            Severity::Critical
        );
        assert_eq!(
            CvssScorer::normalize_severity(Some(3.2), Some("critical")),
            Severity::Low
        );
    }

    #[test]
    fn test_normalize_severity_label_fallback() {
        assert_eq!(
            CvssScorer::normalize_severity(None, Some("MODERATE")),
            Severity::Medium
        );
        assert_eq!(
            CvssScorer::normalize_severity(None, Some("critical")),
            Severity::Critical
        );
    }

    #[test]
    fn test_normalize_severity_defaults_to_medium() {
        assert_eq!(CvssScorer::normalize_severity(None, None), Severity::Medium);
        assert_eq!(
            CvssScorer::normalize_severity(None, Some("bogus")),
            Severity::Medium
        );
    }
}
