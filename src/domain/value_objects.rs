//! Domain value objects representing immutable concepts

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::errors::DomainError;

/// Represents vulnerability severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Map a numeric CVSS base score onto the four severity buckets
    pub fn from_score(score: f64) -> Self {
        if score >= 9.0 {
            Severity::Critical
        } else if score >= 7.0 {
            Severity::High
        } else if score >= 4.0 {
            Severity::Medium
        } else {
            Severity::Low
        }
    }

    /// Map a qualitative provider label onto the four severity buckets.
    /// "moderate" counts as medium; unknown labels yield None.
    pub fn from_label(label: &str) -> Option<Self> {
        match label.to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" | "moderate" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            _ => None,
        }
    }

    pub fn is_high_impact(&self) -> bool {
        matches!(self, Severity::Critical | Severity::High)
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Low => write!(f, "low"),
            Severity::Medium => write!(f, "medium"),
            Severity::High => write!(f, "high"),
            Severity::Critical => write!(f, "critical"),
        }
    }
}

/// CVSS specification versions, ordered by selection priority (4.0 highest)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum CvssVersion {
    #[serde(rename = "2.0")]
    V2_0,
    #[serde(rename = "3.0")]
    V3_0,
    #[serde(rename = "3.1")]
    V3_1,
    #[serde(rename = "4.0")]
    V4_0,
}

impl CvssVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            CvssVersion::V2_0 => "2.0",
            CvssVersion::V3_0 => "3.0",
            CvssVersion::V3_1 => "3.1",
            CvssVersion::V4_0 => "4.0",
        }
    }

    /// The prefix a vector string of this version must carry
    pub fn vector_prefix(&self) -> &'static str {
        match self {
            CvssVersion::V2_0 => "CVSS:2.0",
            CvssVersion::V3_0 => "CVSS:3.0",
            CvssVersion::V3_1 => "CVSS:3.1",
            CvssVersion::V4_0 => "CVSS:4.0",
        }
    }

    /// Detect the version from a vector string prefix
    pub fn from_vector(vector: &str) -> Option<Self> {
        if vector.starts_with("CVSS:4.0") {
            Some(CvssVersion::V4_0)
        } else if vector.starts_with("CVSS:3.1") {
            Some(CvssVersion::V3_1)
        } else if vector.starts_with("CVSS:3.0") {
            Some(CvssVersion::V3_0)
        } else if vector.starts_with("CVSS:2.0") {
            Some(CvssVersion::V2_0)
        } else {
            None
        }
    }
}

impl fmt::Display for CvssVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strongly-typed vulnerability identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VulnerabilityId(String);

impl VulnerabilityId {
    /// Create a new VulnerabilityId with validation
    pub fn new(id: String) -> Result<Self, DomainError> {
        let id = id.trim().to_string();
        if id.is_empty() {
            return Err(DomainError::InvalidVulnerabilityId {
                id: "<empty>".to_string(),
            });
        }
        if id.len() > 100 {
            return Err(DomainError::InvalidVulnerabilityId { id });
        }

        Ok(VulnerabilityId(id))
    }

    /// Get the inner string value
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is a CVE identifier
    pub fn is_cve(&self) -> bool {
        self.0.starts_with("CVE-")
    }

    /// Check if this is a GHSA identifier
    pub fn is_ghsa(&self) -> bool {
        self.0.starts_with("GHSA-")
    }
}

impl fmt::Display for VulnerabilityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for VulnerabilityId {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s.to_string())
    }
}

/// Provenance tag for the provider that reported a vulnerability
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VulnerabilitySource {
    Osv,
    Ghsa,
}

impl VulnerabilitySource {
    pub fn as_str(&self) -> &'static str {
        match self {
            VulnerabilitySource::Osv => "osv",
            VulnerabilitySource::Ghsa => "ghsa",
        }
    }
}

impl fmt::Display for VulnerabilitySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Breakdown of vulnerabilities by severity
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SeverityBreakdown {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
}

impl SeverityBreakdown {
    /// Tally an iterator of severities into per-bucket counts
    pub fn from_severities<'a, I>(severities: I) -> Self
    where
        I: IntoIterator<Item = &'a Severity>,
    {
        let mut breakdown = Self::default();
        for severity in severities {
            match severity {
                Severity::Critical => breakdown.critical += 1,
                Severity::High => breakdown.high += 1,
                Severity::Medium => breakdown.medium += 1,
                Severity::Low => breakdown.low += 1,
            }
        }
        breakdown
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low
    }

    /// Check if there are any high-severity entries (High or Critical)
    pub fn has_high_severity(&self) -> bool {
        self.critical > 0 || self.high > 0
    }
}
