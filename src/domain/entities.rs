//! Domain entities representing core business concepts

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::errors::DomainError;
use super::value_objects::*;

/// One package name + resolved/installed version being checked
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Dependency {
    pub name: String,
    pub version: String,
    pub version_constraint: Option<String>,
    pub is_dev: bool,
}

impl Dependency {
    /// Create a new dependency with validation
    pub fn new(name: String, version: String) -> Result<Self, DomainError> {
        let name = name.trim().to_string();
        if name.is_empty() {
            return Err(DomainError::InvalidDependency {
                message: "name cannot be empty".to_string(),
            });
        }
        if name.len() > 214 {
            return Err(DomainError::InvalidDependency {
                message: "name too long (max 214 characters)".to_string(),
            });
        }
        let version = version.trim().to_string();
        if version.is_empty() {
            return Err(DomainError::InvalidDependency {
                message: "version cannot be empty".to_string(),
            });
        }

        Ok(Dependency {
            name,
            version,
            version_constraint: None,
            is_dev: false,
        })
    }

    pub fn with_constraint(mut self, constraint: String) -> Self {
        self.version_constraint = Some(constraint);
        self
    }

    pub fn dev(mut self) -> Self {
        self.is_dev = true;
        self
    }

    /// Identity for caching and lookup purposes: `name@version`
    pub fn identifier(&self) -> String {
        format!("{}@{}", self.name, self.version)
    }
}

/// A single known-issue entry with severity/CVSS/affected-range metadata.
/// Immutable once constructed; `sources` records provenance, not identity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vulnerability {
    pub id: VulnerabilityId,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub cvss_score: Option<f64>,
    pub cvss_version: Option<CvssVersion>,
    pub vector_string: Option<String>,
    /// Semver-range string describing affected versions, `*` when unknown
    pub affected_versions: String,
    pub patched_versions: Option<String>,
    pub references: Vec<String>,
    pub cwe_ids: Vec<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub last_modified_at: Option<DateTime<Utc>>,
    pub sources: Vec<VulnerabilitySource>,
}

impl Vulnerability {
    /// Create a new vulnerability with validation
    pub fn new(
        id: VulnerabilityId,
        title: String,
        description: String,
        severity: Severity,
        affected_versions: String,
        sources: Vec<VulnerabilitySource>,
    ) -> Result<Self, DomainError> {
        if title.trim().is_empty() {
            return Err(DomainError::InvalidVulnerability {
                message: "title cannot be empty".to_string(),
            });
        }
        if sources.is_empty() {
            return Err(DomainError::InvalidVulnerability {
                message: "at least one source is required".to_string(),
            });
        }
        let affected_versions = if affected_versions.trim().is_empty() {
            "*".to_string()
        } else {
            affected_versions
        };

        Ok(Vulnerability {
            id,
            title: title.trim().to_string(),
            description,
            severity,
            cvss_score: None,
            cvss_version: None,
            vector_string: None,
            affected_versions,
            patched_versions: None,
            references: Vec::new(),
            cwe_ids: Vec::new(),
            published_at: None,
            last_modified_at: None,
            sources,
        })
    }

    pub fn has_fix(&self) -> bool {
        self.patched_versions.is_some()
    }
}

/// Registry metadata for a package, the other payload shape the cache stores
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub description: Option<String>,
    pub license: Option<String>,
    pub latest_version: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_vulnerability() -> Vulnerability {
        Vulnerability::new(
            VulnerabilityId::new("CVE-2022-24999".to_string()).unwrap(),
            "Test vulnerability".to_string(),
            "A test vulnerability for unit testing".to_string(),
            Severity::High,
            ">=4.0.0 <4.17.3".to_string(),
            vec![VulnerabilitySource::Osv],
        )
        .unwrap()
    }

    #[test]
    fn test_dependency_creation() {
        let dep = Dependency::new("lodash".to_string(), "4.17.20".to_string()).unwrap();
        assert_eq!(dep.name, "lodash");
        assert_eq!(dep.version, "4.17.20");
        assert!(dep.version_constraint.is_none());
        assert!(!dep.is_dev);
    }

    #[test]
    fn test_dependency_validation() {
        assert!(Dependency::new("".to_string(), "1.0.0".to_string()).is_err());
        assert!(Dependency::new("lodash".to_string(), "".to_string()).is_err());
        assert!(Dependency::new("a".repeat(215), "1.0.0".to_string()).is_err());
        assert!(Dependency::new("  express ".to_string(), " 4.17.1 ".to_string()).is_ok());
    }

    #[test]
    fn test_dependency_identifier() {
        let dep = Dependency::new("express".to_string(), "4.17.1".to_string()).unwrap();
        assert_eq!(dep.identifier(), "express@4.17.1");
    }

    #[test]
    fn test_dependency_builders() {
        let dep = Dependency::new("jest".to_string(), "26.6.3".to_string())
            .unwrap()
            .with_constraint("^26.0.0".to_string())
            .dev();
        assert_eq!(dep.version_constraint.as_deref(), Some("^26.0.0"));
        assert!(dep.is_dev);
    }

    #[test]
    fn test_vulnerability_creation() {
        let vuln = create_test_vulnerability();
        assert_eq!(vuln.id.as_str(), "CVE-2022-24999");
        assert_eq!(vuln.severity, Severity::High);
        assert_eq!(vuln.affected_versions, ">=4.0.0 <4.17.3");
        assert!(!vuln.has_fix());
    }

    #[test]
    fn test_vulnerability_validation() {
        let result = Vulnerability::new(
            VulnerabilityId::new("CVE-2022-24999".to_string()).unwrap(),
            "".to_string(),
            "Description".to_string(),
            Severity::High,
            "*".to_string(),
            vec![VulnerabilitySource::Osv],
        );
        assert!(result.is_err());

        let result = Vulnerability::new(
            VulnerabilityId::new("CVE-2022-24999".to_string()).unwrap(),
            "Title".to_string(),
            "Description".to_string(),
            Severity::High,
            "*".to_string(),
            vec![],
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_vulnerability_empty_range_defaults_to_wildcard() {
        let vuln = Vulnerability::new(
            VulnerabilityId::new("GHSA-jjv7-qpx3-h62q".to_string()).unwrap(),
            "Title".to_string(),
            "Description".to_string(),
            Severity::Medium,
            "  ".to_string(),
            vec![VulnerabilitySource::Ghsa],
        )
        .unwrap();
        assert_eq!(vuln.affected_versions, "*");
    }

    #[test]
    fn test_vulnerability_serde_round_trip() {
        let vuln = create_test_vulnerability();
        let json = serde_json::to_string(&vuln).unwrap();
        let parsed: Vulnerability = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, vuln);
    }
}
