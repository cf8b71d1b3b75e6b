//! Domain-specific error types

use thiserror::Error;

/// Domain-level errors for vulnerability analysis
#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid dependency: {message}")]
    InvalidDependency { message: String },

    #[error("Invalid vulnerability ID: {id}")]
    InvalidVulnerabilityId { id: String },

    #[error("Invalid vulnerability record: {message}")]
    InvalidVulnerability { message: String },

    #[error("Invalid input for field {field}: {message}")]
    InvalidInput { field: String, message: String },
}
