//! depsentry - vulnerability aggregation for dependency health analysis
//!
//! This crate aggregates known-vulnerability data for a list of package
//! dependencies from multiple independent, rate-limited vulnerability
//! databases, merges the results, and persists them in a compressed,
//! time-boxed local cache.

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;
pub mod logging;

pub use application::{AuditService, AuditServiceImpl};
pub use config::Config;
pub use logging::init_tracing;
