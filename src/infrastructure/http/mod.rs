//! HTTP plumbing shared by all vulnerability sources

pub mod gate;
pub mod transport;

pub use gate::{ConcurrencyGate, DEFAULT_CONCURRENCY, HIGH_THROUGHPUT_CONCURRENCY};
pub use transport::{HttpTransport, RequestOptions, TransportResponse, DEFAULT_RETRIES};
