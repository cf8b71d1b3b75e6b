//! Persistent, compressing, TTL- and severity-aware cache

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use base64::Engine;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use super::blob_store::BlobStore;
use crate::application::errors::CacheError;
use crate::domain::Severity;

/// Entries larger than this many serialized bytes are gzip-compressed
pub const COMPRESSION_THRESHOLD_BYTES: usize = 10 * 1024;

/// Default time-to-live for cached entries
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60);

/// On-disk cache document. A compressed entry never carries an uncompressed
/// payload and vice versa; the two shapes are distinct variants.
#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum CacheEnvelope {
    Compressed {
        timestamp: i64,
        compressed: bool,
        #[serde(rename = "compressedData")]
        compressed_data: String,
    },
    Plain {
        timestamp: i64,
        compressed: bool,
        data: Value,
    },
}

/// Cache statistics for monitoring
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub expired_entries: u64,
    pub severity_bypasses: u64,
    pub compressed_writes: u64,
    pub bytes_saved: u64,
}

/// Persistent cache in front of the vulnerability sources.
///
/// Keys are human-readable `"<source>:<name>:<version>"` strings hashed to
/// filesystem-safe blob names. Reads never fail the caller: any IO, parse, or
/// decompression problem degrades to a miss.
pub struct VulnCache {
    store: Arc<dyn BlobStore>,
    ttl: Duration,
    compression_threshold: usize,
    refresh_high_severity: bool,
    stats: Mutex<CacheStats>,
}

/// Build the canonical cache key for a payload
pub fn cache_key(namespace: &str, name: &str, version: &str) -> String {
    format!("{namespace}:{name}:{version}")
}

impl VulnCache {
    pub fn new(store: Arc<dyn BlobStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            compression_threshold: COMPRESSION_THRESHOLD_BYTES,
            refresh_high_severity: true,
            stats: Mutex::new(CacheStats::default()),
        }
    }

    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Disable the forced refresh of entries holding critical/high findings
    pub fn with_high_severity_refresh(mut self, enabled: bool) -> Self {
        self.refresh_high_severity = enabled;
        self
    }

    /// Derive the blob name for a key. The namespace prefix stays readable so
    /// `clear` can match per-source blobs; the rest of the key is hashed to
    /// avoid filesystem-unsafe characters.
    fn blob_name(key: &str) -> String {
        let namespace = key.split(':').next().unwrap_or("cache");
        let mut hasher = Sha256::new();
        hasher.update(key.as_bytes());
        format!("{}-{}.json", namespace, hex::encode(hasher.finalize()))
    }

    /// Look up a cached value. Expired entries are deleted lazily; entries
    /// holding critical/high findings are treated as a miss while the
    /// severity refresh is enabled; every error is a miss.
    pub async fn get<T>(&self, key: &str) -> Option<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let blob = Self::blob_name(key);

        let payload = match self.read_payload(&blob).await {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                self.record(|s| s.misses += 1).await;
                return None;
            }
            Err(e) => {
                debug!(key, "cache read degraded to miss: {e}");
                self.record(|s| s.misses += 1).await;
                return None;
            }
        };

        if self.refresh_high_severity && contains_high_severity(&payload) {
            debug!(key, "cached entry holds high-impact findings, forcing refresh");
            self.record(|s| {
                s.severity_bypasses += 1;
                s.misses += 1;
            })
            .await;
            return None;
        }

        match serde_json::from_value(payload) {
            Ok(value) => {
                self.record(|s| s.hits += 1).await;
                debug!(key, "cache hit");
                Some(value)
            }
            Err(e) => {
                debug!(key, "cached payload failed to deserialize: {e}");
                self.record(|s| s.misses += 1).await;
                None
            }
        }
    }

    /// Store a value under the key, compressing large payloads
    pub async fn put<T>(&self, key: &str, value: &T) -> Result<(), CacheError>
    where
        T: Serialize,
    {
        let timestamp = chrono::Utc::now().timestamp_millis();
        let plain = CacheEnvelope::Plain {
            timestamp,
            compressed: false,
            data: serde_json::to_value(value)?,
        };
        let serialized = serde_json::to_vec(&plain)?;

        let document = if serialized.len() > self.compression_threshold {
            match compress_base64(&serialized) {
                Ok(compressed_data) => {
                    let saved = serialized.len().saturating_sub(compressed_data.len());
                    debug!(
                        key,
                        original_bytes = serialized.len(),
                        compressed_bytes = compressed_data.len(),
                        bytes_saved = saved,
                        "compressed cache entry"
                    );
                    self.record(|s| {
                        s.compressed_writes += 1;
                        s.bytes_saved += saved as u64;
                    })
                    .await;
                    CacheEnvelope::Compressed {
                        timestamp,
                        compressed: true,
                        compressed_data,
                    }
                }
                Err(e) => {
                    // Losing the entry would be worse than storing it large
                    warn!(key, "compression failed, storing uncompressed: {e}");
                    plain
                }
            }
        } else {
            plain
        };

        self.store
            .write(&Self::blob_name(key), &serde_json::to_vec(&document)?)
            .await
    }

    /// Remove every entry belonging to a namespace, returning how many blobs
    /// were deleted
    pub async fn clear(&self, namespace: &str) -> Result<u64, CacheError> {
        let prefix = format!("{namespace}-");
        let mut removed = 0u64;
        for name in self.store.list().await? {
            if name.starts_with(&prefix) {
                if let Err(e) = self.store.delete(&name).await {
                    warn!(blob = %name, "failed to delete cache blob: {e}");
                } else {
                    removed += 1;
                }
            }
        }
        debug!(namespace, removed, "cleared cache namespace");
        Ok(removed)
    }

    pub async fn stats(&self) -> CacheStats {
        self.stats.lock().await.clone()
    }

    async fn record(&self, update: impl FnOnce(&mut CacheStats)) {
        let mut stats = self.stats.lock().await;
        update(&mut stats);
    }

    /// Read a blob and unwrap its envelope, returning the inner payload
    /// unless the entry is expired, corrupt, or unreadable
    async fn read_payload(&self, blob: &str) -> Result<Option<Value>, CacheError> {
        let bytes = match self.store.read(blob).await {
            Ok(bytes) => bytes,
            Err(_) => return Ok(None),
        };

        let envelope: CacheEnvelope = serde_json::from_slice(&bytes)?;
        let (timestamp, payload) = match envelope {
            CacheEnvelope::Plain {
                timestamp,
                compressed: false,
                data,
            } => (timestamp, data),
            CacheEnvelope::Compressed {
                timestamp,
                compressed: true,
                compressed_data,
            } => {
                let inner_bytes = decompress_base64(&compressed_data)?;
                let inner: CacheEnvelope = serde_json::from_slice(&inner_bytes)?;
                match inner {
                    CacheEnvelope::Plain {
                        compressed: false,
                        data,
                        ..
                    } => (timestamp, data),
                    // Decompressed content still claiming compression means
                    // the blob was mangled somewhere along the way
                    _ => {
                        return Err(CacheError::Corrupt {
                            message: "decompressed entry is still marked compressed".to_string(),
                        });
                    }
                }
            }
            _ => {
                return Err(CacheError::Corrupt {
                    message: "compression flag contradicts payload shape".to_string(),
                });
            }
        };

        let age_ms = chrono::Utc::now().timestamp_millis() - timestamp;
        if age_ms < 0 || age_ms as u128 > self.ttl.as_millis() {
            debug!(blob, age_ms, "cache entry expired, deleting");
            if let Err(e) = self.store.delete(blob).await {
                debug!(blob, "failed to delete expired blob: {e}");
            }
            self.record(|s| s.expired_entries += 1).await;
            return Ok(None);
        }

        Ok(Some(payload))
    }
}

/// Check whether a cached payload holds at least one critical or high finding
fn contains_high_severity(payload: &Value) -> bool {
    match payload {
        Value::Array(items) => items.iter().any(|item| {
            item.get("severity")
                .and_then(|s| s.as_str())
                .and_then(Severity::from_label)
                .is_some_and(|s| s.is_high_impact())
        }),
        _ => false,
    }
}

fn compress_base64(bytes: &[u8]) -> Result<String, CacheError> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|e| CacheError::Compression {
            message: e.to_string(),
        })?;
    let compressed = encoder.finish().map_err(|e| CacheError::Compression {
        message: e.to_string(),
    })?;
    Ok(base64::engine::general_purpose::STANDARD.encode(compressed))
}

fn decompress_base64(encoded: &str) -> Result<Vec<u8>, CacheError> {
    let compressed = base64::engine::general_purpose::STANDARD
        .decode(encoded.as_bytes())
        .map_err(|e| CacheError::Corrupt {
            message: format!("base64 decode failed: {e}"),
        })?;
    let mut decoder = GzDecoder::new(compressed.as_slice());
    let mut decompressed = Vec::new();
    decoder
        .read_to_end(&mut decompressed)
        .map_err(|e| CacheError::Corrupt {
            message: format!("gunzip failed: {e}"),
        })?;
    Ok(decompressed)
}
