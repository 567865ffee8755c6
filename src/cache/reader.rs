//! Read side of the page cache.

use std::path::PathBuf;

use bytes::Bytes;
use metrics::counter;
use tracing::debug;

use super::keys::CacheKey;

/// Looks up precomputed pages. Never fails: any I/O problem is a miss.
#[derive(Debug, Clone)]
pub enum CacheReader {
    /// Reads `root/<filename>`.
    Disk { root: PathBuf },
    /// Always misses, forcing a fresh render.
    Bypass,
}

impl CacheReader {
    pub fn disk(root: impl Into<PathBuf>) -> Self {
        CacheReader::Disk { root: root.into() }
    }

    pub async fn read(&self, key: &CacheKey) -> Option<Bytes> {
        let CacheReader::Disk { root } = self else {
            return None;
        };

        let path = root.join(key.filename());
        match tokio::fs::read(&path).await {
            Ok(data) => {
                counter!("ohdl_cache_hit_total").increment(1);
                Some(Bytes::from(data))
            }
            Err(err) => {
                counter!("ohdl_cache_miss_total").increment(1);
                debug!(
                    target = "ohdl::cache::reader",
                    key = %key,
                    error = %err,
                    "cache miss"
                );
                None
            }
        }
    }
}
