//! Checkpoint sidecar
//!
//! Records how far a run got, next to the details file. Besides the batch
//! and replay counters it stores the byte length of every output stream at
//! the last flush, so a resumed run can cut off rows written after it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

/// Byte length of each output stream at a flush point
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSizes {
    pub details: u64,
    pub deferred: u64,
    pub failures: u64,
}

/// Durable progress marker of one run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// SHA-256 of the profile the run was started with
    pub config_hash: String,
    pub batch_size: usize,
    /// Number of URLs in the link list being processed
    pub url_count: usize,
    /// SHA-256 of the ordered link list; sidecars without one never match
    #[serde(default)]
    pub urls_digest: String,
    /// Static batches flushed, counted from the start of the list
    pub batches_flushed: usize,
    pub static_done: bool,
    /// Deferred URLs already replayed through the renderer
    pub variants_replayed: usize,
    pub completed: bool,
    pub sizes: StreamSizes,
    pub updated_at: DateTime<Utc>,
}

impl Checkpoint {
    pub fn new(config_hash: impl Into<String>, batch_size: usize, urls: &[String]) -> Self {
        Self {
            config_hash: config_hash.into(),
            batch_size,
            url_count: urls.len(),
            urls_digest: digest_urls(urls),
            batches_flushed: 0,
            static_done: false,
            variants_replayed: 0,
            completed: false,
            sizes: StreamSizes::default(),
            updated_at: Utc::now(),
        }
    }

    /// Loads the sidecar at `path`
    ///
    /// A missing sidecar is `Ok(None)`. A corrupt one is logged and treated
    /// as missing, which makes the run start over.
    pub fn load(path: &Path) -> crate::Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)?;
        match serde_json::from_str(&content) {
            Ok(checkpoint) => Ok(Some(checkpoint)),
            Err(e) => {
                tracing::warn!("Ignoring corrupt checkpoint {}: {}", path.display(), e);
                Ok(None)
            }
        }
    }

    /// Writes the sidecar atomically (temp file, then rename)
    pub fn save(&mut self, path: &Path) -> crate::Result<()> {
        self.updated_at = Utc::now();
        let json = serde_json::to_string_pretty(self)?;

        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, path)?;

        tracing::debug!(
            "Checkpoint saved: {} batches, {} replayed",
            self.batches_flushed,
            self.variants_replayed
        );
        Ok(())
    }

    /// Whether this checkpoint belongs to the same profile and URL list
    ///
    /// The list must match URL for URL, in order: batch `k` of a different
    /// list holds different URLs even when the length is the same.
    pub fn is_compatible(&self, config_hash: &str, batch_size: usize, urls: &[String]) -> bool {
        self.config_hash == config_hash
            && self.batch_size == batch_size
            && self.url_count == urls.len()
            && self.urls_digest == digest_urls(urls)
    }
}

/// SHA-256 over the URLs in order, one per line
pub fn digest_urls(urls: &[String]) -> String {
    let mut hasher = Sha256::new();
    for url in urls {
        hasher.update(url.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}
