use std::path::PathBuf;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use parking_lot::Mutex;

use crate::error::StorageError;

const RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Opaque blob storage for packaged deployment archives and cloned-repo
/// tarballs (spec.md §3/§6). Blobs are keyed by session id and never
/// overwritten — packaging always writes to a fresh key — so no
/// compare-and-swap is needed on `put`.
pub struct ArtifactStore {
    root: PathBuf,
    written_at: Mutex<std::collections::HashMap<String, u64>>,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> std::io::Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        Ok(Self { root, written_at: Mutex::new(std::collections::HashMap::new()) })
    }

    /// Blob layout: `deployments/<session-id>/function.<ext>` for
    /// simple-lambda archives, `deployments/<session-id>/functions/<logical-id>.<ext>`
    /// for SAM function archives (spec.md §6).
    pub fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StorageError> {
        let path = self.root.join(key);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, bytes)?;
        self.written_at.lock().insert(key.to_string(), now_secs());
        Ok(())
    }

    pub fn get(&self, key: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.root.join(key);
        std::fs::read(&path).map_err(|_| StorageError::ArtifactNotFound { key: key.to_string() })
    }

    /// Returns the URI an IaC template should reference for a stored blob.
    pub fn blob_uri(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }

    /// Deletes every blob older than the 7-day retention window and
    /// returns the keys removed. Intended to run on a supervisor
    /// housekeeping timer, not inline with any worker job.
    pub fn sweep_expired(&self) -> Vec<String> {
        let cutoff = now_secs().saturating_sub(RETENTION.as_secs());
        let mut written_at = self.written_at.lock();
        let expired: Vec<String> =
            written_at.iter().filter(|(_, written)| **written < cutoff).map(|(k, _)| k.clone()).collect();
        for key in &expired {
            let _ = std::fs::remove_file(self.root.join(key));
            written_at.remove(key);
        }
        expired
    }
}

fn now_secs() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or(Duration::ZERO).as_secs()
}
