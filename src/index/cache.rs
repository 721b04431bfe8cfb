//! Per-workspace, per-branch client cache.
//!
//! One JSON document per `(workspace, branch)` pair records which files are
//! believed synced to the remote index and at what hash, plus the set of
//! files deleted relative to the base branch. The cache is advisory: losing
//! it costs a re-scan, never correctness, so save failures are logged and
//! swallowed.

use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::CacheError;
use crate::index::identity::sha256_hex;

/// Synced state of one file.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileEntry {
    /// SHA-256 of the file bytes at upload time.
    pub hash: String,
    /// Upload time, milliseconds since the epoch.
    pub last_indexed: u64,
    /// Chunks produced for the file.
    pub chunk_count: usize,
}

/// Client-side view of what is synced for one branch of one workspace.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClientCache {
    /// Branch this cache belongs to.
    pub git_branch: String,
    /// Workspace-relative paths deleted relative to the base branch,
    /// insertion-ordered.
    #[serde(default)]
    pub deleted_files: Vec<String>,
    /// Synced files keyed by workspace-relative path.
    pub files: BTreeMap<String, FileEntry>,
}

impl ClientCache {
    /// Fresh empty cache for a branch.
    #[must_use]
    pub fn empty(branch: &str) -> Self {
        Self {
            git_branch: branch.to_string(),
            deleted_files: Vec::new(),
            files: BTreeMap::new(),
        }
    }

    /// Whether `file_path` needs (re-)indexing at `current_hash`.
    #[must_use]
    pub fn should_index(&self, file_path: &str, current_hash: &str) -> bool {
        self.files
            .get(file_path)
            .is_none_or(|entry| entry.hash != current_hash)
    }

    /// Record a file as synced.
    pub fn update_entry(&mut self, file_path: &str, hash: &str, chunk_count: usize) {
        self.files.insert(
            file_path.to_string(),
            FileEntry {
                hash: hash.to_string(),
                last_indexed: epoch_ms(),
                chunk_count,
            },
        );
    }

    /// Adopt the server manifest's view of a file that another client
    /// already uploaded.
    pub fn adopt_manifest(&mut self, file_path: &str, entry: &crate::remote::ManifestFile) {
        self.files.insert(
            file_path.to_string(),
            FileEntry {
                hash: entry.file_hash.clone(),
                last_indexed: entry.last_indexed,
                chunk_count: entry.chunk_count,
            },
        );
    }

    /// Forget a file.
    pub fn remove_entry(&mut self, file_path: &str) {
        self.files.remove(file_path);
    }

    /// Mark a file deleted relative to the base branch.
    pub fn add_deleted(&mut self, file_path: &str) {
        if !self.deleted_files.iter().any(|p| p == file_path) {
            self.deleted_files.push(file_path.to_string());
        }
    }

    /// Clear a deletion mark (the file reappeared).
    pub fn remove_deleted(&mut self, file_path: &str) {
        self.deleted_files.retain(|p| p != file_path);
    }

    /// Total chunks recorded across all files.
    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.files.values().map(|e| e.chunk_count).sum()
    }

    /// Most recent upload time across all files, if any.
    #[must_use]
    pub fn last_sync(&self) -> Option<u64> {
        self.files.values().map(|e| e.last_indexed).max()
    }
}

/// Milliseconds since the Unix epoch.
#[must_use]
pub fn epoch_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
        .unwrap_or(0)
}

/// Loads and persists [`ClientCache`] documents.
#[derive(Debug, Clone)]
pub struct CacheStore {
    cache_dir: PathBuf,
}

impl CacheStore {
    /// Create a store rooted at the host's global-storage directory.
    #[must_use]
    pub fn new(cache_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache_dir: cache_dir.into(),
        }
    }

    /// Cache file path for a `(workspace, branch)` pair.
    #[must_use]
    pub fn cache_path(&self, workspace: &Path, branch: &str) -> PathBuf {
        let ws_hash = sha256_hex(&workspace.to_string_lossy());
        let branch_hash = sha256_hex(branch);
        self.cache_dir
            .join(format!("managed-index-cache-{ws_hash}-{branch_hash}.json"))
    }

    /// Load the cache for `(workspace, branch)`.
    ///
    /// Any read, decode, or validation failure yields a fresh empty cache
    /// for the branch; stale caches are never trusted.
    #[must_use]
    pub fn load(&self, workspace: &Path, branch: &str) -> ClientCache {
        match self.try_load(workspace, branch) {
            Ok(cache) => cache,
            Err(err) => {
                tracing::debug!(branch, error = %err, "Cache unavailable, starting empty");
                ClientCache::empty(branch)
            }
        }
    }

    fn try_load(&self, workspace: &Path, branch: &str) -> Result<ClientCache, CacheError> {
        let path = self.cache_path(workspace, branch);
        let bytes = fs::read(&path).map_err(|e| CacheError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let cache: ClientCache =
            serde_json::from_slice(&bytes).map_err(|e| CacheError::Decode(e.to_string()))?;

        if cache.git_branch != branch {
            return Err(CacheError::Decode(format!(
                "cache branch '{}' does not match '{branch}'",
                cache.git_branch
            )));
        }

        Ok(cache)
    }

    /// Persist the cache atomically. Failures are logged, never propagated.
    pub fn save(&self, workspace: &Path, cache: &ClientCache) {
        if let Err(err) = self.try_save(workspace, cache) {
            tracing::warn!(branch = %cache.git_branch, error = %err, "Failed to save cache");
        }
    }

    fn try_save(&self, workspace: &Path, cache: &ClientCache) -> Result<(), CacheError> {
        fs::create_dir_all(&self.cache_dir).map_err(|e| CacheError::File {
            path: self.cache_dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let path = self.cache_path(workspace, &cache.git_branch);
        let tmp = path.with_extension("json.tmp");

        let body =
            serde_json::to_vec_pretty(cache).map_err(|e| CacheError::Decode(e.to_string()))?;

        let file_err = |e: std::io::Error| CacheError::File {
            path: tmp.display().to_string(),
            reason: e.to_string(),
        };

        let mut file = fs::File::create(&tmp).map_err(file_err)?;
        file.write_all(&body).map_err(file_err)?;
        file.sync_all().map_err(file_err)?;
        drop(file);

        fs::rename(&tmp, &path).map_err(|e| CacheError::File {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    /// Delete the cache file for `(workspace, branch)`, if present.
    pub fn remove(&self, workspace: &Path, branch: &str) {
        let path = self.cache_path(workspace, branch);
        if path.exists() {
            if let Err(err) = fs::remove_file(&path) {
                tracing::warn!(path = %path.display(), error = %err, "Failed to remove cache");
            }
        }
    }
}
