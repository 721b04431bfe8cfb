//! Incremental re-indexing of watcher batches.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::Config;
use crate::index::cache::{CacheStore, ClientCache};
use crate::index::scanner::upsert_with_retry;
use crate::index::{build_chunks, identity};
use crate::remote::{DeleteFilesRequest, RemoteIndex, UPSERT_BATCH_SIZE};
use crate::Result;

/// Processes debounced event batches against the remote index.
///
/// Deletes are processed before creates/changes so a rename inside one
/// window never resurrects stale chunks. Per-file failures are logged and
/// the batch continues.
pub struct EventHandler {
    config: Config,
    remote: Arc<dyn RemoteIndex>,
    cache: Arc<Mutex<ClientCache>>,
    store: CacheStore,
    workspace: PathBuf,
    branch: String,
    is_base: bool,
}

impl EventHandler {
    /// Create a handler for one branch of one workspace.
    #[must_use]
    pub fn new(
        config: Config,
        remote: Arc<dyn RemoteIndex>,
        cache: Arc<Mutex<ClientCache>>,
        store: CacheStore,
        workspace: PathBuf,
        branch: String,
        is_base: bool,
    ) -> Self {
        Self {
            config,
            remote,
            cache,
            store,
            workspace,
            branch,
            is_base,
        }
    }

    /// Process one debounced batch. Deletes first, then creates/changes.
    pub async fn process_batch(&self, batch: super::EventBatch) {
        let total = batch.len();

        for path in &batch.deleted {
            let Some(rel) = self.relative(path) else {
                continue;
            };
            if let Err(err) = self.handle_delete(&rel).await {
                tracing::warn!(path = %rel, error = %err, "Failed to process deletion");
            }
        }

        for path in &batch.modified {
            let Some(rel) = self.relative(path) else {
                continue;
            };
            if let Err(err) = self.handle_modify(path, &rel).await {
                tracing::warn!(path = %rel, error = %err, "Failed to re-index file");
            }
        }

        let snapshot = self.cache.lock().clone();
        self.store.save(&self.workspace, &snapshot);

        tracing::debug!(
            events = total,
            deleted = batch.deleted.len(),
            modified = batch.modified.len(),
            "Processed event batch"
        );
    }

    /// Workspace-relative forward-slash path, or `None` for paths outside
    /// the workspace.
    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.workspace).ok()?;
        let rel = rel.to_string_lossy().replace('\\', "/");
        if rel.is_empty() {
            None
        } else {
            Some(rel)
        }
    }

    async fn handle_delete(&self, rel: &str) -> Result<()> {
        self.remote
            .delete_files(DeleteFilesRequest {
                organization_id: self.config.organization_id.clone(),
                project_id: self.config.project_id.clone(),
                git_branch: self.branch.clone(),
                file_paths: vec![rel.to_string()],
            })
            .await?;

        let mut cache = self.cache.lock();
        cache.remove_entry(rel);
        if !self.is_base {
            cache.add_deleted(rel);
        }

        tracing::info!(path = %rel, branch = %self.branch, "Removed file from index");
        Ok(())
    }

    async fn handle_modify(&self, abs: &Path, rel: &str) -> Result<()> {
        let bytes = tokio::fs::read(abs).await?;
        let hash = identity::file_hash(&bytes);
        let content = String::from_utf8_lossy(&bytes);

        let chunks = build_chunks(
            rel,
            &content,
            &self.config.organization_id,
            &self.config.project_id,
            &self.branch,
            self.is_base,
            self.config.chunking,
        );

        // Drop the file's previous chunks first: an edit that shifts lines
        // changes chunk identities, and the stale ranges would otherwise
        // linger server-side.
        self.remote
            .delete_files(DeleteFilesRequest {
                organization_id: self.config.organization_id.clone(),
                project_id: self.config.project_id.clone(),
                git_branch: self.branch.clone(),
                file_paths: vec![rel.to_string()],
            })
            .await?;

        let chunk_count = chunks.len();
        let batch_size = self.config.batch_size.min(UPSERT_BATCH_SIZE);
        for group in chunks.chunks(batch_size) {
            upsert_with_retry(self.remote.as_ref(), group.to_vec()).await?;
        }

        let mut cache = self.cache.lock();
        cache.update_entry(rel, &hash, chunk_count);
        cache.remove_deleted(rel);

        tracing::info!(path = %rel, chunks = chunk_count, "Re-indexed file");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockRemoteIndex;
    use crate::watcher::{EventBatch, FileEvent};
    use std::fs;
    use tempfile::TempDir;

    fn long_body() -> String {
        (0..30)
            .map(|i| format!("export const value{i} = {i}; // padding padding"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn handler_for(
        ws: &Path,
        cache_dir: &Path,
        remote: Arc<MockRemoteIndex>,
        branch: &str,
        is_base: bool,
    ) -> (EventHandler, Arc<Mutex<ClientCache>>) {
        let config = Config {
            workspace: ws.to_path_buf(),
            organization_id: "org-1".to_string(),
            project_id: "proj-1".to_string(),
            api_token: "mi_us_test".to_string(),
            cache_dir: cache_dir.to_path_buf(),
            ..Default::default()
        };
        let cache = Arc::new(Mutex::new(ClientCache::empty(branch)));
        let handler = EventHandler::new(
            config,
            remote,
            Arc::clone(&cache),
            CacheStore::new(cache_dir),
            ws.to_path_buf(),
            branch.to_string(),
            is_base,
        );
        (handler, cache)
    }

    #[tokio::test]
    async fn test_modify_uploads_and_updates_cache() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemoteIndex::new());

        let file = tmp.path().join("b.ts");
        fs::write(&file, long_body()).unwrap();

        let (handler, cache) =
            handler_for(tmp.path(), cache_dir.path(), Arc::clone(&remote), "main", true);

        let mut batch = EventBatch::new();
        batch.add(FileEvent::Modified(file));
        handler.process_batch(batch).await;

        assert!(!remote.chunks_for("main", "b.ts").is_empty());
        assert!(cache.lock().files.contains_key("b.ts"));
        // Prior chunks for the file are dropped before the new upload.
        assert_eq!(
            remote.deleted(),
            vec![("main".to_string(), "b.ts".to_string())]
        );
    }

    #[tokio::test]
    async fn test_delete_removes_from_server_and_cache() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemoteIndex::new());

        let (handler, cache) =
            handler_for(tmp.path(), cache_dir.path(), Arc::clone(&remote), "main", true);
        cache.lock().update_entry("b.ts", "h", 2);

        let mut batch = EventBatch::new();
        batch.add(FileEvent::Deleted(tmp.path().join("b.ts")));
        handler.process_batch(batch).await;

        assert_eq!(remote.delete_file_calls(), 1);
        let cache = cache.lock();
        assert!(!cache.files.contains_key("b.ts"));
        // Base branch deletions never populate deleted_files.
        assert!(cache.deleted_files.is_empty());
    }

    #[tokio::test]
    async fn test_feature_branch_delete_records_deleted_file() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemoteIndex::new());

        let (handler, cache) = handler_for(
            tmp.path(),
            cache_dir.path(),
            Arc::clone(&remote),
            "feature/x",
            false,
        );

        let mut batch = EventBatch::new();
        batch.add(FileEvent::Deleted(tmp.path().join("u.ts")));
        handler.process_batch(batch).await;

        assert_eq!(cache.lock().deleted_files, vec!["u.ts".to_string()]);
    }

    #[tokio::test]
    async fn test_recreated_file_clears_deletion_mark() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemoteIndex::new());

        let file = tmp.path().join("u.ts");
        fs::write(&file, long_body()).unwrap();

        let (handler, cache) = handler_for(
            tmp.path(),
            cache_dir.path(),
            Arc::clone(&remote),
            "feature/x",
            false,
        );
        cache.lock().add_deleted("u.ts");

        let mut batch = EventBatch::new();
        batch.add(FileEvent::Modified(file));
        handler.process_batch(batch).await;

        assert!(cache.lock().deleted_files.is_empty());
        assert!(cache.lock().files.contains_key("u.ts"));
    }

    #[tokio::test]
    async fn test_per_file_error_does_not_abort_batch() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemoteIndex::new());

        let good = tmp.path().join("good.ts");
        fs::write(&good, long_body()).unwrap();

        let (handler, cache) =
            handler_for(tmp.path(), cache_dir.path(), Arc::clone(&remote), "main", true);

        let mut batch = EventBatch::new();
        // Missing file: the read fails, the batch continues.
        batch.add(FileEvent::Modified(tmp.path().join("missing.ts")));
        batch.add(FileEvent::Modified(good));
        handler.process_batch(batch).await;

        assert!(cache.lock().files.contains_key("good.ts"));
        assert!(!cache.lock().files.contains_key("missing.ts"));
    }

    #[tokio::test]
    async fn test_paths_outside_workspace_ignored() {
        let tmp = TempDir::new().unwrap();
        let cache_dir = TempDir::new().unwrap();
        let remote = Arc::new(MockRemoteIndex::new());

        let (handler, cache) =
            handler_for(tmp.path(), cache_dir.path(), Arc::clone(&remote), "main", true);

        let mut batch = EventBatch::new();
        batch.add(FileEvent::Deleted(PathBuf::from("/elsewhere/x.ts")));
        handler.process_batch(batch).await;

        assert_eq!(remote.delete_file_calls(), 0);
        assert!(cache.lock().files.is_empty());
    }
}
