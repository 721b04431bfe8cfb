//! Reconciliation scanner.
//!
//! One scan pass compares the local tree, the client cache, and the server
//! manifest, then chunks and uploads exactly the files whose content is not
//! already represented server-side. Base branches index the full tracked
//! tree; feature branches index only the diff against the base branch.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::Config;
use crate::error::RemoteError;
use crate::git;
use crate::index::cache::{CacheStore, ClientCache};
use crate::index::filter::is_supported;
use crate::index::{build_chunks, identity};
use crate::remote::{Chunk, DeleteFilesRequest, RemoteIndex, ServerManifest, UPSERT_BATCH_SIZE};
use crate::{Error, Result};

/// Upsert retry schedule: 3 attempts, 500 ms base, doubling, ±20% jitter.
const UPSERT_ATTEMPTS: u32 = 3;
const UPSERT_BACKOFF_BASE: Duration = Duration::from_millis(500);

/// Cache is flushed after this many mutations mid-scan.
const FLUSH_EVERY: usize = 100;

/// Result of one reconciliation pass.
#[derive(Debug, Default)]
pub struct ScanOutcome {
    /// Candidate files examined.
    pub files_processed: usize,
    /// Chunks uploaded this pass.
    pub chunks_indexed: usize,
    /// Per-file failures; empty means the scan succeeded.
    pub errors: Vec<String>,
}

impl ScanOutcome {
    /// Whether every file reconciled cleanly.
    #[must_use]
    pub fn success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Progress snapshot handed to the caller after each reconciled file.
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress {
    pub files_done: usize,
    pub files_total: usize,
    pub chunks_indexed: usize,
}

/// Per-file pipeline failure.
struct FileFailure {
    path: String,
    error: Error,
}

/// Drives one scan pass.
pub struct Scanner {
    config: Config,
    remote: Arc<dyn RemoteIndex>,
    store: CacheStore,
}

impl Scanner {
    /// Create a scanner.
    #[must_use]
    pub fn new(config: Config, remote: Arc<dyn RemoteIndex>, store: CacheStore) -> Self {
        Self {
            config,
            remote,
            store,
        }
    }

    /// Run one reconciliation pass.
    ///
    /// Per-file failures land in the outcome's `errors`; the pass itself
    /// fails only when an upsert exhausts its transport retries or the
    /// workspace cannot be enumerated.
    ///
    /// # Errors
    ///
    /// Returns an error if git enumeration fails or an upsert batch exhausts
    /// its retries with a transport failure.
    pub async fn scan(
        &self,
        cache: &Mutex<ClientCache>,
        manifest: Option<&ServerManifest>,
        progress: impl Fn(ScanProgress) + Send + Sync,
    ) -> Result<ScanOutcome> {
        let ws = self.config.workspace_abs()?;
        let branch = git::current_branch(&ws)?;
        let is_base = git::is_base_branch(&branch, Some(&ws));

        let candidates = self.enumerate(&ws, &branch, is_base, cache).await?;
        let mut outcome = ScanOutcome::default();
        let files_total = candidates.len();

        tracing::info!(
            branch = %branch,
            is_base,
            candidates = files_total,
            "Starting reconcile pass"
        );

        // Three-way reconcile: skip files whose hash the cache or the
        // manifest already has; queue the rest for upload.
        let mut queue: Vec<String> = Vec::new();
        let mut mutations = 0usize;

        for path in candidates.iter() {
            let abs = ws.join(path);
            let bytes = match std::fs::read(&abs) {
                Ok(bytes) => bytes,
                Err(err) => {
                    outcome.errors.push(format!("{path}: {err}"));
                    outcome.files_processed += 1;
                    continue;
                }
            };
            let hash = identity::file_hash(&bytes);

            let mut guard = cache.lock();
            if !guard.should_index(path, &hash) {
                drop(guard);
                outcome.files_processed += 1;
                progress(ScanProgress {
                    files_done: outcome.files_processed,
                    files_total,
                    chunks_indexed: outcome.chunks_indexed,
                });
                continue;
            }

            if let Some(entry) = manifest.and_then(|m| m.file(path)) {
                if entry.file_hash == hash {
                    // Another client already uploaded this content; adopt
                    // the manifest's view instead of re-uploading.
                    guard.adopt_manifest(path, entry);
                    drop(guard);
                    mutations += 1;
                    if mutations % FLUSH_EVERY == 0 {
                        self.flush(&ws, cache);
                    }
                    outcome.files_processed += 1;
                    progress(ScanProgress {
                        files_done: outcome.files_processed,
                        files_total,
                        chunks_indexed: outcome.chunks_indexed,
                    });
                    continue;
                }
            }
            drop(guard);

            queue.push(path.clone());
        }

        // Base-branch deletion detection: manifest entries with no live file
        // are purged server-side.
        if is_base {
            if let Some(manifest) = manifest {
                let live: HashSet<&str> = candidates.iter().map(String::as_str).collect();
                let stale: Vec<String> = manifest
                    .files
                    .iter()
                    .map(|f| f.file_path.clone())
                    .filter(|p| !live.contains(p.as_str()))
                    .collect();

                if !stale.is_empty() {
                    self.delete_stale(&ws, &branch, &stale, cache, &mut outcome)
                        .await;
                }
            }
        }

        // Chunk and upload, bounded by the per-scan concurrency cap.
        self.upload_queue(
            &ws,
            &branch,
            is_base,
            queue,
            cache,
            &mut outcome,
            files_total,
            &progress,
        )
        .await?;

        self.flush(&ws, cache);

        tracing::info!(
            branch = %branch,
            files = outcome.files_processed,
            chunks = outcome.chunks_indexed,
            errors = outcome.errors.len(),
            "Reconcile pass complete"
        );

        Ok(outcome)
    }

    /// Candidate files for this pass, workspace-relative.
    async fn enumerate(
        &self,
        ws: &Path,
        branch: &str,
        is_base: bool,
        cache: &Mutex<ClientCache>,
    ) -> Result<Vec<String>> {
        let extensions = self.config.extensions.clone();

        if is_base {
            let ws = ws.to_path_buf();
            let files = tokio::task::spawn_blocking(move || git::tracked_files(&ws))
                .await
                .map_err(|e| Error::internal(format!("enumeration task failed: {e}")))??;

            Ok(files
                .into_iter()
                .filter(|p| is_supported(Path::new(p), extensions.as_deref()))
                .collect())
        } else {
            let base = git::base_branch(ws);
            let diff = {
                let ws = ws.to_path_buf();
                let branch = branch.to_string();
                let base = base.clone();
                tokio::task::spawn_blocking(move || git::diff(&branch, &base, &ws))
                    .await
                    .map_err(|e| Error::internal(format!("diff task failed: {e}")))??
            };

            {
                let mut guard = cache.lock();
                for path in &diff.deleted {
                    guard.add_deleted(path);
                    guard.remove_entry(path);
                }
            }

            Ok(diff
                .candidates()
                .into_iter()
                .filter(|p| is_supported(Path::new(p), extensions.as_deref()))
                .collect())
        }
    }

    /// Purge files the manifest still holds but the tree no longer does.
    async fn delete_stale(
        &self,
        ws: &Path,
        branch: &str,
        stale: &[String],
        cache: &Mutex<ClientCache>,
        outcome: &mut ScanOutcome,
    ) {
        tracing::info!(count = stale.len(), "Deleting files absent from workspace");

        for group in stale.chunks(UPSERT_BATCH_SIZE) {
            let request = DeleteFilesRequest {
                organization_id: self.config.organization_id.clone(),
                project_id: self.config.project_id.clone(),
                git_branch: branch.to_string(),
                file_paths: group.to_vec(),
            };

            match self.remote.delete_files(request).await {
                Ok(()) => {
                    let mut guard = cache.lock();
                    for path in group {
                        guard.remove_entry(path);
                    }
                }
                Err(err) => {
                    outcome
                        .errors
                        .push(format!("delete of {} stale files: {err}", group.len()));
                }
            }
        }

        self.flush(ws, cache);
    }

    /// Chunk and upload the queued files with bounded concurrency.
    #[allow(clippy::too_many_arguments)]
    async fn upload_queue(
        &self,
        ws: &Path,
        branch: &str,
        is_base: bool,
        queue: Vec<String>,
        cache: &Mutex<ClientCache>,
        outcome: &mut ScanOutcome,
        files_total: usize,
        progress: &(impl Fn(ScanProgress) + Send + Sync),
    ) -> Result<()> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_files));
        let mut join = JoinSet::new();

        for path in queue {
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|e| Error::internal(format!("semaphore closed: {e}")))?;

            let remote = Arc::clone(&self.remote);
            let config = self.config.clone();
            let ws = ws.to_path_buf();
            let branch = branch.to_string();

            join.spawn(async move {
                let _permit = permit;
                index_one_file(&config, remote.as_ref(), &ws, &path, &branch, is_base).await
            });
        }

        let mut mutations = 0usize;

        while let Some(joined) = join.join_next().await {
            let result = match joined {
                Ok(result) => result,
                Err(err) => {
                    outcome.errors.push(format!("pipeline task failed: {err}"));
                    outcome.files_processed += 1;
                    continue;
                }
            };

            match result {
                Ok(upload) => {
                    {
                        let mut guard = cache.lock();
                        guard.update_entry(&upload.path, &upload.hash, upload.chunk_count);
                    }
                    mutations += 1;
                    if mutations % FLUSH_EVERY == 0 {
                        self.flush(ws, cache);
                    }

                    outcome.files_processed += 1;
                    outcome.chunks_indexed += upload.chunk_count;
                    progress(ScanProgress {
                        files_done: outcome.files_processed,
                        files_total,
                        chunks_indexed: outcome.chunks_indexed,
                    });
                }
                Err(failure) => {
                    outcome
                        .errors
                        .push(format!("{}: {}", failure.path, failure.error));
                    outcome.files_processed += 1;

                    // Exhausted transport retries abort the pass; the
                    // service is unreachable and every further upload would
                    // fail the same way.
                    if matches!(
                        failure.error,
                        Error::Remote(RemoteError::Transport { .. })
                    ) {
                        join.abort_all();
                        self.flush(ws, cache);
                        return Err(failure.error);
                    }
                }
            }
        }

        Ok(())
    }

    fn flush(&self, ws: &Path, cache: &Mutex<ClientCache>) {
        let snapshot = cache.lock().clone();
        self.store.save(ws, &snapshot);
    }
}

/// Successful per-file pipeline result.
struct FileUpload {
    path: String,
    hash: String,
    chunk_count: usize,
}

/// Read, hash, chunk, and upload one file.
async fn index_one_file(
    config: &Config,
    remote: &dyn RemoteIndex,
    ws: &Path,
    path: &str,
    branch: &str,
    is_base: bool,
) -> std::result::Result<FileUpload, FileFailure> {
    let fail = |error: Error| FileFailure {
        path: path.to_string(),
        error,
    };

    let abs = ws.join(path);
    let bytes = tokio::fs::read(&abs).await.map_err(|e| fail(e.into()))?;
    let hash = identity::file_hash(&bytes);
    let content = String::from_utf8_lossy(&bytes);

    let chunks = build_chunks(
        path,
        &content,
        &config.organization_id,
        &config.project_id,
        branch,
        is_base,
        config.chunking,
    );

    let chunk_count = chunks.len();
    let batch_size = config.batch_size.min(UPSERT_BATCH_SIZE);

    for batch in chunks.chunks(batch_size) {
        upsert_with_retry(remote, batch.to_vec())
            .await
            .map_err(fail)?;
    }

    tracing::debug!(path, chunks = chunk_count, "Uploaded file");

    Ok(FileUpload {
        path: path.to_string(),
        hash,
        chunk_count,
    })
}

/// Upsert one batch, retrying transient failures with jittered backoff.
pub(crate) async fn upsert_with_retry(remote: &dyn RemoteIndex, chunks: Vec<Chunk>) -> Result<()> {
    let mut delay = UPSERT_BACKOFF_BASE;
    let mut attempt = 0;

    loop {
        attempt += 1;
        match remote.upsert(chunks.clone()).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < UPSERT_ATTEMPTS && err.is_retryable() => {
                tracing::warn!(attempt, error = %err, "Upsert failed, backing off");
                let jitter = 0.8 + 0.4 * rand::random::<f64>();
                tokio::time::sleep(delay.mul_f64(jitter)).await;
                delay *= 2;
            }
            Err(err) => return Err(err),
        }
    }
}
