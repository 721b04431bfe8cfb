//! In-memory [`RemoteIndex`] for tests.
//!
//! Stores upserted chunks, records every call, and serves a canned manifest
//! and canned search results. Failure injection covers the retry paths.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::RemoteError;
use crate::Result;

use super::types::{
    Chunk, DeleteBranchRequest, DeleteFilesRequest, DeleteProjectRequest, ManifestQuery,
    SearchRequest, SearchResult, ServerManifest,
};
use super::RemoteIndex;

/// Recording in-memory remote index.
#[derive(Default)]
pub struct MockRemoteIndex {
    /// Uploaded chunks keyed by chunk id.
    chunks: Mutex<BTreeMap<String, Chunk>>,
    /// `(branch, file_path)` pairs deleted via `delete_files`, in call order.
    deleted: Mutex<Vec<(String, String)>>,
    /// Manifest served to `manifest` calls. `None` behaves like HTTP 404.
    manifest: Mutex<Option<ServerManifest>>,
    /// Canned search hits.
    results: Mutex<Vec<SearchResult>>,
    /// Captured search requests.
    searches: Mutex<Vec<SearchRequest>>,
    upsert_calls: AtomicUsize,
    delete_file_calls: AtomicUsize,
    delete_branch_calls: AtomicUsize,
    delete_project_calls: AtomicUsize,
    /// Upsert calls that fail with a transport error before succeeding.
    fail_upserts: AtomicUsize,
}

impl MockRemoteIndex {
    /// Fresh mock with no manifest and no canned results.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve this manifest to subsequent `manifest` calls.
    pub fn set_manifest(&self, manifest: ServerManifest) {
        *self.manifest.lock() = Some(manifest);
    }

    /// Serve these hits to subsequent `search` calls.
    pub fn set_results(&self, results: Vec<SearchResult>) {
        *self.results.lock() = results;
    }

    /// Make the next `n` upsert calls fail with a transport error.
    pub fn fail_next_upserts(&self, n: usize) {
        self.fail_upserts.store(n, Ordering::SeqCst);
    }

    /// All stored chunks.
    #[must_use]
    pub fn chunks(&self) -> Vec<Chunk> {
        self.chunks.lock().values().cloned().collect()
    }

    /// Stored chunks for one file on one branch.
    #[must_use]
    pub fn chunks_for(&self, branch: &str, file_path: &str) -> Vec<Chunk> {
        self.chunks
            .lock()
            .values()
            .filter(|c| c.git_branch == branch && c.file_path == file_path)
            .cloned()
            .collect()
    }

    /// `(branch, file_path)` deletions in call order.
    #[must_use]
    pub fn deleted(&self) -> Vec<(String, String)> {
        self.deleted.lock().clone()
    }

    /// Captured search requests.
    #[must_use]
    pub fn searches(&self) -> Vec<SearchRequest> {
        self.searches.lock().clone()
    }

    #[must_use]
    pub fn upsert_calls(&self) -> usize {
        self.upsert_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn delete_file_calls(&self) -> usize {
        self.delete_file_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn delete_branch_calls(&self) -> usize {
        self.delete_branch_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn delete_project_calls(&self) -> usize {
        self.delete_project_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RemoteIndex for MockRemoteIndex {
    async fn upsert(&self, chunks: Vec<Chunk>) -> Result<()> {
        self.upsert_calls.fetch_add(1, Ordering::SeqCst);

        let remaining = self.fail_upserts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.fail_upserts.store(remaining - 1, Ordering::SeqCst);
            return Err(RemoteError::transport("injected failure").into());
        }

        let mut store = self.chunks.lock();
        for chunk in chunks {
            store.insert(chunk.id.clone(), chunk);
        }
        Ok(())
    }

    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>> {
        self.searches.lock().push(request);
        Ok(self.results.lock().clone())
    }

    async fn delete_files(&self, request: DeleteFilesRequest) -> Result<()> {
        self.delete_file_calls.fetch_add(1, Ordering::SeqCst);

        let mut deleted = self.deleted.lock();
        for path in &request.file_paths {
            deleted.push((request.git_branch.clone(), path.clone()));
        }

        self.chunks.lock().retain(|_, chunk| {
            !(chunk.git_branch == request.git_branch
                && request.file_paths.contains(&chunk.file_path))
        });
        Ok(())
    }

    async fn delete_branch(&self, request: DeleteBranchRequest) -> Result<()> {
        self.delete_branch_calls.fetch_add(1, Ordering::SeqCst);
        self.chunks
            .lock()
            .retain(|_, chunk| chunk.git_branch != request.git_branch);
        Ok(())
    }

    async fn delete_project(&self, _request: DeleteProjectRequest) -> Result<()> {
        self.delete_project_calls.fetch_add(1, Ordering::SeqCst);
        self.chunks.lock().clear();
        Ok(())
    }

    async fn manifest(&self, _query: ManifestQuery) -> Result<Option<ServerManifest>> {
        Ok(self.manifest.lock().clone())
    }
}
