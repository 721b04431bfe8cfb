//! Typed client for the remote codebase-indexing service.
//!
//! [`RemoteIndex`] is the seam between the engine and the wire: production
//! code talks HTTPS through [`HttpRemoteIndex`], tests swap in the in-memory
//! [`mock::MockRemoteIndex`]. The client is stateless and shareable.

mod http;
pub mod mock;
mod types;

use std::sync::Arc;

use async_trait::async_trait;

use crate::Result;

pub use http::{derive_base_url, HttpRemoteIndex};
pub use types::{
    Chunk, DeleteBranchRequest, DeleteFilesRequest, DeleteProjectRequest, ManifestFile,
    ManifestQuery, SearchRequest, SearchResult, ServerManifest, UpsertRequest,
};

/// Maximum chunks per upsert request; the service rejects larger batches.
pub const UPSERT_BATCH_SIZE: usize = 60;

/// Operations the remote index service exposes.
#[async_trait]
pub trait RemoteIndex: Send + Sync {
    /// Insert or replace chunks. Callers keep batches within
    /// [`UPSERT_BATCH_SIZE`].
    async fn upsert(&self, chunks: Vec<Chunk>) -> Result<()>;

    /// Branch-preference semantic search.
    async fn search(&self, request: SearchRequest) -> Result<Vec<SearchResult>>;

    /// Remove all chunks of the named files on one branch.
    async fn delete_files(&self, request: DeleteFilesRequest) -> Result<()>;

    /// Remove a branch's entire index.
    async fn delete_branch(&self, request: DeleteBranchRequest) -> Result<()>;

    /// Remove a project's entire index.
    async fn delete_project(&self, request: DeleteProjectRequest) -> Result<()>;

    /// Fetch the branch manifest. `None` means the branch has no chunks.
    async fn manifest(&self, query: ManifestQuery) -> Result<Option<ServerManifest>>;
}

/// Shared handle to any remote index implementation.
pub type SharedRemoteIndex = Arc<dyn RemoteIndex>;
