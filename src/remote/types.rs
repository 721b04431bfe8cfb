//! Wire types for the codebase-indexing service.
//!
//! All payloads are camelCase JSON over HTTPS with bearer auth.

use serde::{Deserialize, Serialize};

/// An uploadable chunk: one contiguous line range of one file plus the
/// metadata the service needs to place it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Chunk {
    /// Branch-scoped UUIDv5 identity.
    pub id: String,
    pub organization_id: String,
    pub project_id: String,
    /// Workspace-relative path, forward-slash separated.
    pub file_path: String,
    /// The source lines `[start_line, end_line]` joined by `\n`.
    pub code_chunk: String,
    /// 1-based.
    pub start_line: usize,
    /// 1-based, inclusive.
    pub end_line: usize,
    /// Location hash over `(file_path, start_line, end_line)`.
    pub chunk_hash: String,
    pub git_branch: String,
    pub is_base_branch: bool,
}

/// `PUT /api/codebase-indexing/upsert` body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpsertRequest {
    pub chunks: Vec<Chunk>,
}

/// `POST /api/codebase-indexing/search` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub query: String,
    pub organization_id: String,
    pub project_id: String,
    /// Branch whose chunks win when both branches hold the file.
    pub prefer_branch: String,
    /// Branch consulted for files absent from the preferred branch.
    pub fallback_branch: String,
    /// Files deleted locally; the service masks fallback hits for them.
    pub exclude_files: Vec<String>,
    /// Optional path prefix filter.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

/// One search hit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SearchResult {
    pub id: String,
    pub file_path: String,
    pub start_line: usize,
    pub end_line: usize,
    pub score: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from_preferred_branch: Option<bool>,
}

/// `DELETE /api/codebase-indexing/files` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteFilesRequest {
    pub organization_id: String,
    pub project_id: String,
    pub git_branch: String,
    pub file_paths: Vec<String>,
}

/// `DELETE /api/codebase-indexing/branch` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteBranchRequest {
    pub organization_id: String,
    pub project_id: String,
    pub git_branch: String,
}

/// `DELETE /api/codebase-indexing/project` body.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DeleteProjectRequest {
    pub organization_id: String,
    pub project_id: String,
}

/// Identifies a branch's manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManifestQuery {
    pub organization_id: String,
    pub project_id: String,
    pub git_branch: String,
}

/// One file's entry in the server manifest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManifestFile {
    pub file_path: String,
    pub file_hash: String,
    pub chunk_count: usize,
    /// Milliseconds since the epoch.
    pub last_indexed: u64,
}

/// Server-side snapshot of what is indexed for one branch.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ServerManifest {
    #[serde(default)]
    pub files: Vec<ManifestFile>,
    #[serde(default)]
    pub total_files: usize,
    #[serde(default)]
    pub total_chunks: usize,
    #[serde(default)]
    pub last_updated: u64,
}

impl ServerManifest {
    /// Look up a file's manifest entry.
    #[must_use]
    pub fn file(&self, file_path: &str) -> Option<&ManifestFile> {
        self.files.iter().find(|f| f.file_path == file_path)
    }
}
