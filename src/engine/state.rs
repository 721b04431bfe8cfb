//! Indexer lifecycle state.

use serde::Serialize;

/// Discrete engine status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexerStatus {
    /// Nothing running; the index may or may not be populated.
    Idle,
    /// Initial reconcile pass in progress.
    Scanning,
    /// Scan complete; watching the filesystem for changes.
    Watching,
    /// A failure stopped the engine; re-enterable.
    Error,
}

/// State event emitted to the host on every user-visible transition.
#[derive(Debug, Clone, Serialize)]
pub struct StateEvent {
    pub status: IndexerStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_branch: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_files: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_chunks: Option<usize>,
    /// Milliseconds since the epoch of the newest upload.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_sync_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl StateEvent {
    /// Bare event with no branch or totals attached.
    fn bare(status: IndexerStatus, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            git_branch: None,
            total_files: None,
            total_chunks: None,
            last_sync_ms: None,
            error: None,
        }
    }

    /// Idle event.
    #[must_use]
    pub fn idle(message: impl Into<String>) -> Self {
        Self::bare(IndexerStatus::Idle, message)
    }

    /// Scanning progress event.
    #[must_use]
    pub fn scanning(message: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            git_branch: Some(branch.into()),
            ..Self::bare(IndexerStatus::Scanning, message)
        }
    }

    /// Watching event carrying index totals.
    #[must_use]
    pub fn watching(
        message: impl Into<String>,
        branch: impl Into<String>,
        total_files: usize,
        total_chunks: usize,
        last_sync_ms: Option<u64>,
    ) -> Self {
        Self {
            git_branch: Some(branch.into()),
            total_files: Some(total_files),
            total_chunks: Some(total_chunks),
            last_sync_ms,
            ..Self::bare(IndexerStatus::Watching, message)
        }
    }

    /// Error event. `message` is user-readable; `error` carries the cause.
    #[must_use]
    pub fn error(message: impl Into<String>, error: impl Into<String>) -> Self {
        Self {
            error: Some(error.into()),
            ..Self::bare(IndexerStatus::Error, message)
        }
    }

    /// Attach a branch.
    #[must_use]
    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.git_branch = Some(branch.into());
        self
    }

    /// Attach totals.
    #[must_use]
    pub fn with_totals(
        mut self,
        total_files: usize,
        total_chunks: usize,
        last_sync_ms: Option<u64>,
    ) -> Self {
        self.total_files = Some(total_files);
        self.total_chunks = Some(total_chunks);
        self.last_sync_ms = last_sync_ms;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&IndexerStatus::Scanning).unwrap();
        assert_eq!(json, "\"scanning\"");
    }

    #[test]
    fn test_event_omits_absent_fields() {
        let event = StateEvent::idle("no files indexed");
        let json = serde_json::to_value(&event).unwrap();

        assert_eq!(json["status"], "idle");
        assert_eq!(json["message"], "no files indexed");
        assert!(json.get("git_branch").is_none());
        assert!(json.get("error").is_none());
    }

    #[test]
    fn test_watching_event_carries_totals() {
        let event = StateEvent::watching("watching", "main", 3, 12, Some(1_700_000_000_000));
        assert_eq!(event.status, IndexerStatus::Watching);
        assert_eq!(event.total_files, Some(3));
        assert_eq!(event.total_chunks, Some(12));
        assert_eq!(event.git_branch.as_deref(), Some("main"));
    }

    #[test]
    fn test_error_event() {
        let event = StateEvent::error("Indexing failed", "a.ts: read failed");
        assert_eq!(event.status, IndexerStatus::Error);
        assert_eq!(event.error.as_deref(), Some("a.ts: read failed"));
    }
}
