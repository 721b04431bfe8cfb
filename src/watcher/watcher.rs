//! Debounced workspace watcher using notify-rs.

use std::path::Path;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use tokio::sync::mpsc;

use super::events::{EventBatch, FileEvent};
use crate::error::WatcherError;
use crate::index::EventFilter;
use crate::Result;

/// Debounced filesystem watcher over one workspace.
///
/// Events within one debounce window collapse into a single [`EventBatch`].
/// Dropping the watcher cancels the pending window and unsubscribes.
pub struct WorkspaceWatcher {
    _debouncer: Debouncer<RecommendedWatcher>,
    event_rx: mpsc::Receiver<EventBatch>,
}

impl WorkspaceWatcher {
    /// Watch `workspace` recursively.
    ///
    /// Events are filtered through `filter` before batching; a path that no
    /// longer exists when the window closes is treated as a deletion.
    ///
    /// # Errors
    ///
    /// Returns an error if the watcher cannot be created or the workspace
    /// cannot be subscribed.
    pub fn new(workspace: &Path, filter: EventFilter, debounce: Duration) -> Result<Self> {
        let (batch_tx, event_rx) = mpsc::channel(100);

        let mut debouncer = new_debouncer(
            debounce,
            move |result: std::result::Result<
                Vec<notify_debouncer_mini::DebouncedEvent>,
                notify::Error,
            >| {
                match result {
                    Ok(events) => {
                        let mut batch = EventBatch::new();
                        for event in events {
                            if !matches!(event.kind, DebouncedEventKind::Any) {
                                continue;
                            }
                            if !filter.accepts(&event.path) {
                                continue;
                            }

                            if event.path.exists() {
                                if event.path.is_file() {
                                    batch.add(FileEvent::Modified(event.path));
                                }
                            } else {
                                batch.add(FileEvent::Deleted(event.path));
                            }
                        }

                        if !batch.is_empty() && batch_tx.blocking_send(batch).is_err() {
                            tracing::debug!("Watcher consumer gone, dropping batch");
                        }
                    }
                    Err(e) => {
                        tracing::error!("Watch error: {:?}", e);
                    }
                }
            },
        )
        .map_err(|e| WatcherError::WatchFailed {
            path: workspace.display().to_string(),
            reason: e.to_string(),
        })?;

        debouncer
            .watcher()
            .watch(workspace, RecursiveMode::Recursive)
            .map_err(|e| WatcherError::WatchFailed {
                path: workspace.display().to_string(),
                reason: e.to_string(),
            })?;

        tracing::info!(path = %workspace.display(), "Watching workspace");

        Ok(Self {
            _debouncer: debouncer,
            event_rx,
        })
    }

    /// Receive the next batch of events.
    ///
    /// Returns `None` if the watcher has been dropped.
    pub async fn recv(&mut self) -> Option<EventBatch> {
        self.event_rx.recv().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;
    use tokio::time::timeout;

    const TEST_DEBOUNCE: Duration = Duration::from_millis(100);

    #[tokio::test]
    async fn test_watcher_nonexistent_dir_fails() {
        let tmp = TempDir::new().unwrap();
        let filter = EventFilter::new(tmp.path(), None);
        let result = WorkspaceWatcher::new(Path::new("/nonexistent/ws"), filter, TEST_DEBOUNCE);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_debounced_events_arrive_as_one_batch() {
        let tmp = TempDir::new().unwrap();
        let filter = EventFilter::new(tmp.path(), None);
        let mut watcher = WorkspaceWatcher::new(tmp.path(), filter, TEST_DEBOUNCE).unwrap();

        // Several quick writes to one file inside the debounce window.
        let target = tmp.path().join("a.ts");
        fs::write(&target, "const a = 1;").unwrap();
        fs::write(&target, "const a = 2;").unwrap();
        fs::write(&target, "const a = 3;").unwrap();

        let batch = timeout(Duration::from_secs(5), watcher.recv())
            .await
            .expect("timed out waiting for batch")
            .expect("watcher closed");

        assert_eq!(batch.modified, vec![target]);
        assert!(batch.deleted.is_empty());
    }

    #[tokio::test]
    async fn test_unsupported_extensions_filtered_out() {
        let tmp = TempDir::new().unwrap();
        let filter = EventFilter::new(tmp.path(), None);
        let mut watcher = WorkspaceWatcher::new(tmp.path(), filter, TEST_DEBOUNCE).unwrap();

        fs::write(tmp.path().join("photo.png"), [0u8; 16]).unwrap();
        fs::write(tmp.path().join("b.ts"), "const b = 1;").unwrap();

        let batch = timeout(Duration::from_secs(5), watcher.recv())
            .await
            .expect("timed out waiting for batch")
            .expect("watcher closed");

        assert_eq!(batch.modified, vec![tmp.path().join("b.ts")]);
    }

    #[tokio::test]
    async fn test_deleted_file_classified_as_delete() {
        let tmp = TempDir::new().unwrap();
        let target = tmp.path().join("gone.ts");
        fs::write(&target, "const x = 1;").unwrap();

        let filter = EventFilter::new(tmp.path(), None);
        let mut watcher = WorkspaceWatcher::new(tmp.path(), filter, TEST_DEBOUNCE).unwrap();

        fs::remove_file(&target).unwrap();

        let batch = timeout(Duration::from_secs(5), watcher.recv())
            .await
            .expect("timed out waiting for batch")
            .expect("watcher closed");

        assert_eq!(batch.deleted, vec![target]);
        assert!(batch.modified.is_empty());
    }
}
