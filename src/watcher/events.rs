//! File system event types and batching.

use std::path::PathBuf;

/// File system event types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileEvent {
    /// File was created or modified.
    Modified(PathBuf),
    /// File was deleted.
    Deleted(PathBuf),
}

impl FileEvent {
    /// The path this event concerns.
    #[must_use]
    pub fn path(&self) -> &PathBuf {
        match self {
            Self::Modified(p) | Self::Deleted(p) => p,
        }
    }
}

/// Batch of file events accumulated during one debounce window.
///
/// The latest event per path wins: a delete supersedes a pending modify and
/// a modify clears a pending delete (the file reappeared).
#[derive(Debug, Default)]
pub struct EventBatch {
    /// Files needing re-upload.
    pub modified: Vec<PathBuf>,
    /// Files needing removal from the index.
    pub deleted: Vec<PathBuf>,
}

impl EventBatch {
    /// Create a new empty batch.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event to the batch.
    pub fn add(&mut self, event: FileEvent) {
        match event {
            FileEvent::Modified(path) => {
                self.deleted.retain(|p| p != &path);
                if !self.modified.contains(&path) {
                    self.modified.push(path);
                }
            }
            FileEvent::Deleted(path) => {
                self.modified.retain(|p| p != &path);
                if !self.deleted.contains(&path) {
                    self.deleted.push(path);
                }
            }
        }
    }

    /// Check if batch is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modified.is_empty() && self.deleted.is_empty()
    }

    /// Total number of batched events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modified.len() + self.deleted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_path() {
        let modified = FileEvent::Modified(PathBuf::from("/ws/file.ts"));
        assert_eq!(modified.path(), &PathBuf::from("/ws/file.ts"));

        let deleted = FileEvent::Deleted(PathBuf::from("/ws/removed.ts"));
        assert_eq!(deleted.path(), &PathBuf::from("/ws/removed.ts"));
    }

    #[test]
    fn test_modified_deduplicates() {
        let mut batch = EventBatch::new();
        batch.add(FileEvent::Modified(PathBuf::from("/a.ts")));
        batch.add(FileEvent::Modified(PathBuf::from("/b.ts")));
        batch.add(FileEvent::Modified(PathBuf::from("/a.ts")));

        assert_eq!(batch.modified.len(), 2);
        assert!(batch.deleted.is_empty());
    }

    #[test]
    fn test_delete_supersedes_modify() {
        let mut batch = EventBatch::new();
        batch.add(FileEvent::Modified(PathBuf::from("/a.ts")));
        batch.add(FileEvent::Deleted(PathBuf::from("/a.ts")));

        assert!(batch.modified.is_empty());
        assert_eq!(batch.deleted, vec![PathBuf::from("/a.ts")]);
    }

    #[test]
    fn test_modify_clears_pending_delete() {
        let mut batch = EventBatch::new();
        batch.add(FileEvent::Deleted(PathBuf::from("/a.ts")));
        batch.add(FileEvent::Modified(PathBuf::from("/a.ts")));

        assert!(batch.deleted.is_empty());
        assert_eq!(batch.modified, vec![PathBuf::from("/a.ts")]);
    }

    #[test]
    fn test_len_and_empty() {
        let mut batch = EventBatch::new();
        assert!(batch.is_empty());
        assert_eq!(batch.len(), 0);

        batch.add(FileEvent::Modified(PathBuf::from("/a.ts")));
        batch.add(FileEvent::Deleted(PathBuf::from("/b.ts")));

        assert!(!batch.is_empty());
        assert_eq!(batch.len(), 2);
    }
}
