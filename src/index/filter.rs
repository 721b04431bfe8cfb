//! Candidate-file filtering.
//!
//! The allow-list mirrors the host's syntax-targeting extension set; anything
//! not on it (binaries, archives, vendored lockfiles) is never indexed. The
//! watcher additionally consults the workspace `.gitignore` so build output
//! and editor droppings don't trigger uploads.

use std::path::Path;

use ignore::gitignore::{Gitignore, GitignoreBuilder};

/// Extensions the index accepts.
///
/// Host-provided constant; well-known binary and vendored extensions are
/// deliberately absent.
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "ts", "tsx", "js", "jsx", "mjs", "cjs", "py", "rs", "go", "java", "c", "cpp", "cc", "h",
    "hpp", "cs", "rb", "php", "swift", "kt", "scala", "sh", "bash", "zsh", "sql", "md", "yaml",
    "yml", "json", "toml", "xml", "html", "css", "scss", "vue", "svelte",
];

/// Whether `path` has a supported extension.
#[must_use]
pub fn is_supported(path: &Path, extensions: Option<&[String]>) -> bool {
    let Some(ext) = path.extension().and_then(|e| e.to_str()) else {
        return false;
    };
    let ext = ext.to_lowercase();

    match extensions {
        Some(custom) => custom.iter().any(|e| *e == ext),
        None => SUPPORTED_EXTENSIONS.contains(&ext.as_str()),
    }
}

/// Filter for watcher events.
#[derive(Debug)]
pub struct EventFilter {
    gitignore: Option<Gitignore>,
    extensions: Option<Vec<String>>,
}

impl EventFilter {
    /// Create a filter for a workspace.
    ///
    /// If a `.gitignore` exists at the workspace root it is honored; a
    /// malformed one degrades to extension filtering only.
    #[must_use]
    pub fn new(workspace: &Path, extensions: Option<Vec<String>>) -> Self {
        let gitignore_path = workspace.join(".gitignore");

        let gitignore = if gitignore_path.exists() {
            let mut builder = GitignoreBuilder::new(workspace);
            if builder.add(&gitignore_path).is_none() {
                builder.build().ok()
            } else {
                None
            }
        } else {
            None
        };

        Self {
            gitignore,
            extensions,
        }
    }

    /// Whether an event for `path` should be processed.
    #[must_use]
    pub fn accepts(&self, path: &Path) -> bool {
        if !is_supported(path, self.extensions.as_deref()) {
            return false;
        }

        if let Some(ref gi) = self.gitignore {
            if gi.matched_path_or_any_parents(path, false).is_ignore() {
                return false;
            }
        }

        true
    }
}
