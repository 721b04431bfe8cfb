//! Local indexing: chunking, identity, the client cache, and the
//! reconciliation scanner.

pub mod cache;
mod chunker;
mod filter;
pub mod identity;
pub(crate) mod scanner;

pub use cache::{CacheStore, ClientCache, FileEntry};
pub use chunker::{ChunkSpan, Chunker};
pub use filter::{is_supported, EventFilter, SUPPORTED_EXTENSIONS};
pub use scanner::{ScanOutcome, ScanProgress, Scanner};

use crate::config::ChunkingConfig;
use crate::remote::Chunk;

/// Chunk a file's content into uploadable [`Chunk`]s.
///
/// Combines the line chunker with branch-scoped identity derivation; the
/// resulting chunks are ready for the wire.
#[must_use]
pub fn build_chunks(
    file_path: &str,
    content: &str,
    organization_id: &str,
    project_id: &str,
    branch: &str,
    is_base_branch: bool,
    chunking: ChunkingConfig,
) -> Vec<Chunk> {
    Chunker::new(chunking)
        .split(content)
        .into_iter()
        .map(|span| {
            let chunk_hash = identity::chunk_hash(file_path, span.start_line, span.end_line);
            let id = identity::chunk_id(&chunk_hash, branch, organization_id);
            Chunk {
                id,
                organization_id: organization_id.to_string(),
                project_id: project_id.to_string(),
                file_path: file_path.to_string(),
                code_chunk: span.text,
                start_line: span.start_line,
                end_line: span.end_line,
                chunk_hash,
                git_branch: branch.to_string(),
                is_base_branch,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content(lines: usize) -> String {
        (0..lines)
            .map(|i| format!("const padding_{i} = 'some reasonably long line body';"))
            .collect::<Vec<_>>()
            .join("\n")
    }

    #[test]
    fn test_build_chunks_identity_is_stable() {
        let content = content(40);
        let first = build_chunks(
            "src/a.ts",
            &content,
            "org",
            "proj",
            "main",
            true,
            ChunkingConfig::default(),
        );
        let second = build_chunks(
            "src/a.ts",
            &content,
            "org",
            "proj",
            "main",
            true,
            ChunkingConfig::default(),
        );

        assert!(!first.is_empty());
        let first_ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
        let second_ids: Vec<&str> = second.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(first_ids, second_ids);
    }

    #[test]
    fn test_build_chunks_branch_changes_ids() {
        let content = content(40);
        let main = build_chunks(
            "src/a.ts",
            &content,
            "org",
            "proj",
            "main",
            true,
            ChunkingConfig::default(),
        );
        let feature = build_chunks(
            "src/a.ts",
            &content,
            "org",
            "proj",
            "feature/x",
            false,
            ChunkingConfig::default(),
        );

        assert_eq!(main.len(), feature.len());
        for (a, b) in main.iter().zip(feature.iter()) {
            // Same location hash, different branch-scoped id.
            assert_eq!(a.chunk_hash, b.chunk_hash);
            assert_ne!(a.id, b.id);
        }
        assert!(main[0].is_base_branch);
        assert!(!feature[0].is_base_branch);
    }

    #[test]
    fn test_build_chunks_carries_exact_lines() {
        let content = content(60);
        let lines: Vec<&str> = content.split('\n').collect();
        let chunks = build_chunks(
            "src/a.ts",
            &content,
            "org",
            "proj",
            "main",
            true,
            ChunkingConfig::default(),
        );

        for chunk in &chunks {
            assert_eq!(
                chunk.code_chunk,
                lines[chunk.start_line - 1..chunk.end_line].join("\n")
            );
        }
    }

    #[test]
    fn test_build_chunks_empty_for_tiny_file() {
        let chunks = build_chunks(
            "src/tiny.ts",
            "export {};",
            "org",
            "proj",
            "main",
            true,
            ChunkingConfig::default(),
        );
        assert!(chunks.is_empty());
    }
}
