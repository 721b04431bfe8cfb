//! Hashing and chunk identity.
//!
//! File identity is the SHA-256 of the raw bytes. Chunk identity hashes the
//! file path and line range, deliberately not the content: a chunk that moves
//! to a different range is a new chunk, while an unchanged range keeps its id
//! across uploads. Branch is folded into the final id so the same range on
//! two branches never collides.

use sha2::{Digest, Sha256};
use uuid::Uuid;

/// SHA-256 of file bytes, lowercase hex.
#[must_use]
pub fn file_hash(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

/// SHA-256 over an arbitrary string, lowercase hex.
#[must_use]
pub fn sha256_hex(input: &str) -> String {
    file_hash(input.as_bytes())
}

/// Location hash of a chunk: `sha256("{file_path}-{start}-{end}")`.
#[must_use]
pub fn chunk_hash(file_path: &str, start_line: usize, end_line: usize) -> String {
    sha256_hex(&format!("{file_path}-{start_line}-{end_line}"))
}

/// Branch-scoped chunk id.
///
/// UUIDv5 in the organization's namespace over
/// `sha256("{chunk_hash}-{branch}")`; the branch re-hash guarantees distinct
/// ids for the same range on different branches.
#[must_use]
pub fn chunk_id(chunk_hash: &str, branch: &str, organization_id: &str) -> String {
    let namespace = org_namespace(organization_id);
    let name = sha256_hex(&format!("{chunk_hash}-{branch}"));
    Uuid::new_v5(&namespace, name.as_bytes()).to_string()
}

/// Namespace UUID for an organization.
///
/// Organization ids that are themselves UUIDs are used directly; anything
/// else is folded into the URL namespace first.
fn org_namespace(organization_id: &str) -> Uuid {
    Uuid::parse_str(organization_id)
        .unwrap_or_else(|_| Uuid::new_v5(&Uuid::NAMESPACE_URL, organization_id.as_bytes()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_hash_is_sha256_hex() {
        let hash = file_hash(b"hello");
        assert_eq!(hash.len(), 64);
        assert_eq!(
            hash,
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }

    #[test]
    fn test_file_hash_deterministic() {
        assert_eq!(file_hash(b"abc"), file_hash(b"abc"));
        assert_ne!(file_hash(b"abc"), file_hash(b"abd"));
    }

    #[test]
    fn test_chunk_hash_ignores_content() {
        // Only path and range participate.
        let a = chunk_hash("src/lib.rs", 1, 40);
        let b = chunk_hash("src/lib.rs", 1, 40);
        let c = chunk_hash("src/lib.rs", 2, 40);
        let d = chunk_hash("src/main.rs", 1, 40);

        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, d);
    }

    #[test]
    fn test_chunk_id_stable_per_branch() {
        let hash = chunk_hash("src/lib.rs", 1, 40);
        let org = "9f2c1a34-7d34-4c1b-9a61-2f4bdfd3f111";

        let id1 = chunk_id(&hash, "main", org);
        let id2 = chunk_id(&hash, "main", org);
        assert_eq!(id1, id2);
    }

    #[test]
    fn test_chunk_id_differs_across_branches() {
        let hash = chunk_hash("src/lib.rs", 1, 40);
        let org = "9f2c1a34-7d34-4c1b-9a61-2f4bdfd3f111";

        let main = chunk_id(&hash, "main", org);
        let feature = chunk_id(&hash, "feature/x", org);
        assert_ne!(main, feature);
    }

    #[test]
    fn test_chunk_id_differs_across_orgs() {
        let hash = chunk_hash("src/lib.rs", 1, 40);

        let a = chunk_id(&hash, "main", "org-a");
        let b = chunk_id(&hash, "main", "org-b");
        assert_ne!(a, b);
    }

    #[test]
    fn test_non_uuid_org_still_yields_valid_id() {
        let hash = chunk_hash("src/lib.rs", 1, 40);
        let id = chunk_id(&hash, "main", "acme-inc");
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
