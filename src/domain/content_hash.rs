//! Content hashing for a file record (spec §3: `content_hash`).
//!
//! Used only for idempotence of re-enrichment — the AI-metadata extractor
//! decides whether to redo work for a file whose content hasn't changed.
//! The FSM never reads or branches on this value.

use std::path::Path;
use thiserror::Error;

/// Current hash format version, prefixed onto every digest so a future
/// change to the hashing scheme doesn't collide with old values.
pub const CURRENT_HASH_VERSION: u8 = 1;

pub struct ContentHashGenerator;

impl ContentHashGenerator {
    /// Hash a file's full contents with BLAKE3.
    pub async fn generate_content_hash(path: &Path) -> Result<String, ContentHashError> {
        let bytes = tokio::fs::read(path).await?;
        Ok(Self::generate_from_content(&bytes))
    }

    /// Hash in-memory bytes directly (used by tests and small-buffer callers).
    pub fn generate_from_content(content: &[u8]) -> String {
        let hash = blake3::hash(content);
        format!("v{}:{}", CURRENT_HASH_VERSION, hash.to_hex())
    }

    /// Check whether a file's current on-disk content still matches a
    /// previously recorded hash.
    pub async fn verify_content_hash(
        path: &Path,
        expected_hash: &str,
    ) -> Result<bool, ContentHashError> {
        let current = Self::generate_content_hash(path).await?;
        Ok(current == expected_hash)
    }
}

#[derive(Debug, Error)]
pub enum ContentHashError {
    #[error("io error hashing file: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_content_hashes_identically() {
        let a = ContentHashGenerator::generate_from_content(b"hello world");
        let b = ContentHashGenerator::generate_from_content(b"hello world");
        assert_eq!(a, b);
    }

    #[test]
    fn different_content_hashes_differently() {
        let a = ContentHashGenerator::generate_from_content(b"hello world");
        let b = ContentHashGenerator::generate_from_content(b"goodbye world");
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn verify_content_hash_detects_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("doc.txt");
        tokio::fs::write(&path, b"version one").await.unwrap();
        let hash = ContentHashGenerator::generate_content_hash(&path)
            .await
            .unwrap();
        assert!(ContentHashGenerator::verify_content_hash(&path, &hash)
            .await
            .unwrap());

        tokio::fs::write(&path, b"version two").await.unwrap();
        assert!(!ContentHashGenerator::verify_content_hash(&path, &hash)
            .await
            .unwrap());
    }
}
