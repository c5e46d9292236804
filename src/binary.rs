//! Binary content storage and digests
//!
//! Two implementations of the binary service: an in-memory map for tests
//! and the in-memory server profile, and a directory-backed store for
//! persistent deployments. Content identifiers live under the
//! `trellis:binary/` prefix; the file store keys files by the trailing
//! segment.

use crate::rdf::NamedNode;
use crate::services::{BinaryService, ServiceError, ServiceResult};
use crate::vocab::trellis;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use bytes::Bytes;
use md5::Md5;
use sha1::Sha1;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// Digest algorithms recognized on Want-Digest and Digest headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DigestAlgorithm {
    /// md5
    Md5,
    /// sha (SHA-1)
    Sha,
    /// sha-256
    Sha256,
}

impl DigestAlgorithm {
    /// Parse a header token (case-insensitive, q-value stripped)
    pub fn parse(token: &str) -> Option<DigestAlgorithm> {
        let token = token.split(';').next().unwrap_or("").trim();
        match token.to_ascii_lowercase().as_str() {
            "md5" => Some(DigestAlgorithm::Md5),
            "sha" => Some(DigestAlgorithm::Sha),
            "sha-256" => Some(DigestAlgorithm::Sha256),
            _ => None,
        }
    }

    /// The header token for this algorithm
    pub fn token(self) -> &'static str {
        match self {
            DigestAlgorithm::Md5 => "md5",
            DigestAlgorithm::Sha => "sha",
            DigestAlgorithm::Sha256 => "sha-256",
        }
    }

    /// Base64 digest of the content
    pub fn digest_base64(self, content: &[u8]) -> String {
        match self {
            DigestAlgorithm::Md5 => {
                let mut hasher = Md5::new();
                hasher.update(content);
                BASE64.encode(hasher.finalize())
            }
            DigestAlgorithm::Sha => {
                let mut hasher = Sha1::new();
                hasher.update(content);
                BASE64.encode(hasher.finalize())
            }
            DigestAlgorithm::Sha256 => {
                let mut hasher = Sha256::new();
                hasher.update(content);
                BASE64.encode(hasher.finalize())
            }
        }
    }
}

const SUPPORTED_ALGORITHMS: &[DigestAlgorithm] = &[
    DigestAlgorithm::Md5,
    DigestAlgorithm::Sha,
    DigestAlgorithm::Sha256,
];

fn slice_range(content: &Bytes, range: Option<(u64, Option<u64>)>) -> Bytes {
    match range {
        None => content.clone(),
        Some((from, to)) => {
            let len = content.len() as u64;
            let from = from.min(len);
            // Inclusive upper bound, clamped to the content length.
            let to = to.map_or(len, |t| t.saturating_add(1).min(len)).max(from);
            content.slice(from as usize..to as usize)
        }
    }
}

fn allocate_identifier() -> NamedNode {
    NamedNode::new_unchecked(format!("{}{}", trellis::BINARY_PREFIX, Uuid::new_v4().simple()))
}

/// In-memory binary storage.
#[derive(Debug, Default)]
pub struct MemoryBinaryService {
    blobs: RwLock<HashMap<String, Bytes>>,
}

impl MemoryBinaryService {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BinaryService for MemoryBinaryService {
    async fn get_content(
        &self,
        identifier: &NamedNode,
        range: Option<(u64, Option<u64>)>,
    ) -> ServiceResult<Bytes> {
        let blobs = self.blobs.read().await;
        let content = blobs
            .get(identifier.as_str())
            .ok_or_else(|| ServiceError::Persistence(format!("no binary at {}", identifier)))?;
        Ok(slice_range(content, range))
    }

    async fn set_content(&self, identifier: &NamedNode, content: Bytes) -> ServiceResult<()> {
        self.blobs
            .write()
            .await
            .insert(identifier.as_str().to_string(), content);
        Ok(())
    }

    async fn purge(&self, identifier: &NamedNode) -> ServiceResult<()> {
        self.blobs.write().await.remove(identifier.as_str());
        Ok(())
    }

    fn generate_identifier(&self) -> NamedNode {
        allocate_identifier()
    }

    fn supported_algorithms(&self) -> &'static [DigestAlgorithm] {
        SUPPORTED_ALGORITHMS
    }
}

/// Directory-backed binary storage.
pub struct FileBinaryService {
    directory: PathBuf,
}

impl FileBinaryService {
    /// Open a store rooted at a directory, creating it if needed
    pub fn open(directory: impl Into<PathBuf>) -> ServiceResult<Self> {
        let directory = directory.into();
        std::fs::create_dir_all(&directory)?;
        debug!("binary store at {}", directory.display());
        Ok(Self { directory })
    }

    fn path_for(&self, identifier: &NamedNode) -> PathBuf {
        let segment = identifier
            .as_str()
            .strip_prefix(trellis::BINARY_PREFIX)
            .unwrap_or(identifier.as_str())
            .replace(['/', ':'], "_");
        self.directory.join(segment)
    }
}

#[async_trait]
impl BinaryService for FileBinaryService {
    async fn get_content(
        &self,
        identifier: &NamedNode,
        range: Option<(u64, Option<u64>)>,
    ) -> ServiceResult<Bytes> {
        let content = tokio::fs::read(self.path_for(identifier)).await?;
        Ok(slice_range(&Bytes::from(content), range))
    }

    async fn set_content(&self, identifier: &NamedNode, content: Bytes) -> ServiceResult<()> {
        tokio::fs::write(self.path_for(identifier), &content).await?;
        Ok(())
    }

    async fn purge(&self, identifier: &NamedNode) -> ServiceResult<()> {
        match tokio::fs::remove_file(self.path_for(identifier)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn generate_identifier(&self) -> NamedNode {
        allocate_identifier()
    }

    fn supported_algorithms(&self) -> &'static [DigestAlgorithm] {
        SUPPORTED_ALGORITHMS
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_digest_values() {
        // Known digests of "hello".
        assert_eq!(
            DigestAlgorithm::Md5.digest_base64(b"hello"),
            "XUFAKrxLKna5cZ2REBfFkg=="
        );
        assert_eq!(
            DigestAlgorithm::Sha.digest_base64(b"hello"),
            "qvTGHdzF6KLavt4PO0gs2a6pQ00="
        );
    }

    #[test]
    fn test_algorithm_parse() {
        assert_eq!(DigestAlgorithm::parse("MD5"), Some(DigestAlgorithm::Md5));
        assert_eq!(DigestAlgorithm::parse("sha;q=0.5"), Some(DigestAlgorithm::Sha));
        assert_eq!(DigestAlgorithm::parse("sha-256"), Some(DigestAlgorithm::Sha256));
        assert_eq!(DigestAlgorithm::parse("crc32"), None);
    }

    #[tokio::test]
    async fn test_memory_roundtrip_and_range() {
        let service = MemoryBinaryService::new();
        let id = service.generate_identifier();
        service
            .set_content(&id, Bytes::from_static(b"Hello, world"))
            .await
            .unwrap();

        let all = service.get_content(&id, None).await.unwrap();
        assert_eq!(&all[..], b"Hello, world");

        let range = service.get_content(&id, Some((0, Some(4)))).await.unwrap();
        assert_eq!(&range[..], b"Hello");

        let tail = service.get_content(&id, Some((7, None))).await.unwrap();
        assert_eq!(&tail[..], b"world");

        service.purge(&id).await.unwrap();
        assert!(service.get_content(&id, None).await.is_err());
    }

    #[tokio::test]
    async fn test_file_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let service = FileBinaryService::open(dir.path()).unwrap();
        let id = service.generate_identifier();
        service
            .set_content(&id, Bytes::from_static(b"abc"))
            .await
            .unwrap();
        let content = service.get_content(&id, None).await.unwrap();
        assert_eq!(&content[..], b"abc");
        service.purge(&id).await.unwrap();
        // Purging again is a no-op.
        service.purge(&id).await.unwrap();
    }
}
