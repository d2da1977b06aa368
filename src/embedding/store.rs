use crate::ingest::Segment;
use crate::shared::fs_atomic::{atomic_write_file, sha256_hex};
use crate::shared::{EntryId, ErrorCode, ServiceError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("failed to encode embedding store: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("failed to decode embedding store at {path}: {source}")]
    Decode {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to write embedding store {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read embedding store {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        let code = match err {
            StoreError::Read { .. } | StoreError::Decode { .. } => ErrorCode::FileReadError,
            StoreError::Encode(_) | StoreError::Write { .. } => ErrorCode::FileWriteError,
        };
        ServiceError::with_detail(code, err.to_string())
    }
}

/// In-memory vector store, persisted as
/// `{"entries":[{"id","embedding":{"vector"},"embedded":{"text","metadata":{"metadata"}}}]}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingStore {
    pub entries: Vec<StoreEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoreEntry {
    pub id: String,
    pub embedding: StoredEmbedding,
    pub embedded: EmbeddedSegment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredEmbedding {
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddedSegment {
    pub text: String,
    pub metadata: SegmentMetadata,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SegmentMetadata {
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl EmbeddingStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, id: EntryId, vector: Vec<f32>, segment: &Segment) {
        self.entries.push(StoreEntry {
            id: id.as_str().to_string(),
            embedding: StoredEmbedding { vector },
            embedded: EmbeddedSegment {
                text: segment.text.clone(),
                metadata: SegmentMetadata {
                    metadata: segment.metadata.clone(),
                },
            },
        });
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_bytes(&self) -> Result<Vec<u8>, StoreError> {
        serde_json::to_vec(self).map_err(StoreError::Encode)
    }

    /// Writes the store atomically and returns the SHA-256 of the bytes written.
    pub fn write_to(&self, path: &Path) -> Result<String, StoreError> {
        let bytes = self.to_json_bytes()?;
        atomic_write_file(path, &bytes).map_err(|source| StoreError::Write {
            path: path.display().to_string(),
            source,
        })?;
        Ok(sha256_hex(&bytes))
    }

    pub fn load(path: &Path) -> Result<Self, StoreError> {
        let raw = fs::read(path).map_err(|source| StoreError::Read {
            path: path.display().to_string(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| StoreError::Decode {
            path: path.display().to_string(),
            source,
        })
    }
}
