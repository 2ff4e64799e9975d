//! Document store: chunking, persisted vector index, and retrieval.
//!
//! The store is split along the build/query boundary:
//!
//! ```text
//!   DocumentSource ──► DocStoreBuilder ──► SqliteVectorIndex (on disk)
//!        (text)          chunk + embed            ▲
//!                                                 │ atomic swap
//!                                          SharedIndex ◄── VectorRetriever
//!                                                              (top-k)
//! ```
//!
//! [`builder::DocStoreBuilder`] chunks sources with a sliding window, embeds
//! the chunks, and writes a fresh index file which atomically replaces the
//! previous one. [`retriever::VectorRetriever`] embeds queries and serves
//! top-k cosine neighbors from whatever index [`SharedIndex`] currently
//! points at; searches in flight during a rebuild finish against the index
//! they started on.
//!
//! Persistence is SQLite with vector search via `sqlite-vec`. The index
//! records which embedding model built it and refuses queries from a
//! different one.

pub mod builder;
pub mod chunker;
pub mod retriever;
pub mod sqlite;

use std::sync::{Arc, RwLock};

use miette::Diagnostic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::embedding::EmbeddingError;

pub use builder::{BuildReport, DocStoreBuilder, SkippedSource};
pub use chunker::{ChunkWindow, ChunkerConfig, chunk_id, chunk_text};
pub use retriever::{RetrieverConfig, VectorRetriever};
pub use sqlite::{IndexMeta, IndexWriter, SqliteVectorIndex};

/// A document handed to the store builder for ingestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSource {
    /// Stable identifier; chunk ids derive from it.
    pub id: String,
    /// Human-readable title, surfaced in citations.
    pub title: String,
    /// Where the document lives (path, URL), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    /// Full document text.
    pub text: String,
}

impl DocumentSource {
    #[must_use]
    pub fn new(id: impl Into<String>, title: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            locator: None,
            text: text.into(),
        }
    }

    #[must_use]
    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}

/// A chunk as persisted in the index.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkRecord {
    /// `<source_id>#<index>`, stable across rebuilds of unchanged sources.
    pub id: String,
    /// The source document this chunk was cut from.
    pub source_id: String,
    /// Source title, carried for citations.
    pub title: String,
    /// Where the chunk sits (e.g. `"chunk 3"` or `"docs/gb300.pdf, chunk 3"`).
    pub locator: String,
    /// Zero-based chunk index within the source.
    pub index: usize,
    /// The chunk text.
    pub text: String,
}

/// A chunk returned from a similarity search, with its score.
///
/// Scores are cosine similarity in `[0.0, 1.0]` for unit-normalized
/// embeddings; higher is more similar.
#[derive(Clone, Debug, PartialEq)]
pub struct RetrievedChunk {
    pub record: ChunkRecord,
    pub score: f32,
}

/// Errors from the document store.
#[derive(Debug, Error, Diagnostic)]
pub enum StoreError {
    /// SQLite layer failure (open, schema, query, extension).
    #[error("vector index storage error: {0}")]
    #[diagnostic(code(switchboard::docstore::storage))]
    Storage(String),

    /// Filesystem failure around the index file (rename, remove).
    #[error("index file operation failed: {0}")]
    #[diagnostic(code(switchboard::docstore::io))]
    Io(#[from] std::io::Error),

    /// Embedding provider failure while building or querying.
    #[error(transparent)]
    #[diagnostic(transparent)]
    Embedding(#[from] EmbeddingError),

    /// The index was built by a different embedding model.
    #[error("index was built with model '{index_model}' but provider is '{provider_model}'")]
    #[diagnostic(
        code(switchboard::docstore::model_mismatch),
        help("Rebuild the index with the active embedding provider.")
    )]
    ModelMismatch {
        index_model: String,
        provider_model: String,
    },

    /// The index dimension does not match the provider's.
    #[error("index dimension {index} does not match provider dimension {provider}")]
    #[diagnostic(
        code(switchboard::docstore::dimension_mismatch),
        help("Rebuild the index with the active embedding provider.")
    )]
    DimensionMismatch { index: usize, provider: usize },

    /// The index file lacks required metadata (corrupt or foreign file).
    #[error("index metadata missing required key '{key}'")]
    #[diagnostic(code(switchboard::docstore::missing_meta))]
    MissingMeta { key: &'static str },

    /// Retriever parameters failed construction-time validation.
    #[error("invalid retriever configuration: {0}")]
    #[diagnostic(code(switchboard::docstore::invalid_config))]
    InvalidConfig(String),
}

/// Handle to the currently-live vector index, swappable on rebuild.
///
/// Readers grab an `Arc` to the current index and keep using it for the
/// duration of their search; [`replace`](Self::replace) points subsequent
/// readers at the new index without interrupting anyone.
#[derive(Clone)]
pub struct SharedIndex {
    current: Arc<RwLock<Arc<SqliteVectorIndex>>>,
}

impl SharedIndex {
    #[must_use]
    pub fn new(index: SqliteVectorIndex) -> Self {
        Self {
            current: Arc::new(RwLock::new(Arc::new(index))),
        }
    }

    /// The index to run this search against.
    pub fn current(&self) -> Arc<SqliteVectorIndex> {
        self.current.read().expect("index lock poisoned").clone()
    }

    /// Swap in a freshly built index. In-flight searches finish on the old one.
    pub fn replace(&self, index: SqliteVectorIndex) {
        let mut guard = self.current.write().expect("index lock poisoned");
        *guard = Arc::new(index);
    }
}
