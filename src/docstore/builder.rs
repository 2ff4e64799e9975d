//! Index construction: chunk sources, embed them, write a fresh index file,
//! and atomically swap it into place.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::embedding::EmbeddingProvider;

use super::chunker::{ChunkerConfig, chunk_id, chunk_text};
use super::sqlite::{IndexMeta, IndexWriter};
use super::{ChunkRecord, DocumentSource, StoreError};

const DEFAULT_EMBED_BATCH: usize = 32;

/// A source that could not be indexed, with the reason it was passed over.
#[derive(Clone, Debug, Serialize)]
pub struct SkippedSource {
    pub source_id: String,
    pub reason: String,
}

/// Outcome of a completed build.
#[derive(Clone, Debug, Serialize)]
pub struct BuildReport {
    /// Sources that made it into the index.
    pub indexed_sources: usize,
    /// Total chunks written.
    pub chunk_count: usize,
    /// Sources skipped, with reasons. Never fails the build.
    pub skipped: Vec<SkippedSource>,
    /// Model id recorded in the index metadata.
    pub embedding_model: String,
    pub built_at: DateTime<Utc>,
}

/// Builds a vector index from raw document sources.
///
/// The build writes to a scratch file next to the target path and renames it
/// over the target only once the index is complete, so readers of the old
/// index never observe a half-written file. Sources that cannot be processed
/// (empty text, embedding failures) are skipped and reported rather than
/// aborting the build.
pub struct DocStoreBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    chunker: ChunkerConfig,
    index_path: PathBuf,
    embed_batch_size: usize,
}

impl DocStoreBuilder {
    pub fn new(provider: Arc<dyn EmbeddingProvider>, index_path: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            chunker: ChunkerConfig::default(),
            index_path: index_path.into(),
            embed_batch_size: DEFAULT_EMBED_BATCH,
        }
    }

    #[must_use]
    pub fn with_chunker(mut self, chunker: ChunkerConfig) -> Self {
        self.chunker = chunker;
        self
    }

    #[must_use]
    pub fn with_embed_batch_size(mut self, size: usize) -> Self {
        self.embed_batch_size = size.max(1);
        self
    }

    /// Chunk, embed, and index every source, then swap the new index in.
    ///
    /// Returns a report of what was indexed and what was skipped. An empty
    /// source list still produces a valid (empty) index.
    #[instrument(skip(self, sources), err)]
    pub async fn build(&self, sources: Vec<DocumentSource>) -> Result<BuildReport, StoreError> {
        let scratch = self.scratch_path();
        let writer = IndexWriter::create(&scratch).await?;

        let mut skipped = Vec::new();
        let mut indexed_sources = 0usize;
        let mut chunk_count = 0usize;

        for source in sources {
            match self.index_source(&writer, &source).await {
                Ok(written) => {
                    indexed_sources += 1;
                    chunk_count += written;
                }
                Err(reason) => {
                    warn!(source_id = %source.id, %reason, "skipping source");
                    skipped.push(SkippedSource {
                        source_id: source.id.clone(),
                        reason,
                    });
                }
            }
        }

        let built_at = Utc::now();
        let meta = IndexMeta {
            embedding_model: self.provider.model_id().to_string(),
            dimension: self.provider.dimension(),
            built_at,
            chunk_count,
        };
        let finished = writer.finalize(meta).await?;

        // Rename is atomic on the same filesystem, so the live path always
        // points at either the old complete index or the new one.
        tokio::fs::rename(&finished, &self.index_path).await?;

        info!(
            indexed_sources,
            chunk_count,
            skipped = skipped.len(),
            path = %self.index_path.display(),
            "document index built"
        );

        Ok(BuildReport {
            indexed_sources,
            chunk_count,
            skipped,
            embedding_model: self.provider.model_id().to_string(),
            built_at,
        })
    }

    /// Path of the freshly built index after [`build`](Self::build) returns.
    pub fn index_path(&self) -> &std::path::Path {
        &self.index_path
    }

    fn scratch_path(&self) -> PathBuf {
        let mut scratch = self.index_path.clone().into_os_string();
        scratch.push(".building");
        PathBuf::from(scratch)
    }

    /// Index one source; the error string becomes the skip reason.
    async fn index_source(
        &self,
        writer: &IndexWriter,
        source: &DocumentSource,
    ) -> Result<usize, String> {
        if source.text.trim().is_empty() {
            return Err("source text is empty".to_string());
        }

        let windows = chunk_text(&source.text, self.chunker);
        if windows.is_empty() {
            return Err("chunking produced no windows".to_string());
        }

        let mut records = Vec::with_capacity(windows.len());
        let mut texts = Vec::with_capacity(windows.len());
        for window in &windows {
            let locator = match &source.locator {
                Some(base) => format!("{base}, chunk {}", window.index),
                None => format!("chunk {}", window.index),
            };
            records.push(ChunkRecord {
                id: chunk_id(&source.id, window.index),
                source_id: source.id.clone(),
                title: source.title.clone(),
                locator,
                index: window.index,
                text: window.text.clone(),
            });
            texts.push(window.text.clone());
        }

        // Embed the whole source before writing anything, so a failing source
        // leaves no partial rows behind.
        let mut embeddings = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.embed_batch_size) {
            let vectors = self
                .provider
                .embed_batch(batch)
                .await
                .map_err(|err| format!("embedding failed: {err}"))?;
            embeddings.extend(vectors);
        }

        let written = records.len();
        let rows: Vec<_> = records.into_iter().zip(embeddings).collect();
        writer
            .insert_chunks(rows)
            .await
            .map_err(|err| format!("storage failed: {err}"))?;

        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::SqliteVectorIndex;
    use crate::embedding::MockEmbeddingProvider;
    use tempfile::tempdir;

    fn source(id: &str, text: &str) -> DocumentSource {
        DocumentSource::new(id, format!("Title of {id}"), text)
    }

    #[tokio::test]
    /// A normal build indexes every source and records provider metadata.
    async fn test_build_indexes_all_sources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.db");
        let provider = Arc::new(MockEmbeddingProvider::new());

        let builder = DocStoreBuilder::new(provider.clone(), &path);
        let report = builder
            .build(vec![
                source("gpu-guide", "Install the accelerator firmware before cabling."),
                source("cooling", "Liquid cooling loops require quarterly inspection."),
            ])
            .await
            .unwrap();

        assert_eq!(report.indexed_sources, 2);
        assert_eq!(report.chunk_count, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(report.embedding_model, "mock-embedder");

        let index = SqliteVectorIndex::open(&path).await.unwrap();
        assert_eq!(index.meta().embedding_model, "mock-embedder");
        assert_eq!(index.meta().dimension, provider.dimension());
        assert_eq!(index.meta().chunk_count, 2);
        assert_eq!(index.count().await.unwrap(), 2);
    }

    #[tokio::test]
    /// Empty sources are skipped with a reason; the rest still index.
    async fn test_build_skips_empty_sources() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.db");

        let builder = DocStoreBuilder::new(Arc::new(MockEmbeddingProvider::new()), &path);
        let report = builder
            .build(vec![
                source("blank", "   \n\t  "),
                source("real", "Top-of-rack switches uplink to the spine."),
            ])
            .await
            .unwrap();

        assert_eq!(report.indexed_sources, 1);
        assert_eq!(report.skipped.len(), 1);
        assert_eq!(report.skipped[0].source_id, "blank");
        assert!(report.skipped[0].reason.contains("empty"));
    }

    #[tokio::test]
    /// No sources at all still yields a valid, openable, empty index.
    async fn test_build_with_no_sources_is_valid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.db");

        let builder = DocStoreBuilder::new(Arc::new(MockEmbeddingProvider::new()), &path);
        let report = builder.build(Vec::new()).await.unwrap();
        assert_eq!(report.indexed_sources, 0);
        assert_eq!(report.chunk_count, 0);

        let index = SqliteVectorIndex::open(&path).await.unwrap();
        assert_eq!(index.count().await.unwrap(), 0);
        let hits = index
            .search(&vec![0.5; index.meta().dimension], 5)
            .await
            .unwrap();
        assert!(hits.is_empty());
    }

    #[tokio::test]
    /// Rebuilding over an existing index replaces its contents.
    async fn test_rebuild_replaces_previous_index() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("docs.db");
        let builder = DocStoreBuilder::new(Arc::new(MockEmbeddingProvider::new()), &path);

        builder
            .build(vec![source("old", "Original firmware notes.")])
            .await
            .unwrap();
        builder
            .build(vec![
                source("new-a", "Replacement cabling guide."),
                source("new-b", "Replacement telemetry guide."),
            ])
            .await
            .unwrap();

        let index = SqliteVectorIndex::open(&path).await.unwrap();
        assert_eq!(index.meta().chunk_count, 2);
        let hits = index
            .search(&vec![0.1; index.meta().dimension], 10)
            .await
            .unwrap();
        assert!(hits.iter().all(|hit| hit.record.source_id.starts_with("new-")));
    }
}
