//! Query-time retrieval over a built index.

use std::sync::Arc;

use tracing::debug;

use crate::embedding::EmbeddingProvider;

use super::{RetrievedChunk, SharedIndex, StoreError};

/// Tuning knobs for retrieval.
#[derive(Clone, Copy, Debug)]
pub struct RetrieverConfig {
    /// Maximum number of chunks returned per query.
    pub top_k: usize,
    /// Minimum similarity a chunk must reach to be returned.
    pub min_score: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            min_score: 0.0,
        }
    }
}

/// Embeds queries and searches the shared index.
///
/// Construction validates the configuration and checks that the query-time
/// embedding provider matches the model and dimension recorded in the index,
/// so a provider swap without a rebuild is caught up front rather than
/// producing silently meaningless similarities.
///
/// Retrieval takes `&self` and snapshots the index handle per call, so
/// concurrent queries and a background rebuild never block each other.
pub struct VectorRetriever {
    index: SharedIndex,
    provider: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
}

impl std::fmt::Debug for VectorRetriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorRetriever")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl VectorRetriever {
    pub fn new(
        index: SharedIndex,
        provider: Arc<dyn EmbeddingProvider>,
        config: RetrieverConfig,
    ) -> Result<Self, StoreError> {
        if config.top_k == 0 {
            return Err(StoreError::InvalidConfig(
                "top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&config.min_score) {
            return Err(StoreError::InvalidConfig(format!(
                "min_score must be within [0.0, 1.0], got {}",
                config.min_score
            )));
        }

        let current = index.current();
        let meta = current.meta();
        if meta.embedding_model != provider.model_id() {
            return Err(StoreError::ModelMismatch {
                index_model: meta.embedding_model.clone(),
                provider_model: provider.model_id().to_string(),
            });
        }
        if meta.dimension != provider.dimension() {
            return Err(StoreError::DimensionMismatch {
                index: meta.dimension,
                provider: provider.dimension(),
            });
        }

        Ok(Self {
            index,
            provider,
            config,
        })
    }

    pub fn config(&self) -> RetrieverConfig {
        self.config
    }

    /// Return the best-matching chunks for `query`, sorted by score
    /// non-increasing. An empty result is a normal outcome, not an error.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<RetrievedChunk>, StoreError> {
        let embedding = self.provider.embed_one(query).await?;
        let index = self.index.current();
        let hits = index.search(&embedding, self.config.top_k).await?;

        let total = hits.len();
        let hits: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.config.min_score)
            .collect();

        debug!(
            kept = hits.len(),
            total,
            top_k = self.config.top_k,
            min_score = self.config.min_score,
            "retrieval finished"
        );
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::docstore::{DocStoreBuilder, DocumentSource, SqliteVectorIndex};
    use crate::embedding::MockEmbeddingProvider;
    use tempfile::tempdir;

    const NIC_TEXT: &str = "Replace the failed NIC and reseat the riser card.";
    const PSU_TEXT: &str = "Power supplies run in a 2N redundant configuration.";

    async fn built_index(
        dir: &tempfile::TempDir,
        name: &str,
        provider: Arc<MockEmbeddingProvider>,
        sources: Vec<DocumentSource>,
    ) -> SqliteVectorIndex {
        let path = dir.path().join(name);
        DocStoreBuilder::new(provider, &path)
            .build(sources)
            .await
            .unwrap();
        SqliteVectorIndex::open(&path).await.unwrap()
    }

    fn sources() -> Vec<DocumentSource> {
        vec![
            DocumentSource::new("nic", "NIC Guide", NIC_TEXT),
            DocumentSource::new("psu", "PSU Guide", PSU_TEXT),
        ]
    }

    #[tokio::test]
    /// The chunk whose text matches the query exactly ranks first with a
    /// similarity of one, and scores come back non-increasing.
    async fn test_retrieve_ranks_exact_match_first() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(MockEmbeddingProvider::new());
        let index = built_index(&dir, "docs.db", provider.clone(), sources()).await;

        let retriever = VectorRetriever::new(
            SharedIndex::new(index),
            provider,
            RetrieverConfig::default(),
        )
        .unwrap();

        let hits = retriever.retrieve(NIC_TEXT).await.unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].record.source_id, "nic");
        assert!(hits[0].score > 0.99);
        for pair in hits.windows(2) {
            assert!(pair[0].score >= pair[1].score);
        }
    }

    #[tokio::test]
    /// min_score drops low-similarity chunks instead of erroring.
    async fn test_retrieve_applies_min_score() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(MockEmbeddingProvider::new());
        let index = built_index(&dir, "docs.db", provider.clone(), sources()).await;

        let retriever = VectorRetriever::new(
            SharedIndex::new(index),
            provider,
            RetrieverConfig {
                top_k: 5,
                min_score: 0.9,
            },
        )
        .unwrap();

        let hits = retriever.retrieve(PSU_TEXT).await.unwrap();
        assert!(hits.iter().all(|hit| hit.score >= 0.9));
        assert!(hits.iter().any(|hit| hit.record.source_id == "psu"));
    }

    #[tokio::test]
    /// A provider whose model id differs from the index is rejected up front.
    async fn test_new_rejects_model_mismatch() {
        let dir = tempdir().unwrap();
        let build_provider = Arc::new(MockEmbeddingProvider::new());
        let index = built_index(&dir, "docs.db", build_provider, sources()).await;

        let other = Arc::new(MockEmbeddingProvider::new().with_model_id("newer-embedder"));
        let err = VectorRetriever::new(
            SharedIndex::new(index),
            other,
            RetrieverConfig::default(),
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::ModelMismatch { .. }));
    }

    #[tokio::test]
    /// Out-of-range knobs fail construction instead of skewing results later.
    async fn test_new_rejects_invalid_config() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(MockEmbeddingProvider::new());
        let index = built_index(&dir, "docs.db", provider.clone(), sources()).await;
        let shared = SharedIndex::new(index);

        let err = VectorRetriever::new(
            shared.clone(),
            provider.clone(),
            RetrieverConfig {
                top_k: 0,
                min_score: 0.0,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));

        let err = VectorRetriever::new(
            shared,
            provider,
            RetrieverConfig {
                top_k: 5,
                min_score: 1.5,
            },
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidConfig(_)));
    }

    #[tokio::test]
    /// Swapping the shared index redirects queries without rebuilding the
    /// retriever.
    async fn test_retrieve_follows_index_swap() {
        let dir = tempdir().unwrap();
        let provider = Arc::new(MockEmbeddingProvider::new());

        let first = built_index(&dir, "first.db", provider.clone(), sources()).await;
        let second = built_index(
            &dir,
            "second.db",
            provider.clone(),
            vec![DocumentSource::new(
                "gpu",
                "GPU Guide",
                "Training pods expose eight accelerators per chassis.",
            )],
        )
        .await;

        let shared = SharedIndex::new(first);
        let retriever = VectorRetriever::new(
            shared.clone(),
            provider,
            RetrieverConfig::default(),
        )
        .unwrap();

        let before = retriever.retrieve(NIC_TEXT).await.unwrap();
        assert!(before.iter().any(|hit| hit.record.source_id == "nic"));

        shared.replace(second);
        let after = retriever.retrieve(NIC_TEXT).await.unwrap();
        assert!(after.iter().all(|hit| hit.record.source_id == "gpu"));
    }
}
