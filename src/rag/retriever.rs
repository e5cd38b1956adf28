//! Query-time retrieval: embed, search, re-rank, budget.
//!
//! The retriever owns no state beyond its configuration; each call embeds
//! the query, asks the store for the `top_k` nearest chunks, optionally
//! re-ranks by recency, and enforces the context character budget.

use crate::db::VectorStore;
use crate::rag::embeddings::EmbeddingProvider;
use crate::types::{RagError, Result, RetrievalResult, RetrievedChunk, SearchFilter, SearchHit};
use chrono::Utc;
use std::sync::Arc;
use tracing::debug;

/// Window over which a chunk's recency bonus decays to zero.
const RECENCY_WINDOW_DAYS: f32 = 30.0;

/// Secondary ranking signal applied after similarity search.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RerankSignal {
    /// Pure similarity order from the store.
    None,
    /// Boost recently ingested chunks: `score + weight * freshness`,
    /// where freshness decays linearly from 1 to 0 over 30 days.
    Recency {
        /// How much a maximally fresh chunk is boosted.
        weight: f32,
    },
}

/// Retrieval parameters, fixed at pipeline construction.
#[derive(Debug, Clone)]
pub struct RetrieverConfig {
    /// Maximum number of chunks to request from the store.
    pub top_k: usize,
    /// Upper bound on total retrieved context, in characters.
    pub context_budget_chars: usize,
    /// Secondary ranking signal.
    pub rerank: RerankSignal,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            context_budget_chars: 8000,
            rerank: RerankSignal::None,
        }
    }
}

impl RetrieverConfig {
    /// Validate parameter ranges.
    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Configuration("top_k must be > 0".into()));
        }
        if self.context_budget_chars == 0 {
            return Err(RagError::Configuration(
                "context_budget_chars must be > 0".into(),
            ));
        }
        if let RerankSignal::Recency { weight } = self.rerank {
            if !weight.is_finite() || weight < 0.0 {
                return Err(RagError::Configuration(format!(
                    "recency weight {} must be finite and non-negative",
                    weight
                )));
            }
        }
        Ok(())
    }
}

/// Retrieves the most relevant stored chunks for a query.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    config: RetrieverConfig,
}

impl Retriever {
    /// Create a retriever over the given providers.
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        config: RetrieverConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            embedder,
            store,
            config,
        })
    }

    /// Retrieval parameters this instance was built with.
    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// Retrieve ranked context for a query, within the character budget.
    ///
    /// An empty or whitespace-only query is `InvalidInput`. Embedding or
    /// store failures propagate; the caller decides whether to degrade.
    pub async fn retrieve(
        &self,
        query: &str,
        filter: Option<&SearchFilter>,
    ) -> Result<RetrievalResult> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query is empty".into()));
        }

        let vectors = self.embedder.embed_batched(&[query.to_string()]).await?;
        let query_vector = vectors
            .into_iter()
            .next()
            .ok_or_else(|| RagError::ProviderUnavailable("no query embedding returned".into()))?;

        let mut hits = self
            .store
            .search(&query_vector, self.config.top_k, filter)
            .await?;
        self.apply_rerank(&mut hits);

        let mut result = RetrievalResult::default();
        let mut used_chars = 0usize;
        for hit in hits {
            let chars = hit.text.chars().count();
            if used_chars + chars > self.config.context_budget_chars {
                result.truncated = true;
                break;
            }
            used_chars += chars;
            result.chunks.push(RetrievedChunk {
                text: hit.text,
                score: hit.score,
                metadata: hit.metadata,
            });
        }

        debug!(
            chunks = result.chunks.len(),
            chars = used_chars,
            truncated = result.truncated,
            "retrieval complete"
        );
        Ok(result)
    }

    fn apply_rerank(&self, hits: &mut [SearchHit]) {
        let RerankSignal::Recency { weight } = self.config.rerank else {
            return;
        };
        let now = Utc::now();
        for hit in hits.iter_mut() {
            let age_days =
                (now - hit.metadata.ingested_at).num_seconds().max(0) as f32 / 86_400.0;
            let freshness = (1.0 - age_days / RECENCY_WINDOW_DAYS).max(0.0);
            hit.score += weight * freshness;
        }
        // Stable sort keeps the store's insertion-order tie-break intact.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rag::embeddings::MockEmbeddingProvider;
    use crate::types::{ChunkMetadata, CollectionInfo, VectorEntry};
    use chrono::Duration;
    use uuid::Uuid;

    /// Store double that returns a fixed hit list (or a fixed error).
    struct FixedStore {
        hits: std::result::Result<Vec<SearchHit>, String>,
    }

    #[async_trait::async_trait]
    impl VectorStore for FixedStore {
        fn provider_name(&self) -> &'static str {
            "fixed"
        }

        async fn upsert(&self, _entries: Vec<VectorEntry>) -> Result<usize> {
            Ok(0)
        }

        async fn search(
            &self,
            _query: &[f32],
            _top_k: usize,
            _filter: Option<&SearchFilter>,
        ) -> Result<Vec<SearchHit>> {
            match &self.hits {
                Ok(hits) => Ok(hits.clone()),
                Err(message) => Err(RagError::ProviderUnavailable(message.clone())),
            }
        }

        async fn delete_document(&self, _document_id: Uuid) -> Result<usize> {
            Ok(0)
        }

        async fn delete_by_origin(&self, _origin: &str) -> Result<usize> {
            Ok(0)
        }

        async fn collection_info(&self) -> Result<CollectionInfo> {
            Ok(CollectionInfo {
                count: 0,
                dimension: None,
                model_identifier: "fixed".into(),
            })
        }
    }

    fn hit(text: &str, score: f32, age_days: i64) -> SearchHit {
        SearchHit {
            chunk_id: Uuid::new_v4(),
            score,
            text: text.to_string(),
            metadata: ChunkMetadata {
                document_id: Uuid::new_v4(),
                origin: "doc.txt".into(),
                start_offset: 0,
                end_offset: text.chars().count(),
                sequence_index: 0,
                ingested_at: Utc::now() - Duration::days(age_days),
            },
        }
    }

    fn retriever_with(hits: Vec<SearchHit>, config: RetrieverConfig) -> Retriever {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed_batched()
            .returning(|_| Ok(vec![vec![1.0, 0.0]]));
        let store = FixedStore { hits: Ok(hits) };
        Retriever::new(Arc::new(embedder), Arc::new(store), config).unwrap()
    }

    #[test]
    fn config_validation() {
        assert!(RetrieverConfig::default().validate().is_ok());
        assert!(RetrieverConfig {
            top_k: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(RetrieverConfig {
            context_budget_chars: 0,
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(RetrieverConfig {
            rerank: RerankSignal::Recency { weight: -1.0 },
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[tokio::test]
    async fn empty_query_is_rejected() {
        let retriever = retriever_with(vec![], RetrieverConfig::default());
        let err = retriever.retrieve("   ", None).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn budget_drops_overflowing_hit_and_flags_truncation() {
        let hits = vec![hit("aaaaaaaaaa", 0.9, 0), hit("bbbbbbbbbb", 0.8, 0), hit("cc", 0.7, 0)];
        let config = RetrieverConfig {
            top_k: 5,
            context_budget_chars: 15,
            rerank: RerankSignal::None,
        };
        let retriever = retriever_with(hits, config);

        let result = retriever.retrieve("query", None).await.unwrap();
        // Second hit would overflow; iteration stops there even though the
        // third would still fit.
        assert_eq!(result.chunks.len(), 1);
        assert_eq!(result.chunks[0].text, "aaaaaaaaaa");
        assert!(result.truncated);
    }

    #[tokio::test]
    async fn within_budget_is_not_truncated() {
        let hits = vec![hit("aaa", 0.9, 0), hit("bbb", 0.8, 0)];
        let retriever = retriever_with(hits, RetrieverConfig::default());

        let result = retriever.retrieve("query", None).await.unwrap();
        assert_eq!(result.chunks.len(), 2);
        assert!(!result.truncated);
        assert_eq!(result.context_chars(), 6);
    }

    #[tokio::test]
    async fn recency_rerank_promotes_fresh_chunks() {
        // Older chunk has the better similarity; recency flips the order.
        let hits = vec![hit("old", 0.80, 60), hit("new", 0.75, 0)];
        let config = RetrieverConfig {
            rerank: RerankSignal::Recency { weight: 0.2 },
            ..Default::default()
        };
        let retriever = retriever_with(hits, config);

        let result = retriever.retrieve("query", None).await.unwrap();
        assert_eq!(result.chunks[0].text, "new");
        assert_eq!(result.chunks[1].text, "old");
    }

    #[tokio::test]
    async fn default_rerank_keeps_store_order() {
        let hits = vec![hit("first", 0.9, 30), hit("second", 0.5, 0)];
        let retriever = retriever_with(hits, RetrieverConfig::default());

        let result = retriever.retrieve("query", None).await.unwrap();
        assert_eq!(result.chunks[0].text, "first");
    }

    #[tokio::test]
    async fn store_errors_propagate() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_embed_batched()
            .returning(|_| Ok(vec![vec![1.0, 0.0]]));
        let store = FixedStore {
            hits: Err("store down".into()),
        };
        let retriever = Retriever::new(
            Arc::new(embedder),
            Arc::new(store),
            RetrieverConfig::default(),
        )
        .unwrap();

        let err = retriever.retrieve("query", None).await.unwrap_err();
        assert!(err.is_retryable());
    }
}
