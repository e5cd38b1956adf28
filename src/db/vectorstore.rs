//! Vector store abstraction.
//!
//! A store persists `(chunk_id, vector, text, metadata)` tuples for one
//! collection and answers nearest-neighbor queries over them. All vectors
//! in a store share one dimension and one embedding model; mixing is
//! rejected. Cosine similarity is the required metric, with ties broken by
//! insertion order so results are deterministic.

use crate::types::{CollectionInfo, Result, SearchFilter, SearchHit, VectorEntry};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Configuration for vector store backends.
///
/// Selected once at process start; the resulting store is a
/// process-lifetime singleton passed to components explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "provider", rename_all = "lowercase")]
pub enum VectorStoreProvider {
    /// In-memory store, lost on restart. Default for development and
    /// tests.
    InMemory {
        /// Embedding model this collection is bound to.
        model_identifier: String,
    },

    /// In-memory store with JSON persistence: loaded at startup, written
    /// on `flush()`.
    Persistent {
        /// Directory holding the collection files.
        path: String,
        /// Embedding model this collection is bound to.
        model_identifier: String,
    },
}

impl VectorStoreProvider {
    /// Create a store instance from this provider configuration.
    pub async fn create_store(&self) -> Result<std::sync::Arc<dyn VectorStore>> {
        match self {
            VectorStoreProvider::InMemory { model_identifier } => Ok(std::sync::Arc::new(
                super::memory::InMemoryVectorStore::new(model_identifier.clone()),
            )),
            VectorStoreProvider::Persistent {
                path,
                model_identifier,
            } => {
                let store = super::memory::InMemoryVectorStore::open(
                    std::path::Path::new(path),
                    model_identifier.clone(),
                )
                .await?;
                Ok(std::sync::Arc::new(store))
            }
        }
    }
}

/// Abstract trait for vector store operations.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Name of this backend.
    fn provider_name(&self) -> &'static str;

    /// Insert or replace entries, keyed by `chunk_id`.
    ///
    /// Idempotent: re-upserting a `chunk_id` replaces its tuple atomically
    /// and keeps its original insertion rank. Every entry is validated
    /// (non-empty finite vector, matching dimension) before any mutation;
    /// a `DimensionMismatch` or `InvalidInput` error leaves the store
    /// untouched.
    ///
    /// Returns the number of entries written.
    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<usize>;

    /// Nearest-neighbor search by cosine similarity.
    ///
    /// Returns at most `top_k` hits in strictly descending score order;
    /// equal scores rank earlier-inserted entries first. `top_k == 0`
    /// fails with `Configuration`; `top_k` beyond the store size returns
    /// everything. An optional filter restricts the candidate set to a
    /// document subset before ranking.
    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>>;

    /// Remove all entries belonging to a document.
    ///
    /// Atomic with respect to concurrent searches: an in-flight search
    /// sees the pre- or post-delete state, never a partial one. Returns
    /// the number of entries removed; a document id with no entries
    /// fails with `NotFound`.
    async fn delete_document(&self, document_id: Uuid) -> Result<usize>;

    /// Remove all entries whose document was ingested from `origin`.
    /// Used to supersede a document on re-ingestion.
    async fn delete_by_origin(&self, origin: &str) -> Result<usize>;

    /// Read-only collection introspection.
    async fn collection_info(&self) -> Result<CollectionInfo>;

    /// Shutdown hook: persist state where the backend supports it.
    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
