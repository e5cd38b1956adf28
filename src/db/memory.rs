//! Embedded vector store: in-memory index with optional JSON persistence.
//!
//! Entries live in insertion order behind a single `RwLock`, which gives
//! the atomicity the pipeline needs: searches take the read lock and see a
//! consistent snapshot, upserts and deletes take the write lock and are
//! all-or-nothing. Brute-force cosine scan; collections here are small
//! enough that an ANN index would be overhead.

use crate::db::vectorstore::VectorStore;
use crate::types::{CollectionInfo, RagError, Result, SearchFilter, SearchHit, VectorEntry};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use uuid::Uuid;

/// Cosine similarity between two equal-length vectors.
///
/// Zero-norm input yields 0.0 rather than NaN.
pub(crate) fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[derive(Debug)]
struct StoreInner {
    /// Entries in insertion order; the order is the tie-break rank.
    entries: Vec<VectorEntry>,
    /// chunk_id -> position in `entries`.
    index: HashMap<Uuid, usize>,
    /// Pinned by the first upsert.
    dimension: Option<usize>,
}

/// Metadata written next to the entries file.
#[derive(Debug, Serialize, Deserialize)]
struct PersistedMeta {
    model_identifier: String,
    dimension: Option<usize>,
    count: usize,
}

const META_FILE: &str = "meta.json";
const ENTRIES_FILE: &str = "entries.json";

/// In-memory vector store, optionally backed by a directory on disk.
#[derive(Debug)]
pub struct InMemoryVectorStore {
    inner: RwLock<StoreInner>,
    model_identifier: String,
    path: Option<PathBuf>,
}

impl InMemoryVectorStore {
    /// Create an empty, non-persistent store bound to an embedding model.
    pub fn new(model_identifier: String) -> Self {
        Self {
            inner: RwLock::new(StoreInner {
                entries: Vec::new(),
                index: HashMap::new(),
                dimension: None,
            }),
            model_identifier,
            path: None,
        }
    }

    /// Open a persistent store, loading any existing collection at `path`.
    ///
    /// Fails with `Configuration` if the on-disk collection was written
    /// for a different embedding model.
    pub async fn open(path: &Path, model_identifier: String) -> Result<Self> {
        let meta_path = path.join(META_FILE);
        if !meta_path.exists() {
            info!(path = %path.display(), "starting empty collection");
            return Ok(Self {
                path: Some(path.to_path_buf()),
                ..Self::new(model_identifier)
            });
        }

        let meta_json = tokio::fs::read_to_string(&meta_path).await?;
        let meta: PersistedMeta = serde_json::from_str(&meta_json)
            .map_err(|e| RagError::Persistence(format!("corrupt collection metadata: {}", e)))?;
        if meta.model_identifier != model_identifier {
            return Err(RagError::Configuration(format!(
                "collection at '{}' was built with model '{}', configured model is '{}'; \
                 switching embedding models requires a new collection",
                path.display(),
                meta.model_identifier,
                model_identifier
            )));
        }

        let entries_json = tokio::fs::read_to_string(path.join(ENTRIES_FILE)).await?;
        let entries: Vec<VectorEntry> = serde_json::from_str(&entries_json)
            .map_err(|e| RagError::Persistence(format!("corrupt collection entries: {}", e)))?;

        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk_id, i))
            .collect();
        info!(
            path = %path.display(),
            count = entries.len(),
            model = model_identifier,
            "loaded collection"
        );

        Ok(Self {
            inner: RwLock::new(StoreInner {
                dimension: meta.dimension,
                entries,
                index,
            }),
            model_identifier,
            path: Some(path.to_path_buf()),
        })
    }

    fn validate(inner: &StoreInner, entries: &[VectorEntry]) -> Result<()> {
        let mut dimension = inner.dimension;
        for entry in entries {
            if entry.vector.is_empty() {
                return Err(RagError::InvalidInput(format!(
                    "entry '{}' has an empty vector",
                    entry.chunk_id
                )));
            }
            if entry.vector.iter().any(|v| !v.is_finite()) {
                return Err(RagError::InvalidInput(format!(
                    "entry '{}' contains a non-finite value",
                    entry.chunk_id
                )));
            }
            match dimension {
                Some(expected) if entry.vector.len() != expected => {
                    return Err(RagError::DimensionMismatch {
                        expected,
                        actual: entry.vector.len(),
                    });
                }
                None => dimension = Some(entry.vector.len()),
                _ => {}
            }
        }
        Ok(())
    }
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    fn provider_name(&self) -> &'static str {
        "in-memory"
    }

    async fn upsert(&self, entries: Vec<VectorEntry>) -> Result<usize> {
        let mut inner = self.inner.write();

        // Validate the whole batch before touching anything.
        Self::validate(&inner, &entries)?;

        let count = entries.len();
        for entry in entries {
            if inner.dimension.is_none() {
                inner.dimension = Some(entry.vector.len());
            }
            match inner.index.get(&entry.chunk_id).copied() {
                // Replacement keeps the original slot, so the insertion-
                // order tie-break rank is stable across re-upserts.
                Some(pos) => inner.entries[pos] = entry,
                None => {
                    let pos = inner.entries.len();
                    inner.index.insert(entry.chunk_id, pos);
                    inner.entries.push(entry);
                }
            }
        }
        debug!(count, total = inner.entries.len(), "upserted entries");
        Ok(count)
    }

    async fn search(
        &self,
        query: &[f32],
        top_k: usize,
        filter: Option<&SearchFilter>,
    ) -> Result<Vec<SearchHit>> {
        if top_k == 0 {
            return Err(RagError::Configuration("top_k must be > 0".into()));
        }

        let inner = self.inner.read();
        if let Some(expected) = inner.dimension {
            if query.len() != expected {
                return Err(RagError::DimensionMismatch {
                    expected,
                    actual: query.len(),
                });
            }
        }

        let mut hits: Vec<SearchHit> = inner
            .entries
            .iter()
            .filter(|e| filter.map_or(true, |f| f.matches(e.metadata.document_id)))
            .map(|e| SearchHit {
                chunk_id: e.chunk_id,
                score: cosine_similarity(query, &e.vector),
                text: e.text.clone(),
                metadata: e.metadata.clone(),
            })
            .collect();

        // Stable sort keeps insertion order within equal scores.
        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        hits.truncate(top_k);
        Ok(hits)
    }

    async fn delete_document(&self, document_id: Uuid) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner
            .entries
            .retain(|e| e.metadata.document_id != document_id);
        let removed = before - inner.entries.len();
        if removed == 0 {
            return Err(RagError::NotFound(format!(
                "no entries for document '{}'",
                document_id
            )));
        }
        inner.index = inner
            .entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.chunk_id, i))
            .collect();
        debug!(%document_id, removed, "deleted document entries");
        Ok(removed)
    }

    async fn delete_by_origin(&self, origin: &str) -> Result<usize> {
        let mut inner = self.inner.write();
        let before = inner.entries.len();
        inner.entries.retain(|e| e.metadata.origin != origin);
        let removed = before - inner.entries.len();
        if removed > 0 {
            inner.index = inner
                .entries
                .iter()
                .enumerate()
                .map(|(i, e)| (e.chunk_id, i))
                .collect();
            debug!(origin, removed, "superseded origin entries");
        }
        Ok(removed)
    }

    async fn collection_info(&self) -> Result<CollectionInfo> {
        let inner = self.inner.read();
        Ok(CollectionInfo {
            count: inner.entries.len(),
            dimension: inner.dimension,
            model_identifier: self.model_identifier.clone(),
        })
    }

    async fn flush(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        // Snapshot under the read lock, serialize and write outside it.
        let (meta, entries_json) = {
            let inner = self.inner.read();
            let meta = PersistedMeta {
                model_identifier: self.model_identifier.clone(),
                dimension: inner.dimension,
                count: inner.entries.len(),
            };
            let entries_json = serde_json::to_string(&inner.entries)
                .map_err(|e| RagError::Persistence(format!("serialize entries: {}", e)))?;
            (meta, entries_json)
        };

        tokio::fs::create_dir_all(path).await?;
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| RagError::Persistence(format!("serialize metadata: {}", e)))?;
        tokio::fs::write(path.join(META_FILE), meta_json).await?;
        tokio::fs::write(path.join(ENTRIES_FILE), entries_json).await?;
        info!(path = %path.display(), count = meta.count, "flushed collection");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ChunkMetadata;
    use chrono::Utc;

    fn entry(doc: Uuid, seq: usize, text: &str, vector: Vec<f32>) -> VectorEntry {
        VectorEntry {
            chunk_id: Uuid::new_v4(),
            vector,
            text: text.to_string(),
            metadata: ChunkMetadata {
                document_id: doc,
                origin: format!("doc-{}.txt", seq),
                start_offset: 0,
                end_offset: text.chars().count(),
                sequence_index: seq,
                ingested_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn upsert_and_search_ranks_by_similarity() {
        let store = InMemoryVectorStore::new("test-model".into());
        let doc = Uuid::new_v4();
        store
            .upsert(vec![
                entry(doc, 0, "exact", vec![1.0, 0.0, 0.0]),
                entry(doc, 1, "orthogonal", vec![0.0, 1.0, 0.0]),
                entry(doc, 2, "close", vec![0.9, 0.1, 0.0]),
            ])
            .await
            .unwrap();

        let hits = store.search(&[1.0, 0.0, 0.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 3);
        assert_eq!(hits[0].text, "exact");
        assert_eq!(hits[1].text, "close");
        // Strictly descending.
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].score > hits[2].score);
    }

    #[tokio::test]
    async fn search_respects_top_k() {
        let store = InMemoryVectorStore::new("test-model".into());
        let doc = Uuid::new_v4();
        let entries: Vec<VectorEntry> = (0..5)
            .map(|i| entry(doc, i, "t", vec![1.0, i as f32]))
            .collect();
        store.upsert(entries).await.unwrap();

        assert_eq!(store.search(&[1.0, 0.0], 2, None).await.unwrap().len(), 2);
        // top_k beyond store size returns everything.
        assert_eq!(store.search(&[1.0, 0.0], 99, None).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn zero_top_k_is_a_configuration_error() {
        let store = InMemoryVectorStore::new("test-model".into());
        let err = store.search(&[1.0], 0, None).await.unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[tokio::test]
    async fn ties_rank_earlier_insertion_first() {
        let store = InMemoryVectorStore::new("test-model".into());
        let doc = Uuid::new_v4();
        let first = entry(doc, 0, "first", vec![1.0, 0.0]);
        let second = entry(doc, 1, "second", vec![1.0, 0.0]);
        let first_id = first.chunk_id;
        store.upsert(vec![first, second]).await.unwrap();

        let hits = store.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].chunk_id, first_id);
        assert_eq!(hits[0].score, hits[1].score);
    }

    #[tokio::test]
    async fn reupsert_is_idempotent_and_keeps_rank() {
        let store = InMemoryVectorStore::new("test-model".into());
        let doc = Uuid::new_v4();
        let mut e = entry(doc, 0, "original", vec![1.0, 0.0]);
        let later = entry(doc, 1, "later", vec![1.0, 0.0]);
        store.upsert(vec![e.clone(), later]).await.unwrap();

        e.text = "replaced".into();
        store.upsert(vec![e.clone()]).await.unwrap();

        let info = store.collection_info().await.unwrap();
        assert_eq!(info.count, 2);

        // The replaced entry still wins the tie because its insertion
        // rank is unchanged.
        let hits = store.search(&[1.0, 0.0], 2, None).await.unwrap();
        assert_eq!(hits[0].chunk_id, e.chunk_id);
        assert_eq!(hits[0].text, "replaced");
    }

    #[tokio::test]
    async fn dimension_mismatch_rejected_without_mutation() {
        let store = InMemoryVectorStore::new("test-model".into());
        let doc = Uuid::new_v4();
        store
            .upsert(vec![entry(doc, 0, "a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();

        let err = store
            .upsert(vec![
                entry(doc, 1, "ok", vec![0.0, 1.0, 0.0]),
                entry(doc, 2, "bad", vec![1.0, 0.0]),
            ])
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RagError::DimensionMismatch {
                expected: 3,
                actual: 2
            }
        ));

        // Whole batch rejected: count unchanged, including the valid entry.
        assert_eq!(store.collection_info().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn non_finite_vector_is_invalid_input() {
        let store = InMemoryVectorStore::new("test-model".into());
        let doc = Uuid::new_v4();
        let err = store
            .upsert(vec![entry(doc, 0, "nan", vec![f32::NAN, 0.0])])
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        assert_eq!(store.collection_info().await.unwrap().count, 0);
    }

    #[tokio::test]
    async fn delete_document_removes_all_its_entries() {
        let store = InMemoryVectorStore::new("test-model".into());
        let keep = Uuid::new_v4();
        let drop_doc = Uuid::new_v4();
        store
            .upsert(vec![
                entry(keep, 0, "keep", vec![1.0, 0.0]),
                entry(drop_doc, 0, "gone-1", vec![0.0, 1.0]),
                entry(drop_doc, 1, "gone-2", vec![0.5, 0.5]),
            ])
            .await
            .unwrap();

        let removed = store.delete_document(drop_doc).await.unwrap();
        assert_eq!(removed, 2);

        // Deleted entries never come back from search.
        let hits = store.search(&[0.0, 1.0], 10, None).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "keep");
    }

    #[tokio::test]
    async fn deleting_an_unknown_document_is_not_found() {
        let store = InMemoryVectorStore::new("test-model".into());
        store
            .upsert(vec![entry(Uuid::new_v4(), 0, "kept", vec![1.0, 0.0])])
            .await
            .unwrap();

        let err = store.delete_document(Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, RagError::NotFound(_)));
        // Nothing was removed.
        assert_eq!(store.collection_info().await.unwrap().count, 1);
    }

    #[tokio::test]
    async fn filter_restricts_to_document_subset() {
        let store = InMemoryVectorStore::new("test-model".into());
        let wanted = Uuid::new_v4();
        let other = Uuid::new_v4();
        store
            .upsert(vec![
                entry(wanted, 0, "wanted", vec![1.0, 0.0]),
                entry(other, 0, "other", vec![1.0, 0.0]),
            ])
            .await
            .unwrap();

        let filter = SearchFilter {
            document_ids: vec![wanted],
        };
        let hits = store.search(&[1.0, 0.0], 10, Some(&filter)).await.unwrap();
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].text, "wanted");
    }

    #[tokio::test]
    async fn query_dimension_mismatch_is_rejected() {
        let store = InMemoryVectorStore::new("test-model".into());
        let doc = Uuid::new_v4();
        store
            .upsert(vec![entry(doc, 0, "a", vec![1.0, 0.0, 0.0])])
            .await
            .unwrap();
        let err = store.search(&[1.0, 0.0], 3, None).await.unwrap_err();
        assert!(matches!(err, RagError::DimensionMismatch { .. }));
    }

    #[tokio::test]
    async fn flush_and_open_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let doc = Uuid::new_v4();
        {
            let store =
                InMemoryVectorStore::open(dir.path(), "test-model".into()).await.unwrap();
            store
                .upsert(vec![entry(doc, 0, "persisted", vec![0.6, 0.8])])
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let reloaded = InMemoryVectorStore::open(dir.path(), "test-model".into())
            .await
            .unwrap();
        let info = reloaded.collection_info().await.unwrap();
        assert_eq!(info.count, 1);
        assert_eq!(info.dimension, Some(2));

        let hits = reloaded.search(&[0.6, 0.8], 1, None).await.unwrap();
        assert_eq!(hits[0].text, "persisted");
    }

    #[tokio::test]
    async fn open_rejects_model_mismatch() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = InMemoryVectorStore::open(dir.path(), "model-a".into()).await.unwrap();
            store
                .upsert(vec![entry(Uuid::new_v4(), 0, "x", vec![1.0])])
                .await
                .unwrap();
            store.flush().await.unwrap();
        }

        let err = InMemoryVectorStore::open(dir.path(), "model-b".into())
            .await
            .unwrap_err();
        assert!(matches!(err, RagError::Configuration(_)));
    }

    #[test]
    fn cosine_similarity_basics() {
        assert!((cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]) - 1.0).abs() < 1e-6);
        assert!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]).abs() < 1e-6);
        assert!((cosine_similarity(&[1.0, 0.0], &[-1.0, 0.0]) + 1.0).abs() < 1e-6);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]), 0.0);
    }
}
