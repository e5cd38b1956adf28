//! Core data model and error handling for the RAG pipeline.
//!
//! Everything that flows between pipeline stages lives here: documents and
//! their chunks (ingestion side), vector store entries and search hits
//! (storage side), and the per-request retrieval/conversation types
//! (query side).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ============= Document Types =============

/// Source format of an ingested document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    /// Plain UTF-8 text.
    PlainText,
    /// Markdown, reduced to plain text at load time.
    Markdown,
    /// HTML, reduced to its text nodes at load time.
    Html,
    /// Structured JSON, rendered leaf-by-leaf into text.
    Json,
    /// PDF. Declared for the ingestion API but extraction is not
    /// implemented; loading fails with `InvalidInput`.
    Pdf,
}

impl ContentType {
    /// Guess the content type from a file-path or URL origin.
    ///
    /// Unknown extensions fall back to [`ContentType::PlainText`].
    pub fn from_origin(origin: &str) -> Self {
        let lower = origin.to_ascii_lowercase();
        match lower.rsplit('.').next() {
            Some("md") | Some("markdown") => ContentType::Markdown,
            Some("html") | Some("htm") => ContentType::Html,
            Some("json") => ContentType::Json,
            Some("pdf") => ContentType::Pdf,
            _ => ContentType::PlainText,
        }
    }
}

/// An ingested source unit. Immutable once created; re-ingesting the same
/// origin supersedes the old document rather than mutating it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    /// Unique document identifier, minted at ingestion.
    pub id: Uuid,
    /// Where the document came from (path, URL, or caller-supplied label).
    pub origin: String,
    /// Normalized plain-text content.
    pub content: String,
    /// Source format the content was extracted from.
    pub content_type: ContentType,
    /// Ingestion timestamp.
    pub ingested_at: DateTime<Utc>,
}

/// A contiguous slice of a document's text, the atomic unit of embedding
/// and retrieval. Offsets are character offsets into the document content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique chunk identifier.
    pub id: Uuid,
    /// Owning document (non-owning back-reference).
    pub document_id: Uuid,
    /// The chunk text.
    pub text: String,
    /// Inclusive start character offset.
    pub start_offset: usize,
    /// Exclusive end character offset.
    pub end_offset: usize,
    /// Position of this chunk within the document's chunk sequence.
    pub sequence_index: usize,
}

// ============= Vector Store Types =============

/// Provenance metadata stored alongside each vector, sufficient for
/// filtering, citation, and recency re-ranking without a second lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    /// Owning document.
    pub document_id: Uuid,
    /// Origin of the owning document.
    pub origin: String,
    /// Start character offset of the chunk within the document.
    pub start_offset: usize,
    /// End character offset of the chunk within the document.
    pub end_offset: usize,
    /// Chunk position within the document.
    pub sequence_index: usize,
    /// When the owning document was ingested.
    pub ingested_at: DateTime<Utc>,
}

/// The persisted tuple held by a vector store, keyed by `chunk_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorEntry {
    /// Key: the chunk this vector was computed from.
    pub chunk_id: Uuid,
    /// The embedding vector. All entries in one store share one dimension.
    pub vector: Vec<f32>,
    /// The chunk text, stored so search hits carry it back directly.
    pub text: String,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
}

/// One ranked result from a vector similarity search.
#[derive(Debug, Clone)]
pub struct SearchHit {
    /// The matching chunk.
    pub chunk_id: Uuid,
    /// Similarity score (cosine, higher is better).
    pub score: f32,
    /// The chunk text.
    pub text: String,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
}

/// Restricts a search to a subset of documents.
#[derive(Debug, Clone, Default)]
pub struct SearchFilter {
    /// Only entries belonging to these documents match. Empty means no
    /// document restriction.
    pub document_ids: Vec<Uuid>,
}

impl SearchFilter {
    /// Whether an entry with the given document id passes this filter.
    pub fn matches(&self, document_id: Uuid) -> bool {
        self.document_ids.is_empty() || self.document_ids.contains(&document_id)
    }
}

/// Read-only introspection of a vector store collection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectionInfo {
    /// Number of entries currently stored.
    pub count: usize,
    /// Vector dimension, once pinned by the first upsert.
    pub dimension: Option<usize>,
    /// Embedding model this collection is bound to.
    pub model_identifier: String,
}

// ============= Retrieval Types =============

/// One chunk returned to the orchestrator by the retriever.
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    /// The chunk text.
    pub text: String,
    /// Similarity score (after any configured re-ranking).
    pub score: f32,
    /// Provenance metadata.
    pub metadata: ChunkMetadata,
}

/// Ephemeral, per-query retrieval output: ranked chunks that fit the
/// context budget, plus whether any ranked chunk was dropped for budget.
#[derive(Debug, Clone, Default)]
pub struct RetrievalResult {
    /// Chunks in descending rank order.
    pub chunks: Vec<RetrievedChunk>,
    /// True when budget enforcement dropped at least one ranked chunk.
    pub truncated: bool,
}

impl RetrievalResult {
    /// Total character length of the retrieved context.
    pub fn context_chars(&self) -> usize {
        self.chunks.iter().map(|c| c.text.chars().count()).sum()
    }
}

/// A cited source in a generated response: document origin plus the chunk's
/// character range, in retrieval rank order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    /// Origin of the cited document.
    pub origin: String,
    /// Start character offset of the cited chunk.
    pub start_offset: usize,
    /// End character offset of the cited chunk.
    pub end_offset: usize,
}

/// The result of one chat turn, owned by the orchestrator for the duration
/// of the request.
#[derive(Debug, Clone)]
pub struct ConversationTurn {
    /// The raw user query.
    pub query: String,
    /// What retrieval produced (empty in degraded mode).
    pub retrieved_context: RetrievalResult,
    /// The generated response text.
    pub response: String,
    /// Model name of the generation backend that produced the response.
    pub provider_used: String,
    /// True when retrieval failed and generation ran without context.
    pub degraded: bool,
    /// Cited sources in rank order.
    pub citations: Vec<Citation>,
}

// ============= Ingestion Types =============

/// Per-document ingestion outcome.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    /// Id of the newly created document.
    pub document_id: Uuid,
    /// Origin that was ingested.
    pub origin: String,
    /// Number of chunks produced and stored.
    pub chunk_count: usize,
    /// True when entries from a previous ingestion of the same origin were
    /// deleted first.
    pub superseded: bool,
}

/// Introspection bundle describing the configured pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineInfo {
    /// Chunker target length (characters).
    pub chunk_size: usize,
    /// Chunker overlap (characters).
    pub chunk_overlap: usize,
    /// Retrieval top-k.
    pub top_k: usize,
    /// Retrieval context budget (characters).
    pub context_budget_chars: usize,
    /// Embedding model identifier.
    pub embedding_model: String,
    /// Generation model name.
    pub generation_model: String,
    /// Current vector store collection state.
    pub collection: CollectionInfo,
}

// ============= Error Types =============

/// Error taxonomy for the RAG pipeline.
///
/// Retry policy per variant: only [`RagError::ProviderUnavailable`] is
/// retried (bounded exponential backoff). `ContextLengthExceeded` gets one
/// bounded retry after the orchestrator shrinks the context. Everything
/// else is surfaced to the caller unchanged.
#[derive(Debug, thiserror::Error)]
pub enum RagError {
    /// Invalid parameters supplied by the caller. Never retried.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Transient backend failure (network, auth, overload). Retryable.
    #[error("Provider unavailable: {0}")]
    ProviderUnavailable(String),

    /// Input violates a data contract (empty text, unsupported format,
    /// over-limit length). Not retryable; the caller must fix the input.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A vector's dimension does not match the store's established
    /// dimension. Rejected without partial mutation.
    #[error("Dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the store is pinned to.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// The assembled prompt exceeds the generation backend's context
    /// window. One bounded retry after shrinking context.
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// The generation backend refused the request on policy grounds.
    #[error("Content policy rejected: {0}")]
    ContentPolicyRejected(String),

    /// The per-request timeout cancelled the in-flight chain.
    #[error("Request timed out: {0}")]
    RequestTimeout(String),

    /// Generation failed after exhausting provider retries. Terminal.
    #[error("Generation unavailable: {0}")]
    GenerationUnavailable(String),

    /// A referenced entity does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Store persistence failure (serialization, corrupt state).
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl RagError {
    /// Whether a bounded retry may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RagError::ProviderUnavailable(_))
    }
}

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, RagError>;
