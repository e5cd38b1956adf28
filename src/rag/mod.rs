//! Retrieval Augmented Generation (RAG) pipeline.
//!
//! This module covers the full path from raw document bytes to a grounded
//! chat response.
//!
//! # Module Structure
//!
//! - [`loader`] - Text extraction from plain text, Markdown, HTML, and JSON
//! - [`chunker`] - Overlapping sliding-window chunking over characters
//! - [`embeddings`] - Embedding provider trait and backends
//! - [`retriever`] - Query-time search, re-ranking, and context budgeting
//! - [`pipeline`] - The orchestrator tying ingestion and chat together
//!
//! # Pipeline flow
//!
//! 1. **Ingestion** - documents are loaded, chunked, embedded, and upserted
//!    into the vector store (re-ingesting an origin supersedes it)
//! 2. **Retrieval** - the query is embedded and the nearest chunks fetched
//!    within a context budget
//! 3. **Generation** - the LLM answers from the assembled, source-tagged
//!    context, with retry and degraded-mode handling
//!
//! # Example
//!
//! ```ignore
//! use ragmill::rag::pipeline::{PipelineConfig, RagPipeline};
//! use ragmill::types::ContentType;
//!
//! let pipeline = RagPipeline::new(PipelineConfig::default(), embedder, store, generator)?;
//! pipeline.add_document("notes.md", ContentType::Markdown, bytes).await?;
//! let turn = pipeline.handle_chat("What do my notes say about Rust?").await?;
//! ```

pub mod chunker;
pub mod embeddings;
pub mod loader;
pub mod pipeline;
pub mod retriever;

pub use chunker::Chunker;
pub use embeddings::{EmbeddingBackend, EmbeddingProvider};
pub use loader::DocumentLoader;
pub use pipeline::{PipelineConfig, RagPipeline};
pub use retriever::{RerankSignal, Retriever, RetrieverConfig};
