//! # Ragmill - Retrieval-Augmented Generation Core
//!
//! A library crate implementing the full RAG path: document ingestion and
//! chunking, embedding computation, vector-similarity storage and search,
//! retrieval orchestration, and context-conditioned generation across
//! interchangeable LLM backends.
//!
//! ## Overview
//!
//! Ragmill is the engine behind a RAG service: an HTTP layer, CLI, or job
//! runner wires providers together and calls
//! [`rag::pipeline::RagPipeline`]. Nothing in the crate is global; every
//! backend is injected explicitly.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use ragmill::{Config, ContentType, PipelineConfig, RagPipeline};
//! use ragmill::db::VectorStoreProvider;
//! use ragmill::llm::GenProvider;
//! use ragmill::rag::embeddings::EmbeddingBackend;
//!
//! #[tokio::main]
//! async fn main() -> ragmill::Result<()> {
//!     let config = Config::from_env()?;
//!
//!     let embedder = EmbeddingBackend::OpenAi {
//!         api_key: config.llm.openai_api_key.clone().unwrap_or_default(),
//!         api_base: config.llm.openai_api_base.clone(),
//!         model: config.embedding.embedding_model.clone(),
//!         dimension: config.embedding.embedding_dimension,
//!     }
//!     .create_provider()?;
//!
//!     let store = VectorStoreProvider::InMemory {
//!         model_identifier: embedder.model_identifier().to_string(),
//!     }
//!     .create_store()
//!     .await?;
//!
//!     let generator = GenProvider::Ollama {
//!         base_url: config.llm.ollama_url.clone(),
//!         model: config.llm.ollama_model.clone(),
//!     }
//!     .create_client()?;
//!
//!     let pipeline = RagPipeline::new(
//!         PipelineConfig::from_config(&config),
//!         embedder,
//!         store,
//!         generator,
//!     )?;
//!
//!     pipeline
//!         .add_document("notes.txt", ContentType::PlainText, b"The sky is blue.")
//!         .await?;
//!     let turn = pipeline.handle_chat("What color is the sky?").await?;
//!     println!("{}", turn.response);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `ollama` | Ollama local inference (default) |
//! | `openai` | OpenAI API generation and embeddings (default) |
//! | `local-embeddings` | fastembed ONNX embeddings, no network needed |
//!
//! ## Modules
//!
//! - [`rag`] - Loader, chunker, embeddings, retriever, and the orchestrator
//! - [`llm`] - Generation provider trait, backends, and retry policy
//! - [`db`] - Vector store trait and the in-memory/persistent store
//! - [`types`] - Shared data model and the error taxonomy
//! - [`utils`] - Environment-driven configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

/// Vector store trait and backends.
pub mod db;
/// Generation provider clients and abstractions.
pub mod llm;
/// Retrieval Augmented Generation (RAG) components.
pub mod rag;
/// Core types (documents, chunks, search hits, errors).
pub mod types;
/// Configuration utilities.
pub mod utils;

// Re-export the main types
pub use db::{VectorStore, VectorStoreProvider};
pub use llm::{GenProvider, GenerationOptions, GenerationProvider, RetryPolicy};
pub use rag::pipeline::{PipelineConfig, RagPipeline};
pub use rag::{Chunker, DocumentLoader, EmbeddingProvider, Retriever, RetrieverConfig};
pub use types::{ContentType, ConversationTurn, IngestReport, RagError, Result};
pub use utils::Config;
