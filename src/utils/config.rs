//! Environment-driven configuration.
//!
//! All knobs come from environment variables (a `.env` file is honored via
//! `dotenvy`). Every value has a default except provider credentials, which
//! stay `Option`al so the caller can decide which backends to wire up.

use crate::types::{RagError, Result};
use serde::Deserialize;
use std::env;

/// Top-level configuration, loaded once at process start.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Chunking parameters.
    pub chunking: ChunkingConfig,
    /// Retrieval parameters.
    pub retrieval: RetrievalConfig,
    /// Generation parameters.
    pub generation: GenerationConfig,
    /// Generation backend endpoints and credentials.
    pub llm: LlmConfig,
    /// Embedding backend selection.
    pub embedding: EmbeddingConfig,
}

/// Chunker parameters (`CHUNK_SIZE`, `CHUNK_OVERLAP`).
#[derive(Debug, Clone, Deserialize)]
pub struct ChunkingConfig {
    /// Target chunk length in characters.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in characters.
    pub chunk_overlap: usize,
}

/// Retriever parameters (`TOP_K_RETRIEVAL`, `CONTEXT_BUDGET_CHARS`).
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Maximum chunks requested per query.
    pub top_k: usize,
    /// Upper bound on total retrieved context, in characters.
    pub context_budget_chars: usize,
}

/// Generation parameters (`TEMPERATURE`, `MAX_TOKENS`,
/// `REQUEST_TIMEOUT_SECS`).
#[derive(Debug, Clone, Deserialize)]
pub struct GenerationConfig {
    /// Sampling temperature.
    pub temperature: f32,
    /// Output length cap in tokens.
    pub max_tokens: u32,
    /// Wall-clock bound on one chat turn, in seconds.
    pub request_timeout_secs: u64,
}

/// Generation backend endpoints (`OPENAI_*`, `OLLAMA_*`).
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    /// OpenAI API key; absent means the hosted backend is not configured.
    pub openai_api_key: Option<String>,
    /// OpenAI-compatible API base URL.
    pub openai_api_base: String,
    /// OpenAI chat model.
    pub openai_model: String,
    /// Ollama server URL.
    pub ollama_url: String,
    /// Ollama model name.
    pub ollama_model: String,
}

/// Embedding backend selection (`EMBEDDING_MODEL`,
/// `EMBEDDING_DIMENSION`).
#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model identifier; keys the vector store collection.
    pub embedding_model: String,
    /// Requested embedding dimension.
    pub embedding_dimension: usize,
}

fn parse_var<T: std::str::FromStr>(name: &str, default: &str) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse().map_err(|e| {
        RagError::Configuration(format!("invalid {}: {} ({})", name, raw, e))
    })
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Config {
            chunking: ChunkingConfig {
                chunk_size: parse_var("CHUNK_SIZE", "1000")?,
                chunk_overlap: parse_var("CHUNK_OVERLAP", "200")?,
            },
            retrieval: RetrievalConfig {
                top_k: parse_var("TOP_K_RETRIEVAL", "5")?,
                context_budget_chars: parse_var("CONTEXT_BUDGET_CHARS", "8000")?,
            },
            generation: GenerationConfig {
                temperature: parse_var("TEMPERATURE", "0.7")?,
                max_tokens: parse_var("MAX_TOKENS", "1000")?,
                request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "60")?,
            },
            llm: LlmConfig {
                openai_api_key: env::var("OPENAI_API_KEY").ok(),
                openai_api_base: env::var("OPENAI_API_BASE")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
                openai_model: env::var("OPENAI_MODEL")
                    .unwrap_or_else(|_| "gpt-4o-mini".to_string()),
                ollama_url: env::var("OLLAMA_URL")
                    .unwrap_or_else(|_| "http://localhost:11434".to_string()),
                ollama_model: env::var("OLLAMA_MODEL")
                    .unwrap_or_else(|_| "llama3.2".to_string()),
            },
            embedding: EmbeddingConfig {
                embedding_model: env::var("EMBEDDING_MODEL")
                    .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
                embedding_dimension: parse_var("EMBEDDING_DIMENSION", "1536")?,
            },
        })
    }
}
