//! The RAG orchestrator: ingestion on one side, chat turns on the other.
//!
//! [`RagPipeline`] owns the loader, chunker, and retriever, plus shared
//! handles to the embedding, store, and generation backends. All providers
//! are injected at construction; the pipeline holds no globals and no
//! per-turn state beyond the turn itself.

use crate::db::VectorStore;
use crate::llm::{GenerationOptions, GenerationProvider, RetryPolicy};
use crate::rag::chunker::Chunker;
use crate::rag::embeddings::EmbeddingProvider;
use crate::rag::loader::DocumentLoader;
use crate::rag::retriever::{Retriever, RetrieverConfig};
use crate::types::{
    ChunkMetadata, Citation, ContentType, ConversationTurn, IngestReport, PipelineInfo, RagError,
    Result, RetrievalResult, RetrievedChunk, VectorEntry,
};
use crate::utils::Config;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Instruction header for every grounded prompt.
const INSTRUCTION: &str = "You are a helpful AI assistant. Use the following context to answer \
the user's question. If the context doesn't contain enough information to answer the question, \
say so.";

/// Orchestrator parameters, fixed at construction.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chunker target length in characters.
    pub chunk_size: usize,
    /// Chunker overlap in characters.
    pub chunk_overlap: usize,
    /// Retrieval parameters.
    pub retriever: RetrieverConfig,
    /// Generation sampling options.
    pub options: GenerationOptions,
    /// Backoff policy for transient provider failures.
    pub retry: RetryPolicy,
    /// Wall-clock bound on one chat turn.
    pub request_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 200,
            retriever: RetrieverConfig::default(),
            options: GenerationOptions::default(),
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl PipelineConfig {
    /// Derive pipeline parameters from the environment-driven [`Config`].
    pub fn from_config(config: &Config) -> Self {
        Self {
            chunk_size: config.chunking.chunk_size,
            chunk_overlap: config.chunking.chunk_overlap,
            retriever: RetrieverConfig {
                top_k: config.retrieval.top_k,
                context_budget_chars: config.retrieval.context_budget_chars,
                ..Default::default()
            },
            options: GenerationOptions {
                temperature: config.generation.temperature,
                max_tokens: config.generation.max_tokens,
                stop_sequences: Vec::new(),
            },
            retry: RetryPolicy::default(),
            request_timeout: Duration::from_secs(config.generation.request_timeout_secs),
        }
    }
}

/// Lifecycle of one chat turn, traced per transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TurnState {
    Received,
    Retrieving,
    Retrieved,
    RetrievalFailed,
    Generating,
    Completed,
    GenerationFailed,
}

fn advance(state: &mut TurnState, next: TurnState) {
    debug!(from = ?state, to = ?next, "turn state");
    *state = next;
}

/// End-to-end RAG pipeline: ingest documents, answer grounded queries.
pub struct RagPipeline {
    loader: DocumentLoader,
    chunker: Chunker,
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    generator: Arc<dyn GenerationProvider>,
    retriever: Retriever,
    retry: RetryPolicy,
    options: GenerationOptions,
    request_timeout: Duration,
}

impl RagPipeline {
    /// Assemble a pipeline from configuration and injected providers.
    pub fn new(
        config: PipelineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        store: Arc<dyn VectorStore>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Result<Self> {
        config.options.validate()?;
        let chunker = Chunker::new(config.chunk_size, config.chunk_overlap)?;
        let retriever = Retriever::new(embedder.clone(), store.clone(), config.retriever)?;
        Ok(Self {
            loader: DocumentLoader::new(),
            chunker,
            embedder,
            store,
            generator,
            retriever,
            retry: config.retry,
            options: config.options,
            request_timeout: config.request_timeout,
        })
    }

    // ============= Query path =============

    /// Answer a query grounded in the stored documents.
    ///
    /// The whole chain runs under the request timeout; on elapse the
    /// in-flight work is dropped and `RequestTimeout` returned, with no
    /// partial state left behind. Retrieval failure degrades the turn
    /// (generation runs without context) rather than dropping the query.
    pub async fn handle_chat(&self, query: &str) -> Result<ConversationTurn> {
        self.handle_chat_with(query, self.options.clone()).await
    }

    /// [`RagPipeline::handle_chat`] with per-call generation options.
    pub async fn handle_chat_with(
        &self,
        query: &str,
        options: GenerationOptions,
    ) -> Result<ConversationTurn> {
        options.validate()?;
        match tokio::time::timeout(self.request_timeout, self.chat_inner(query, &options)).await {
            Ok(turn) => turn,
            Err(_) => Err(RagError::RequestTimeout(format!(
                "chat turn exceeded {}s",
                self.request_timeout.as_secs()
            ))),
        }
    }

    async fn chat_inner(&self, query: &str, options: &GenerationOptions) -> Result<ConversationTurn> {
        if query.trim().is_empty() {
            return Err(RagError::InvalidInput("query is empty".into()));
        }
        let mut state = TurnState::Received;

        advance(&mut state, TurnState::Retrieving);
        let (mut context, degraded) = match self.retriever.retrieve(query, None).await {
            Ok(result) => {
                advance(&mut state, TurnState::Retrieved);
                (result, false)
            }
            Err(err @ RagError::InvalidInput(_)) => return Err(err),
            Err(err) => {
                advance(&mut state, TurnState::RetrievalFailed);
                warn!(error = %err, "retrieval failed, answering without context");
                (RetrievalResult::default(), true)
            }
        };

        advance(&mut state, TurnState::Generating);
        let response = match self.generate_grounded(query, &context.chunks, options).await {
            Ok(text) => text,
            Err(RagError::ContextLengthExceeded(detail)) if !context.chunks.is_empty() => {
                // Shrink the context by half and retry exactly once.
                let keep = context.chunks.len() / 2;
                info!(detail = %detail, keep, "context too long, shrinking and retrying");
                context.chunks.truncate(keep);
                context.truncated = true;
                match self.generate_grounded(query, &context.chunks, options).await {
                    Ok(text) => text,
                    Err(err) => {
                        advance(&mut state, TurnState::GenerationFailed);
                        return Err(err);
                    }
                }
            }
            Err(err) => {
                advance(&mut state, TurnState::GenerationFailed);
                return Err(err);
            }
        };
        advance(&mut state, TurnState::Completed);

        let citations = context
            .chunks
            .iter()
            .map(|chunk| Citation {
                origin: chunk.metadata.origin.clone(),
                start_offset: chunk.metadata.start_offset,
                end_offset: chunk.metadata.end_offset,
            })
            .collect();

        Ok(ConversationTurn {
            query: query.to_string(),
            retrieved_context: context,
            response,
            provider_used: self.generator.model_name().to_string(),
            degraded,
            citations,
        })
    }

    /// Run generation through the retry policy. Exhausted transient
    /// retries become `GenerationUnavailable`; every other error passes
    /// through unchanged.
    async fn generate_grounded(
        &self,
        query: &str,
        chunks: &[RetrievedChunk],
        options: &GenerationOptions,
    ) -> Result<String> {
        let prompt = build_prompt(query, chunks);
        self.retry
            .run(|| {
                let prompt = prompt.clone();
                async move { self.generator.generate(&prompt, options).await }
            })
            .await
            .map_err(|err| match err {
                RagError::ProviderUnavailable(detail) => RagError::GenerationUnavailable(detail),
                other => other,
            })
    }

    // ============= Ingestion path =============

    /// Ingest one document: load, chunk, embed, store.
    ///
    /// A previous ingestion of the same origin is superseded: its entries
    /// are deleted before the new ones are written, and the report flags
    /// it. Any stage failure aborts this document and leaves prior data
    /// for other origins untouched.
    pub async fn add_document(
        &self,
        origin: &str,
        content_type: ContentType,
        bytes: &[u8],
    ) -> Result<IngestReport> {
        let document = self.loader.load(origin, content_type, bytes)?;
        let chunks: Vec<_> = self.chunker.chunk(&document).collect();
        let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
        let vectors = self.embedder.embed_batched(&texts).await?;

        let entries: Vec<VectorEntry> = chunks
            .into_iter()
            .zip(vectors)
            .map(|(chunk, vector)| VectorEntry {
                chunk_id: chunk.id,
                vector,
                text: chunk.text,
                metadata: ChunkMetadata {
                    document_id: document.id,
                    origin: document.origin.clone(),
                    start_offset: chunk.start_offset,
                    end_offset: chunk.end_offset,
                    sequence_index: chunk.sequence_index,
                    ingested_at: document.ingested_at,
                },
            })
            .collect();

        // Supersede only once the replacement is ready to write.
        let superseded = self.store.delete_by_origin(origin).await? > 0;
        let chunk_count = self.store.upsert(entries).await?;

        info!(
            origin,
            document_id = %document.id,
            chunk_count,
            superseded,
            "document ingested"
        );
        Ok(IngestReport {
            document_id: document.id,
            origin: document.origin,
            chunk_count,
            superseded,
        })
    }

    /// Ingest a batch, reporting per-item outcomes. One bad document never
    /// fails the batch.
    pub async fn add_documents(
        &self,
        items: Vec<(String, ContentType, Vec<u8>)>,
    ) -> Vec<(String, Result<IngestReport>)> {
        let mut reports = Vec::with_capacity(items.len());
        for (origin, content_type, bytes) in items {
            let report = self.add_document(&origin, content_type, &bytes).await;
            reports.push((origin, report));
        }
        reports
    }

    // ============= Introspection =============

    /// Describe the configured pipeline and the current collection.
    pub async fn pipeline_info(&self) -> Result<PipelineInfo> {
        let collection = self.store.collection_info().await?;
        Ok(PipelineInfo {
            chunk_size: self.chunker.target_length(),
            chunk_overlap: self.chunker.overlap(),
            top_k: self.retriever.config().top_k,
            context_budget_chars: self.retriever.config().context_budget_chars,
            embedding_model: self.embedder.model_identifier().to_string(),
            generation_model: self.generator.model_name().to_string(),
            collection,
        })
    }

    /// Probe every backend this pipeline depends on.
    pub async fn liveness(&self) -> Result<()> {
        self.embedder.liveness().await?;
        self.generator.liveness().await?;
        self.store.collection_info().await?;
        Ok(())
    }

    /// Persist store state where the backend supports it.
    pub async fn flush(&self) -> Result<()> {
        self.store.flush().await
    }
}

/// Assemble the grounded prompt: instruction, tagged context blocks in
/// rank order, then the raw user query.
fn build_prompt(query: &str, chunks: &[RetrievedChunk]) -> String {
    let mut prompt = String::from(INSTRUCTION);
    prompt.push_str("\n\nContext:\n");
    if chunks.is_empty() {
        prompt.push_str("(no context available)\n");
    }
    for (i, chunk) in chunks.iter().enumerate() {
        prompt.push_str(&format!(
            "[Source {}: {} (chars {}..{})]\n{}\n\n",
            i + 1,
            chunk.metadata.origin,
            chunk.metadata.start_offset,
            chunk.metadata.end_offset,
            chunk.text
        ));
    }
    prompt.push_str("\nAnswer the user's question based on the context provided.\n\nQuestion: ");
    prompt.push_str(query);
    prompt
}
