//! Embedding providers: text in, fixed-dimension vectors out.
//!
//! The [`EmbeddingProvider`] trait abstracts over hosted and local
//! embedding backends. Callers go through [`EmbeddingProvider::embed_batched`],
//! which validates inputs and splits work into bounded batches; backends
//! only implement the raw `embed` call for one batch.
//!
//! Provider calls hit the network or heavy local compute. They are the
//! main suspension points of the pipeline and must only be awaited from
//! contexts that tolerate blocking.

use crate::types::{RagError, Result};
use async_trait::async_trait;

/// Polymorphic embedding backend.
///
/// Contract: one vector per input text, order preserved, every vector of
/// [`EmbeddingProvider::dimension`] length for this provider instance.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed one batch of texts. Implementations may assume the batch is
    /// non-empty, within [`EmbeddingProvider::max_batch_size`], and free
    /// of empty strings; [`EmbeddingProvider::embed_batched`] enforces
    /// that.
    async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    /// Fixed output dimension of this provider instance.
    fn dimension(&self) -> usize;

    /// Identifier of the underlying model. Vector store collections are
    /// keyed by this; switching models requires a new collection.
    fn model_identifier(&self) -> &str;

    /// Upper bound on texts per backend call.
    fn max_batch_size(&self) -> usize {
        64
    }

    /// Reachability probe with no payload.
    async fn liveness(&self) -> Result<()>;

    /// Embed any number of texts, batching up to
    /// [`EmbeddingProvider::max_batch_size`] per backend call and
    /// preserving input order.
    ///
    /// Fails with `InvalidInput` if any text is empty or whitespace-only
    /// (such a chunk must be re-chunked, not silently skipped), and with
    /// `ProviderUnavailable` if the backend misbehaves.
    async fn embed_batched(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if let Some(pos) = texts.iter().position(|t| t.trim().is_empty()) {
            return Err(RagError::InvalidInput(format!(
                "text at index {} is empty; cannot embed",
                pos
            )));
        }

        let mut vectors = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.max_batch_size().max(1)) {
            let batch_vectors = self.embed(batch).await?;
            if batch_vectors.len() != batch.len() {
                return Err(RagError::ProviderUnavailable(format!(
                    "embedding backend returned {} vectors for {} inputs",
                    batch_vectors.len(),
                    batch.len()
                )));
            }
            for vector in &batch_vectors {
                if vector.len() != self.dimension() {
                    return Err(RagError::ProviderUnavailable(format!(
                        "embedding backend returned dimension {}, expected {}",
                        vector.len(),
                        self.dimension()
                    )));
                }
            }
            vectors.extend(batch_vectors);
        }
        Ok(vectors)
    }
}

/// Configuration for selecting an embedding backend at process start.
#[derive(Debug, Clone)]
pub enum EmbeddingBackend {
    /// Hosted OpenAI embeddings API (or a compatible endpoint).
    #[cfg(feature = "openai")]
    OpenAi {
        /// API key.
        api_key: String,
        /// API base URL.
        api_base: String,
        /// Embedding model, e.g. `text-embedding-3-small`.
        model: String,
        /// Requested output dimension.
        dimension: usize,
    },

    /// Local ONNX embedding model via fastembed.
    #[cfg(feature = "local-embeddings")]
    Fastembed,
}

impl EmbeddingBackend {
    /// Instantiate the configured provider.
    pub fn create_provider(&self) -> Result<std::sync::Arc<dyn EmbeddingProvider>> {
        match self {
            #[cfg(feature = "openai")]
            EmbeddingBackend::OpenAi {
                api_key,
                api_base,
                model,
                dimension,
            } => Ok(std::sync::Arc::new(openai::OpenAiEmbeddings::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
                *dimension,
            ))),

            #[cfg(feature = "local-embeddings")]
            EmbeddingBackend::Fastembed => Ok(std::sync::Arc::new(
                fastembed_local::FastembedEmbeddings::new()?,
            )),

            #[allow(unreachable_patterns)]
            _ => Err(RagError::Configuration(
                "embedding backend not enabled; check feature flags".into(),
            )),
        }
    }
}

#[cfg(feature = "openai")]
mod openai {
    use super::*;
    use async_openai::{
        config::OpenAIConfig,
        types::embeddings::{CreateEmbeddingRequestArgs, EmbeddingInput},
        Client,
    };

    /// Hosted embeddings via the OpenAI API.
    pub struct OpenAiEmbeddings {
        client: Client<OpenAIConfig>,
        model: String,
        dimension: usize,
    }

    impl OpenAiEmbeddings {
        /// Create a client for the given endpoint and model.
        pub fn new(api_key: String, api_base: String, model: String, dimension: usize) -> Self {
            let config = OpenAIConfig::new()
                .with_api_key(api_key)
                .with_api_base(api_base);
            Self {
                client: Client::with_config(config),
                model,
                dimension,
            }
        }
    }

    /// Classify an embeddings API error string. An input that exceeds the
    /// model's token limit is the caller's problem (the chunk must be
    /// re-chunked, retrying cannot help); everything else is transient.
    /// The SDK surfaces the API's error code inside the message, so match
    /// on substrings.
    pub(super) fn classify_embedding_error(message: String) -> RagError {
        let lower = message.to_ascii_lowercase();
        if lower.contains("context_length")
            || lower.contains("maximum context length")
            || lower.contains("token limit")
        {
            RagError::InvalidInput(message)
        } else {
            RagError::ProviderUnavailable(message)
        }
    }

    #[async_trait]
    impl EmbeddingProvider for OpenAiEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(EmbeddingInput::StringArray(texts.to_vec()))
                .dimensions(self.dimension as u32)
                .build()
                .map_err(|e| {
                    RagError::Configuration(format!("failed to build embedding request: {}", e))
                })?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(|e| {
                    classify_embedding_error(format!("OpenAI embeddings error: {}", e))
                })?;

            // The API tags each vector with its input index; return them
            // in input order.
            let mut data = response.data;
            data.sort_by_key(|d| d.index);
            Ok(data.into_iter().map(|d| d.embedding).collect())
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_identifier(&self) -> &str {
            &self.model
        }

        fn max_batch_size(&self) -> usize {
            // Well below the API's 2048-input cap; bounds request size.
            256
        }

        async fn liveness(&self) -> Result<()> {
            self.client.models().list().await.map_err(|e| {
                RagError::ProviderUnavailable(format!("OpenAI unreachable: {}", e))
            })?;
            Ok(())
        }
    }
}

#[cfg(feature = "local-embeddings")]
mod fastembed_local {
    use super::*;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use std::sync::{Arc, Mutex};

    const MODEL_ID: &str = "BAAI/bge-small-en-v1.5";
    const DIMENSION: usize = 384;

    /// Local BGE-small embeddings via fastembed (ONNX runtime).
    ///
    /// Inference is CPU-bound and synchronous, so calls run on the
    /// blocking thread pool. The model handle is behind a mutex because
    /// fastembed's `embed` takes `&mut self`.
    pub struct FastembedEmbeddings {
        model: Arc<Mutex<TextEmbedding>>,
    }

    impl FastembedEmbeddings {
        /// Load the model (downloads weights on first use).
        pub fn new() -> Result<Self> {
            let model = TextEmbedding::try_new(
                InitOptions::new(EmbeddingModel::BGESmallENV15).with_show_download_progress(false),
            )
            .map_err(|e| {
                RagError::ProviderUnavailable(format!("failed to load embedding model: {}", e))
            })?;
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
            })
        }
    }

    #[async_trait]
    impl EmbeddingProvider for FastembedEmbeddings {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let model = Arc::clone(&self.model);
            let texts = texts.to_vec();
            tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| RagError::ProviderUnavailable("embedding model poisoned".into()))?;
                model
                    .embed(texts, None)
                    .map_err(|e| RagError::ProviderUnavailable(format!("fastembed error: {}", e)))
            })
            .await
            .map_err(|e| RagError::ProviderUnavailable(format!("embedding task failed: {}", e)))?
        }

        fn dimension(&self) -> usize {
            DIMENSION
        }

        fn model_identifier(&self) -> &str {
            MODEL_ID
        }

        fn max_batch_size(&self) -> usize {
            // Keeps peak memory of a single ONNX batch modest.
            32
        }

        async fn liveness(&self) -> Result<()> {
            // Local model: loaded means reachable.
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Test backend that records batch sizes and embeds each text as a
    /// two-dimensional vector derived from its length.
    struct RecordingProvider {
        calls: AtomicUsize,
        max_seen: AtomicUsize,
    }

    impl RecordingProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                max_seen: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for RecordingProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.max_seen.fetch_max(texts.len(), Ordering::SeqCst);
            Ok(texts
                .iter()
                .map(|t| vec![t.len() as f32, 1.0])
                .collect())
        }

        fn dimension(&self) -> usize {
            2
        }

        fn model_identifier(&self) -> &str {
            "recording-test-model"
        }

        fn max_batch_size(&self) -> usize {
            4
        }

        async fn liveness(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn batches_respect_max_batch_size_and_order() {
        let provider = RecordingProvider::new();
        let texts: Vec<String> = (1..=10).map(|i| "x".repeat(i)).collect();

        let vectors = provider.embed_batched(&texts).await.unwrap();

        assert_eq!(vectors.len(), 10);
        // Order preserved: vector i encodes length i+1.
        for (i, v) in vectors.iter().enumerate() {
            assert_eq!(v[0], (i + 1) as f32);
        }
        // 10 inputs with batch size 4 -> 3 calls, none larger than 4.
        assert_eq!(provider.calls.load(Ordering::SeqCst), 3);
        assert!(provider.max_seen.load(Ordering::SeqCst) <= 4);
    }

    #[tokio::test]
    async fn empty_text_is_rejected() {
        let provider = RecordingProvider::new();
        let texts = vec!["fine".to_string(), "  ".to_string()];
        let err = provider.embed_batched(&texts).await.unwrap_err();
        assert!(matches!(err, RagError::InvalidInput(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn empty_input_slice_is_fine() {
        let provider = RecordingProvider::new();
        let vectors = provider.embed_batched(&[]).await.unwrap();
        assert!(vectors.is_empty());
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
    }

    /// Backend that lies about its output count.
    struct ShortProvider;

    #[async_trait]
    impl EmbeddingProvider for ShortProvider {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(vec![vec![1.0, 2.0]])
        }
        fn dimension(&self) -> usize {
            2
        }
        fn model_identifier(&self) -> &str {
            "short"
        }
        async fn liveness(&self) -> Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn count_mismatch_is_a_provider_error() {
        let texts = vec!["a".to_string(), "b".to_string()];
        let err = ShortProvider.embed_batched(&texts).await.unwrap_err();
        assert!(matches!(err, RagError::ProviderUnavailable(_)));
    }

    #[cfg(feature = "openai")]
    #[test]
    fn over_limit_embedding_input_is_invalid_not_transient() {
        let err = super::openai::classify_embedding_error(
            "OpenAI embeddings error: This model's maximum context length is 8192 tokens".into(),
        );
        assert!(matches!(err, RagError::InvalidInput(_)));
        assert!(!err.is_retryable());

        let err = super::openai::classify_embedding_error("code: context_length_exceeded".into());
        assert!(matches!(err, RagError::InvalidInput(_)));

        let err = super::openai::classify_embedding_error("connection reset by peer".into());
        assert!(matches!(err, RagError::ProviderUnavailable(_)));
        assert!(err.is_retryable());
    }
}
