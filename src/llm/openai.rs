//! OpenAI chat-completions backend.

use crate::llm::client::{GenerationOptions, GenerationProvider};
use crate::types::{RagError, Result};
use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestUserMessage,
        CreateChatCompletionRequestArgs, FinishReason, StopConfiguration as Stop,
    },
    Client,
};
use async_trait::async_trait;

/// Hosted generation via the OpenAI API (or a compatible endpoint).
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAiClient {
    /// Create a client for the given endpoint and model.
    pub fn new(api_key: String, api_base: String, model: String) -> Self {
        let config = OpenAIConfig::new()
            .with_api_key(api_key)
            .with_api_base(api_base);
        Self {
            client: Client::with_config(config),
            model,
        }
    }
}

/// Classify an API error string into the pipeline taxonomy. The OpenAI
/// error body carries a machine-readable code, but the SDK surfaces it
/// inside the message, so match on substrings.
fn classify_error(message: String) -> RagError {
    let lower = message.to_ascii_lowercase();
    if lower.contains("context_length") || lower.contains("maximum context length") {
        RagError::ContextLengthExceeded(message)
    } else if lower.contains("content_filter") || lower.contains("content policy") {
        RagError::ContentPolicyRejected(message)
    } else {
        RagError::ProviderUnavailable(message)
    }
}

#[async_trait]
impl GenerationProvider for OpenAiClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        options.validate()?;

        let mut request = CreateChatCompletionRequestArgs::default();
        request
            .model(&self.model)
            .messages(vec![ChatCompletionRequestMessage::User(
                ChatCompletionRequestUserMessage::from(prompt.to_string()),
            )])
            .temperature(options.temperature)
            .max_completion_tokens(options.max_tokens);
        if !options.stop_sequences.is_empty() {
            request.stop(Stop::StringArray(options.stop_sequences.clone()));
        }
        let request = request.build().map_err(|e| {
            RagError::Configuration(format!("failed to build chat request: {}", e))
        })?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| classify_error(format!("OpenAI API error: {}", e)))?;

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| RagError::ProviderUnavailable("no choices from OpenAI".into()))?;

        if choice.finish_reason == Some(FinishReason::ContentFilter) {
            return Err(RagError::ContentPolicyRejected(
                "response flagged by content filter".into(),
            ));
        }

        choice
            .message
            .content
            .ok_or_else(|| RagError::ProviderUnavailable("empty response from OpenAI".into()))
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn liveness(&self) -> Result<()> {
        self.client
            .models()
            .list()
            .await
            .map_err(|e| RagError::ProviderUnavailable(format!("OpenAI unreachable: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_context_length_errors() {
        let err = classify_error(
            "OpenAI API error: This model's maximum context length is 8192 tokens".into(),
        );
        assert!(matches!(err, RagError::ContextLengthExceeded(_)));

        let err = classify_error("code: context_length_exceeded".into());
        assert!(matches!(err, RagError::ContextLengthExceeded(_)));
    }

    #[test]
    fn classifies_policy_errors() {
        let err = classify_error("rejected by content policy".into());
        assert!(matches!(err, RagError::ContentPolicyRejected(_)));
    }

    #[test]
    fn everything_else_is_transient() {
        let err = classify_error("connection reset by peer".into());
        assert!(matches!(err, RagError::ProviderUnavailable(_)));
        assert!(err.is_retryable());
    }
}
