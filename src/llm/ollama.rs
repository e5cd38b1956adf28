//! Ollama local-inference backend.

use crate::llm::client::{GenerationOptions, GenerationProvider};
use crate::types::{RagError, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    models::ModelOptions,
    Ollama,
};

/// Local generation via an Ollama server.
pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    /// Create a client for the given server URL and model.
    pub fn new(base_url: &str, model: String) -> Self {
        let (host, port) = parse_base_url(base_url);
        Self {
            client: Ollama::new(host, port),
            model,
        }
    }
}

/// Split `scheme://host:port` into host and port, defaulting to the
/// standard Ollama port.
fn parse_base_url(base_url: &str) -> (String, u16) {
    let without_scheme = base_url
        .split_once("://")
        .map(|(_, rest)| rest)
        .unwrap_or(base_url);
    match without_scheme.split_once(':') {
        Some((host, port)) => (
            host.to_string(),
            port.trim_end_matches('/').parse().unwrap_or(11434),
        ),
        None => (without_scheme.trim_end_matches('/').to_string(), 11434),
    }
}

#[async_trait]
impl GenerationProvider for OllamaClient {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<String> {
        options.validate()?;

        let mut model_options = ModelOptions::default()
            .temperature(options.temperature)
            .num_predict(options.max_tokens as i32);
        if !options.stop_sequences.is_empty() {
            model_options = model_options.stop(options.stop_sequences.clone());
        }

        let request =
            ChatMessageRequest::new(self.model.clone(), vec![ChatMessage::user(prompt.to_string())])
                .options(model_options);

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| RagError::ProviderUnavailable(format!("Ollama error: {}", e)))?;

        Ok(response.message.content)
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    async fn liveness(&self) -> Result<()> {
        self.client
            .list_local_models()
            .await
            .map_err(|e| RagError::ProviderUnavailable(format!("Ollama unreachable: {}", e)))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_url() {
        assert_eq!(
            parse_base_url("http://localhost:11434"),
            ("localhost".to_string(), 11434)
        );
    }

    #[test]
    fn parses_url_without_port() {
        assert_eq!(
            parse_base_url("http://ollama.internal"),
            ("ollama.internal".to_string(), 11434)
        );
    }

    #[test]
    fn parses_custom_port() {
        assert_eq!(
            parse_base_url("http://192.168.1.100:8080"),
            ("192.168.1.100".to_string(), 8080)
        );
    }

    #[test]
    fn bad_port_falls_back_to_default() {
        assert_eq!(parse_base_url("host:abc"), ("host".to_string(), 11434));
    }
}
