//! Ollama LLM implementation

use anyhow::{Context, Result};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage},
    Ollama,
};
use serde::{Deserialize, Serialize};

use super::Llm;

const FALLBACK_URL: &str = "http://localhost:11434";
const DEFAULT_PORT: u16 = 11434;

/// Information about an available model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub name: String,
    pub size: u64,
    pub modified_at: String,
}

#[derive(Debug, Deserialize)]
struct OllamaTagsResponse {
    models: Vec<ModelInfo>,
}

fn parse_base_url(ollama_url: &str) -> Result<url::Url> {
    match url::Url::parse(ollama_url) {
        Ok(url) => Ok(url),
        Err(e) => {
            tracing::warn!(url = %ollama_url, error = %e, "Invalid Ollama URL, using {}", FALLBACK_URL);
            url::Url::parse(FALLBACK_URL).context("parse fallback Ollama URL")
        }
    }
}

/// List available models from Ollama
pub async fn list_models(ollama_url: &str) -> Result<Vec<ModelInfo>> {
    let base = parse_base_url(ollama_url)?;
    let api_url = base.join("api/tags").context("build Ollama tags URL")?;

    let response: OllamaTagsResponse = reqwest::Client::new()
        .get(api_url)
        .send()
        .await?
        .error_for_status()?
        .json()
        .await?;

    Ok(response.models)
}

/// Ollama client wrapper
pub struct OllamaClient {
    client: Ollama,
    model: String,
}

impl OllamaClient {
    /// Create a new Ollama client
    pub fn new(url: &str, model: &str) -> Result<Self> {
        let url = parse_base_url(url)?;
        let host = url.host_str().unwrap_or("localhost");
        let port = url.port().unwrap_or(DEFAULT_PORT);

        Ok(Self {
            client: Ollama::new(format!("{}://{}", url.scheme(), host), port),
            model: model.to_string(),
        })
    }
}

#[async_trait]
impl Llm for OllamaClient {
    async fn chat(&self, message: &str) -> Result<String> {
        let request = ChatMessageRequest::new(
            self.model.clone(),
            vec![ChatMessage::user(message.to_string())],
        );

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .with_context(|| format!("Ollama chat request failed (model {})", self.model))?;

        Ok(response.message.content)
    }

    fn model(&self) -> &str {
        &self.model
    }
}
