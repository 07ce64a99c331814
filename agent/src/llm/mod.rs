//! LLM abstraction layer

mod json;
mod ollama;

pub use json::{extract_json, parse_json};
pub use ollama::{list_models, ModelInfo, OllamaClient};

use anyhow::Result;
use async_trait::async_trait;

/// Trait for LLM backends
///
/// Every orchestration collaborator talks to a model through a single
/// prompt-in, text-out call.
#[async_trait]
pub trait Llm: Send + Sync {
    /// Send a single prompt and get the raw text response
    async fn chat(&self, message: &str) -> Result<String>;

    /// Get the model name
    fn model(&self) -> &str;
}
