//! LLM-backed synthesizer

use agent::llm::{extract_json, Llm};
use anyhow::{bail, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;

use crate::artifact::{Artifact, MediaKind};
use crate::prompts;
use crate::services::Synthesizer;

/// Name given to a reply that is not a JSON artifact list
pub const FALLBACK_ARTIFACT_NAME: &str = "output.txt";

#[derive(Deserialize)]
struct RawArtifact {
    name: String,
    #[serde(default)]
    content: String,
    #[serde(default, rename = "mediaKind", alias = "media_kind")]
    media_kind: Option<String>,
}

impl From<RawArtifact> for Artifact {
    fn from(raw: RawArtifact) -> Self {
        let kind = raw.media_kind.as_deref().and_then(MediaKind::parse);
        let artifact = Artifact::new(raw.name, raw.content);
        match kind {
            Some(kind) => artifact.with_kind(kind),
            None => artifact,
        }
    }
}

/// Parse a synthesizer reply into artifacts.
///
/// A JSON array becomes one artifact per element; anything else becomes a
/// single plain-text artifact holding the whole reply.
pub fn parse_artifacts(reply: &str) -> Result<Vec<Artifact>> {
    let parsed = extract_json(reply)
        .filter(|json| json.starts_with('['))
        .and_then(|json| serde_json::from_str::<Vec<RawArtifact>>(json).ok());

    match parsed {
        Some(raw) if raw.is_empty() => bail!("synthesizer returned an empty artifact list"),
        Some(raw) => Ok(raw.into_iter().map(Artifact::from).collect()),
        None => Ok(vec![
            Artifact::new(FALLBACK_ARTIFACT_NAME, reply).with_kind(MediaKind::PlainText)
        ]),
    }
}

/// Asks a model for the final deliverables
pub struct LlmSynthesizer {
    llm: Arc<dyn Llm>,
}

impl LlmSynthesizer {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl Synthesizer for LlmSynthesizer {
    async fn synthesize_artifacts(&self, scratchpad: &str) -> Result<Vec<Artifact>> {
        let prompt = prompts::render(prompts::SYNTHESIZER_PROMPT, &[("scratchpad", scratchpad)]);
        let reply = self.llm.chat(&prompt).await?;
        parse_artifacts(&reply)
    }
}
