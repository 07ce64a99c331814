//! JSON extraction from free-form model replies
//!
//! Models asked for "JSON only" still wrap answers in markdown fences or add
//! a sentence before the payload. These helpers find the payload.

use std::sync::LazyLock;

use anyhow::{anyhow, Result};
use regex::Regex;
use serde::de::DeserializeOwned;

static FENCED_JSON: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"```(?:json|JSON)?\s*([\[{][\s\S]*?[\]}])\s*```").expect("valid fenced JSON regex")
});

/// Locate the JSON payload in a model reply.
///
/// Prefers a fenced code block; otherwise takes the span from the first `[`
/// or `{` to the last matching closer.
pub fn extract_json(text: &str) -> Option<&str> {
    if let Some(caps) = FENCED_JSON.captures(text) {
        return caps.get(1).map(|m| m.as_str());
    }

    let trimmed = text.trim();
    let start = trimmed.find(['[', '{'])?;
    let closer = if trimmed[start..].starts_with('[') { ']' } else { '}' };
    let end = trimmed.rfind(closer)?;
    (end > start).then(|| &trimmed[start..=end])
}

/// Extract and deserialize the JSON payload of a model reply.
pub fn parse_json<T: DeserializeOwned>(text: &str) -> Result<T> {
    let payload = extract_json(text).ok_or_else(|| anyhow!("no JSON found in model reply"))?;
    serde_json::from_str(payload).map_err(|e| anyhow!("invalid JSON in model reply: {}", e))
}
