//! Deliverables produced by synthesis

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Broad content type of an artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MediaKind {
    Markdown,
    Code,
    Data,
    Image,
    Video,
    PlainText,
}

impl MediaKind {
    /// Infer the kind from a file name's extension
    pub fn from_file_name(name: &str) -> Self {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .unwrap_or_default();

        match ext.as_str() {
            "md" | "markdown" => MediaKind::Markdown,
            "rs" | "py" | "js" | "jsx" | "ts" | "tsx" | "java" | "go" | "c" | "h" | "cpp"
            | "hpp" | "cs" | "rb" | "php" | "swift" | "kt" | "sh" | "html" | "css" | "sql" => {
                MediaKind::Code
            }
            "json" | "csv" | "tsv" | "xml" | "yaml" | "yml" | "toml" => MediaKind::Data,
            "png" | "jpg" | "jpeg" | "gif" | "svg" | "webp" => MediaKind::Image,
            "mp4" | "webm" | "mov" => MediaKind::Video,
            _ => MediaKind::PlainText,
        }
    }

    /// Parse a kind name as written by a model ("plain-text", "Markdown", ...)
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_lowercase().replace(['_', ' '], "-").as_str() {
            "markdown" => Some(MediaKind::Markdown),
            "code" => Some(MediaKind::Code),
            "data" => Some(MediaKind::Data),
            "image" => Some(MediaKind::Image),
            "video" => Some(MediaKind::Video),
            "plain-text" | "text" | "plaintext" => Some(MediaKind::PlainText),
            _ => None,
        }
    }
}

/// One named output file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub content: String,
    #[serde(rename = "mediaKind")]
    pub media_kind: MediaKind,
}

impl Artifact {
    /// Create an artifact, inferring its kind from the name
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            media_kind: MediaKind::from_file_name(&name),
            name,
            content: content.into(),
        }
    }

    pub fn with_kind(mut self, kind: MediaKind) -> Self {
        self.media_kind = kind;
        self
    }

    /// File name safe to create inside an output directory
    pub fn file_name(&self) -> String {
        let cleaned: String = self
            .name
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        let cleaned = cleaned.trim_start_matches('.');
        if cleaned.is_empty() {
            "artifact.txt".to_string()
        } else {
            cleaned.to_string()
        }
    }
}

/// Write artifacts into `dir`, returning the created paths
pub fn write_artifacts(dir: &Path, artifacts: &[Artifact]) -> Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create output directory: {}", dir.display()))?;

    artifacts
        .iter()
        .map(|artifact| {
            let path = dir.join(artifact.file_name());
            std::fs::write(&path, &artifact.content)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            Ok(path)
        })
        .collect()
}
