//! Deterministic file selector

use anyhow::Result;
use async_trait::async_trait;

use crate::plan::PlanStep;
use crate::services::{FileSelector, TreeEntry};
use crate::tools::MAX_SELECTED_FILES;

/// Extensions tried first, in rank order
const PREFERRED_EXTENSIONS: [&str; 6] = [".md", ".tsx", ".ts", ".js", ".jsx", ".json"];

/// Picks files by extension rank, keeping tree order within a rank
pub struct HeuristicFileSelector {
    max_files: usize,
}

impl Default for HeuristicFileSelector {
    fn default() -> Self {
        Self {
            max_files: MAX_SELECTED_FILES,
        }
    }
}

impl HeuristicFileSelector {
    pub fn new(max_files: usize) -> Self {
        Self {
            max_files: max_files.min(MAX_SELECTED_FILES),
        }
    }

    fn rank(path: &str) -> usize {
        let lower = path.to_lowercase();
        PREFERRED_EXTENSIONS
            .iter()
            .position(|ext| lower.ends_with(ext))
            .unwrap_or(PREFERRED_EXTENSIONS.len())
    }

    /// Selection without the async wrapper
    pub fn select(&self, tree: &[TreeEntry]) -> Vec<String> {
        let mut files: Vec<&TreeEntry> = tree.iter().filter(|e| e.is_file()).collect();
        // sort_by_key is stable
        files.sort_by_key(|e| Self::rank(&e.path));
        files
            .into_iter()
            .take(self.max_files)
            .map(|e| e.path.clone())
            .collect()
    }
}

#[async_trait]
impl FileSelector for HeuristicFileSelector {
    async fn select_files(
        &self,
        tree: &[TreeEntry],
        _scratchpad: &str,
        step: &PlanStep,
    ) -> Result<Vec<String>> {
        let files = self.select(tree);
        tracing::debug!(step = step.ordinal, selected = files.len(), "Heuristic file selection");
        Ok(files)
    }
}
