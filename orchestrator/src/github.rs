//! GitHub repository source
//!
//! Unauthenticated REST access to one public repository: the recursive git
//! tree from the API and file bodies from the raw content host.

use agent::config::GitHubSectionConfig;
use anyhow::Result;
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

use crate::scratchpad::FILE_FETCH_FAILED;
use crate::services::{FileContent, RepoSource, TreeEntry};

/// Errors from the GitHub source
#[derive(Error, Debug)]
pub enum GitHubError {
    #[error("invalid GitHub repository URL '{0}'")]
    InvalidRepoUrl(String),

    #[error("{requested} files requested, at most {max} per request")]
    TooManyFiles { requested: usize, max: usize },

    #[error("GitHub request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("GitHub API error {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
}

/// Owner and name of a repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub repo: String,
}

/// Parse `https://github.com/{owner}/{repo}` (with or without scheme,
/// trailing slash, `.git` suffix or deeper path)
pub fn parse_repo_url(repo_url: &str) -> Result<RepoRef, GitHubError> {
    let invalid = || GitHubError::InvalidRepoUrl(repo_url.to_string());
    let trimmed = repo_url.trim();
    let with_scheme = if trimmed.contains("://") {
        trimmed.to_string()
    } else {
        format!("https://{}", trimmed)
    };

    let url = Url::parse(&with_scheme).map_err(|_| invalid())?;
    match url.host_str() {
        Some("github.com") | Some("www.github.com") => {}
        _ => return Err(invalid()),
    }

    let mut segments = url
        .path_segments()
        .ok_or_else(invalid)?
        .filter(|s| !s.is_empty());
    let owner = segments.next().ok_or_else(invalid)?;
    let repo = segments.next().ok_or_else(invalid)?;
    let repo = repo.strip_suffix(".git").unwrap_or(repo);
    if repo.is_empty() {
        return Err(invalid());
    }

    Ok(RepoRef {
        owner: owner.to_string(),
        repo: repo.to_string(),
    })
}

#[derive(Debug, Deserialize)]
struct TreeResponse {
    tree: Vec<GitTreeItem>,
    #[serde(default)]
    truncated: bool,
}

#[derive(Debug, Deserialize)]
struct GitTreeItem {
    path: String,
    #[serde(rename = "type")]
    kind: String,
}

fn tree_entries(response: TreeResponse) -> Vec<TreeEntry> {
    response
        .tree
        .into_iter()
        .filter_map(|item| match item.kind.as_str() {
            "blob" => Some(TreeEntry::file(item.path)),
            "tree" => Some(TreeEntry::dir(item.path)),
            // Submodule commits have no readable content
            _ => None,
        })
        .collect()
}

/// GitHub REST implementation of [`RepoSource`]
pub struct GitHubRepoSource {
    client: Client,
    config: GitHubSectionConfig,
}

impl GitHubRepoSource {
    pub fn new(config: GitHubSectionConfig) -> Result<Self, GitHubError> {
        let client = Client::builder().user_agent(&config.user_agent).build()?;
        Ok(Self { client, config })
    }

    fn tree_url(&self, repo: &RepoRef) -> String {
        format!(
            "{}/repos/{}/{}/git/trees/{}?recursive=1",
            self.config.api_base.trim_end_matches('/'),
            repo.owner,
            repo.repo,
            self.config.branch
        )
    }

    fn raw_url(&self, repo: &RepoRef, path: &str) -> String {
        format!(
            "{}/{}/{}/{}/{}",
            self.config.raw_base.trim_end_matches('/'),
            repo.owner,
            repo.repo,
            self.config.branch,
            path.trim_start_matches('/')
        )
    }

    async fn fetch_tree(&self, repo: &RepoRef) -> Result<Vec<TreeEntry>, GitHubError> {
        let response = self
            .client
            .get(self.tree_url(repo))
            .header("Accept", "application/vnd.github+json")
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Status { status, body });
        }

        let tree: TreeResponse = response.json().await?;
        if tree.truncated {
            tracing::warn!(owner = %repo.owner, repo = %repo.repo, "GitHub truncated the tree listing");
        }
        Ok(tree_entries(tree))
    }

    async fn fetch_file(&self, repo: &RepoRef, path: &str) -> Result<String, GitHubError> {
        let response = self.client.get(self.raw_url(repo, path)).send().await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(GitHubError::Status { status, body });
        }
        Ok(response.text().await?)
    }
}

#[async_trait]
impl RepoSource for GitHubRepoSource {
    async fn get_repo_tree(&self, repo_url: &str) -> Result<Vec<TreeEntry>> {
        let repo = parse_repo_url(repo_url)?;
        tracing::debug!(owner = %repo.owner, repo = %repo.repo, "Fetching repository tree");
        Ok(self.fetch_tree(&repo).await?)
    }

    async fn get_files_content(&self, repo_url: &str, paths: &[String]) -> Result<Vec<FileContent>> {
        if paths.len() > self.config.max_files {
            return Err(GitHubError::TooManyFiles {
                requested: paths.len(),
                max: self.config.max_files,
            }
            .into());
        }
        let repo = parse_repo_url(repo_url)?;

        let fetches = paths.iter().map(|path| {
            let repo = &repo;
            async move {
                let content = match self.fetch_file(repo, path).await {
                    Ok(content) => content,
                    Err(e) => {
                        tracing::warn!(path = %path, error = %e, "Could not fetch file content");
                        FILE_FETCH_FAILED.to_string()
                    }
                };
                FileContent::new(path.clone(), content)
            }
        });

        Ok(join_all(fetches).await)
    }
}
