//! SCM boundary: one narrow capability set (list / diff / comment / merge)
//! behind an enum, so the pipeline never names a concrete provider and
//! tests swap in the scripted fake.

pub mod diff;
pub mod fake;
pub mod gitea;
pub mod types;

use std::time::Duration;

use tracing::debug;

pub use fake::{FakeScm, MergeCall, PostedComment};
pub use gitea::GiteaClient;
pub use types::{
    DiffHunk, DiffLine, FileChange, MergeOutcome, RepoId, ReviewKey, ReviewRequest, TriggerAction,
};

use crate::{config::ConfigSnapshot, errors::ScmError};

/// Concrete SCM backends. Plain enum dispatch; no boxed trait objects.
#[derive(Debug, Clone)]
pub enum ScmClient {
    Gitea(GiteaClient),
    Fake(FakeScm),
}

impl ScmClient {
    /// Constructs the Gitea backend from the active snapshot.
    pub fn gitea(cfg: &ConfigSnapshot) -> Result<Self, ScmError> {
        debug!(url = %cfg.scm.url, "initializing gitea client");
        let http = reqwest::Client::builder()
            .user_agent("review-gate/0.1")
            .timeout(Duration::from_secs(cfg.runtime.scm_timeout_secs))
            .build()?;
        Ok(Self::Gitea(GiteaClient::new(
            http,
            &cfg.scm.url,
            cfg.scm.token.clone(),
        )))
    }

    pub async fn list_changed_files(
        &self,
        repo: &RepoId,
        pr: u64,
    ) -> Result<Vec<String>, ScmError> {
        match self {
            Self::Gitea(c) => c.list_changed_files(repo, pr).await,
            Self::Fake(c) => c.list_changed_files(repo, pr).await,
        }
    }

    pub async fn get_diff(
        &self,
        repo: &RepoId,
        pr: u64,
        path: &str,
        head_sha: &str,
        context_window: u32,
    ) -> Result<FileChange, ScmError> {
        match self {
            Self::Gitea(c) => c.get_diff(repo, pr, path, head_sha, context_window).await,
            Self::Fake(c) => c.get_diff(repo, pr, path).await,
        }
    }

    pub async fn post_comment(&self, repo: &RepoId, pr: u64, text: &str) -> Result<(), ScmError> {
        match self {
            Self::Gitea(c) => c.post_comment(repo, pr, text).await,
            Self::Fake(c) => c.post_comment(repo, pr, text).await,
        }
    }

    pub async fn merge(
        &self,
        repo: &RepoId,
        pr: u64,
        expected_head_sha: &str,
    ) -> Result<MergeOutcome, ScmError> {
        match self {
            Self::Gitea(c) => c.merge(repo, pr, expected_head_sha).await,
            Self::Fake(c) => c.merge(repo, pr, expected_head_sha).await,
        }
    }
}
