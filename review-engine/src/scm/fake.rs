//! In-memory SCM backend for tests: serves staged files/diffs and records
//! every comment and merge attempt for assertions.

use std::{collections::HashMap, collections::VecDeque, sync::Arc};

use tokio::sync::Mutex;

use crate::{
    errors::ScmError,
    scm::types::{FileChange, MergeOutcome, RepoId},
};

/// A comment the pipeline posted, as the fake recorded it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostedComment {
    pub repo: String,
    pub pr: u64,
    pub body: String,
}

/// A merge attempt the pipeline made.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeCall {
    pub repo: String,
    pub pr: u64,
    pub expected_head_sha: String,
}

#[derive(Debug, Default)]
struct FakeState {
    /// "owner/name#pr" → changed paths.
    files: HashMap<String, Vec<String>>,
    /// ("owner/name#pr", path) → staged per-file change.
    changes: HashMap<(String, String), FileChange>,
    /// Scripted merge outcomes per PR; empty queue answers `Merged`.
    merge_results: HashMap<String, VecDeque<MergeOutcome>>,
    comments: Vec<PostedComment>,
    merges: Vec<MergeCall>,
}

/// Scripted SCM double. Clones share state, so a test can keep a handle
/// while the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct FakeScm {
    state: Arc<Mutex<FakeState>>,
}

impl FakeScm {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn stage_files(&self, repo: &RepoId, pr: u64, paths: &[&str]) {
        let mut state = self.state.lock().await;
        state
            .files
            .insert(pr_key(repo, pr), paths.iter().map(|p| p.to_string()).collect());
    }

    pub async fn stage_change(&self, repo: &RepoId, pr: u64, change: FileChange) {
        let mut state = self.state.lock().await;
        state
            .changes
            .insert((pr_key(repo, pr), change.path.clone()), change);
    }

    pub async fn push_merge_result(&self, repo: &RepoId, pr: u64, outcome: MergeOutcome) {
        let mut state = self.state.lock().await;
        state
            .merge_results
            .entry(pr_key(repo, pr))
            .or_default()
            .push_back(outcome);
    }

    pub async fn comments(&self) -> Vec<PostedComment> {
        self.state.lock().await.comments.clone()
    }

    pub async fn merges(&self) -> Vec<MergeCall> {
        self.state.lock().await.merges.clone()
    }

    pub(crate) async fn list_changed_files(
        &self,
        repo: &RepoId,
        pr: u64,
    ) -> Result<Vec<String>, ScmError> {
        let state = self.state.lock().await;
        Ok(state.files.get(&pr_key(repo, pr)).cloned().unwrap_or_default())
    }

    pub(crate) async fn get_diff(
        &self,
        repo: &RepoId,
        pr: u64,
        path: &str,
    ) -> Result<FileChange, ScmError> {
        let state = self.state.lock().await;
        Ok(state
            .changes
            .get(&(pr_key(repo, pr), path.to_string()))
            .cloned()
            .unwrap_or_else(|| FileChange {
                path: path.to_string(),
                hunks: Vec::new(),
            }))
    }

    pub(crate) async fn post_comment(
        &self,
        repo: &RepoId,
        pr: u64,
        text: &str,
    ) -> Result<(), ScmError> {
        let mut state = self.state.lock().await;
        state.comments.push(PostedComment {
            repo: repo.to_string(),
            pr,
            body: text.to_string(),
        });
        Ok(())
    }

    pub(crate) async fn merge(
        &self,
        repo: &RepoId,
        pr: u64,
        expected_head_sha: &str,
    ) -> Result<MergeOutcome, ScmError> {
        let mut state = self.state.lock().await;
        state.merges.push(MergeCall {
            repo: repo.to_string(),
            pr,
            expected_head_sha: expected_head_sha.to_string(),
        });
        let outcome = state
            .merge_results
            .get_mut(&pr_key(repo, pr))
            .and_then(|q| q.pop_front())
            .unwrap_or(MergeOutcome::Merged);
        Ok(outcome)
    }
}

fn pr_key(repo: &RepoId, pr: u64) -> String {
    format!("{repo}#{pr}")
}
