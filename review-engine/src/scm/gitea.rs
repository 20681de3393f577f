//! Gitea backend (REST v1) for PR files, diffs, comments and merges.
//!
//! Endpoints used (as of 2025):
//! - GET  /repos/:owner/:repo/pulls/:index/files   (paged changed-file list)
//! - GET  /repos/:owner/:repo/pulls/:index.diff    (whole-PR unified diff)
//! - GET  /repos/:owner/:repo/raw/:path?ref=:sha   (file content at head)
//! - POST /repos/:owner/:repo/issues/:index/comments
//! - POST /repos/:owner/:repo/pulls/:index/merge

use std::{collections::HashMap, sync::Arc};

use reqwest::{Client, StatusCode};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::{
    errors::ScmError,
    scm::{
        diff::{FilePatch, parse_pr_diff, widen_hunks},
        types::{FileChange, MergeOutcome, RepoId},
    },
};

const PAGE_LIMIT: usize = 50;

/// Parsed whole-PR diff pinned to the head SHA it was fetched at.
type CachedDiff = (String, Arc<Vec<FilePatch>>);

#[derive(Debug, Clone)]
pub struct GiteaClient {
    http: Client,
    base_api: String, // e.g. "https://git.example.com/api/v1"
    token: String,    // "Authorization: token …"
    // One PR diff is fetched once per reviewed head and served per file.
    diffs: Arc<Mutex<HashMap<String, CachedDiff>>>,
}

impl GiteaClient {
    /// Constructs a Gitea client with a shared reqwest instance and auth token.
    /// `base_url` is the instance root; the API prefix is appended here.
    pub fn new(http: Client, base_url: &str, token: String) -> Self {
        Self {
            http,
            base_api: format!("{}/api/v1", base_url.trim_end_matches('/')),
            token,
            diffs: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Lists the paths changed by the PR, walking all pages.
    pub async fn list_changed_files(
        &self,
        repo: &RepoId,
        pr: u64,
    ) -> Result<Vec<String>, ScmError> {
        let mut paths = Vec::new();
        let mut page = 1u32;
        loop {
            let url = format!(
                "{}/repos/{}/{}/pulls/{}/files?page={}&limit={}",
                self.base_api,
                urlencoding::encode(&repo.owner),
                urlencoding::encode(&repo.name),
                pr,
                page,
                PAGE_LIMIT
            );
            let batch: Vec<PrFileEntry> = self
                .http
                .get(url)
                .header("Authorization", self.auth())
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;

            let fetched = batch.len();
            paths.extend(batch.into_iter().map(|f| f.filename));
            if fetched < PAGE_LIMIT {
                return Ok(paths);
            }
            page += 1;
        }
    }

    /// Returns one file's hunks widened with up to `context_window` unchanged
    /// lines per side, pulled from the file content at `head_sha`.
    pub async fn get_diff(
        &self,
        repo: &RepoId,
        pr: u64,
        path: &str,
        head_sha: &str,
        context_window: u32,
    ) -> Result<FileChange, ScmError> {
        let patches = self.pr_patches(repo, pr, head_sha).await?;
        let Some(patch) = patches.iter().find(|p| p.path == path) else {
            // Listed but absent from the textual diff (e.g. pure rename).
            return Ok(FileChange {
                path: path.to_string(),
                hunks: Vec::new(),
            });
        };

        // Binary patches carry no hunks; deleted files have no head content
        // to widen against.
        if patch.binary || patch.deleted || patch.hunks.is_empty() {
            return Ok(FileChange {
                path: path.to_string(),
                hunks: patch.hunks.clone(),
            });
        }

        let hunks = match self.file_at(repo, path, head_sha).await? {
            Some(content) => {
                let lines: Vec<&str> = content.lines().collect();
                widen_hunks(&patch.hunks, &lines, context_window)
            }
            None => patch.hunks.clone(),
        };

        Ok(FileChange {
            path: path.to_string(),
            hunks,
        })
    }

    /// Posts a plain comment on the PR conversation.
    pub async fn post_comment(
        &self,
        repo: &RepoId,
        pr: u64,
        text: &str,
    ) -> Result<(), ScmError> {
        let url = format!(
            "{}/repos/{}/{}/issues/{}/comments",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            pr
        );
        self.http
            .post(url)
            .header("Authorization", self.auth())
            .json(&CreateCommentOption { body: text })
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }

    /// Merges the PR, pinned to the reviewed head. Gitea answers 405/409 when
    /// the branch is not mergeable anymore or the head moved; both map to
    /// the stale outcome instead of an error.
    pub async fn merge(
        &self,
        repo: &RepoId,
        pr: u64,
        expected_head_sha: &str,
    ) -> Result<MergeOutcome, ScmError> {
        let url = format!(
            "{}/repos/{}/{}/pulls/{}/merge",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            pr
        );
        let resp = self
            .http
            .post(url)
            .header("Authorization", self.auth())
            .json(&MergePullRequestOption {
                merge_style: "merge",
                head_commit_id: expected_head_sha,
            })
            .send()
            .await?;

        match resp.status().as_u16() {
            code if (200..300).contains(&code) => Ok(MergeOutcome::Merged),
            405 | 409 => Ok(MergeOutcome::Stale),
            code => Err(ScmError::from_status(code)),
        }
    }

    /// Fetches and parses the whole-PR diff once per reviewed head.
    async fn pr_patches(
        &self,
        repo: &RepoId,
        pr: u64,
        head_sha: &str,
    ) -> Result<Arc<Vec<FilePatch>>, ScmError> {
        let key = format!("{repo}#{pr}");
        {
            let cache = self.diffs.lock().await;
            if let Some((sha, patches)) = cache.get(&key) {
                if sha == head_sha {
                    return Ok(Arc::clone(patches));
                }
            }
        }

        let url = format!(
            "{}/repos/{}/{}/pulls/{}.diff",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            pr
        );
        let raw = self
            .http
            .get(url)
            .header("Authorization", self.auth())
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        let patches = Arc::new(
            parse_pr_diff(&raw)
                .map_err(|e| ScmError::InvalidResponse(format!("unparsable PR diff: {e}")))?,
        );

        let mut cache = self.diffs.lock().await;
        // Newer heads replace the stale entry; one entry per PR.
        cache.insert(key, (head_sha.to_string(), Arc::clone(&patches)));
        Ok(patches)
    }

    /// File content at a ref. A 404 means the file does not exist there
    /// (deleted or raw access disabled) and is not an error.
    async fn file_at(
        &self,
        repo: &RepoId,
        path: &str,
        head_sha: &str,
    ) -> Result<Option<String>, ScmError> {
        let url = format!(
            "{}/repos/{}/{}/raw/{}?ref={}",
            self.base_api,
            urlencoding::encode(&repo.owner),
            urlencoding::encode(&repo.name),
            encode_path(path),
            urlencoding::encode(head_sha)
        );
        let resp = self
            .http
            .get(url)
            .header("Authorization", self.auth())
            .send()
            .await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let content = resp.error_for_status()?.text().await?;
        Ok(Some(content))
    }

    fn auth(&self) -> String {
        format!("token {}", self.token)
    }
}

/// Percent-encodes each path segment while keeping the separators.
fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// --- Gitea payload shapes (subset of fields we actually use) ---

#[derive(Debug, serde::Deserialize)]
struct PrFileEntry {
    filename: String,
}

#[derive(Debug, Serialize)]
struct CreateCommentOption<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct MergePullRequestOption<'a> {
    #[serde(rename = "Do")]
    merge_style: &'a str,
    head_commit_id: &'a str,
}
