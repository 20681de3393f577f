//! Provider-agnostic SCM types used across the pipeline.

use std::fmt;

/// Repository identity in `owner/name` form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RepoId {
    pub owner: String,
    pub name: String,
}

impl RepoId {
    /// Parses `"owner/name"`; both segments must be non-empty and the value
    /// must contain exactly one `/`.
    pub fn parse(full_name: &str) -> Option<Self> {
        let mut parts = full_name.split('/');
        let owner = parts.next()?.trim();
        let name = parts.next()?.trim();
        if owner.is_empty() || name.is_empty() || parts.next().is_some() {
            return None;
        }
        Some(Self {
            owner: owner.to_string(),
            name: name.to_string(),
        })
    }
}

impl fmt::Display for RepoId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.owner, self.name)
    }
}

/// Identity of one review run: the PR tip at event time.
///
/// Equality and hashing derive from all three components; two events for
/// the same PR with different head SHAs are different keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReviewKey {
    pub repo: RepoId,
    pub pr_number: u64,
    pub head_sha: String,
}

impl fmt::Display for ReviewKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.repo, self.pr_number, self.head_sha)
    }
}

/// Webhook action that triggered a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    Opened,
    Synchronize,
}

impl fmt::Display for TriggerAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TriggerAction::Opened => write!(f, "opened"),
            TriggerAction::Synchronize => write!(f, "synchronize"),
        }
    }
}

/// Accepted webhook event, the unit of work for the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReviewRequest {
    pub repo: RepoId,
    pub pr_number: u64,
    pub head_sha: String,
    pub action: TriggerAction,
}

impl ReviewRequest {
    pub fn key(&self) -> ReviewKey {
        ReviewKey {
            repo: self.repo.clone(),
            pr_number: self.pr_number,
            head_sha: self.head_sha.clone(),
        }
    }
}

/// A single diff line with position info on both sides where applicable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    /// Line added in the new version.
    Added { new_line: u32, content: String },
    /// Line removed from the old version.
    Removed { old_line: u32, content: String },
    /// Unchanged line present in both versions.
    Context {
        old_line: u32,
        new_line: u32,
        content: String,
    },
}

/// One hunk of a unified diff. After context widening the counts include
/// the extra unchanged lines pulled from the file at head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffHunk {
    pub old_start: u32,
    pub old_lines: u32,
    pub new_start: u32,
    pub new_lines: u32,
    pub lines: Vec<DiffLine>,
}

impl DiffHunk {
    /// Last line number of the hunk on the new side, or `new_start` for
    /// pure deletions.
    pub fn new_end(&self) -> u32 {
        if self.new_lines == 0 {
            self.new_start
        } else {
            self.new_start + self.new_lines - 1
        }
    }
}

/// Diff of one changed file, with surrounding context folded into the
/// hunks as `Context` lines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileChange {
    pub path: String,
    pub hunks: Vec<DiffHunk>,
}

impl FileChange {
    pub fn has_hunks(&self) -> bool {
        !self.hunks.is_empty()
    }
}

/// Result of a merge attempt that reached the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeOutcome {
    /// PR merged at the expected head.
    Merged,
    /// The branch advanced past the reviewed SHA (or the merge conflicted);
    /// the caller must not retry against the same SHA.
    Stale,
}
