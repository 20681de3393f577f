//! Diff context extraction.
//!
//! Turns the PR's changed-file list into the bundle the prompt is built
//! from: ignore patterns filter noise files out, each surviving file is
//! fetched as widened hunks, and a token budget caps how much diff reaches
//! the model. Files over budget are flagged rather than silently dropped so
//! the report can state the partial coverage.

use tracing::{debug, warn};

use crate::config::{ConfigSnapshot, RESERVED_OUTPUT_TOKENS};
use crate::errors::{Error, ReviewResult};
use crate::leases::CancelFlag;
use crate::prompt;
use crate::retry::{RetryPolicy, with_backoff};
use crate::scm::types::{FileChange, ReviewRequest};
use crate::scm::ScmClient;

/// What survived filtering and budgeting for one review.
#[derive(Debug)]
pub struct ContextBundle {
    pub files: Vec<FileChange>,
    /// Changed files that did not fit the context budget.
    pub truncated_paths: Vec<String>,
}

impl ContextBundle {
    /// True when nothing reviewable survived: every changed file was
    /// ignored or carried no hunks. The pipeline skips the model entirely.
    pub fn is_vacuous(&self) -> bool {
        self.files.is_empty()
    }

    pub fn reviewed_files(&self) -> usize {
        self.files.len()
    }
}

/// Rough token count for budgeting: four characters per token, rounded up.
/// Biased high for code, which keeps the budget conservative.
pub fn estimate_tokens(text: &str) -> u32 {
    (text.chars().count() / 4) as u32 + 1
}

/// Lists, filters, fetches, and budgets the changed files of one PR.
///
/// The first surviving file is always included even when it alone exceeds
/// the budget, so the bundle is only ever empty for an ignorable
/// change-set.
pub async fn extract_context(
    scm: &ScmClient,
    cfg: &ConfigSnapshot,
    retry: RetryPolicy,
    cancel: &CancelFlag,
    request: &ReviewRequest,
) -> ReviewResult<ContextBundle> {
    let ignores = cfg.compiled_ignores()?;

    let paths = with_backoff(retry, "scm list_changed_files", || async {
        scm.list_changed_files(&request.repo, request.pr_number)
            .await
            .map_err(Error::from)
    })
    .await?;
    cancel.ensure_active()?;

    let mut surviving = Vec::new();
    let mut ignored = 0usize;
    for path in paths {
        if ignores.is_match(&path) {
            debug!(%path, "changed file matches ignore pattern");
            ignored += 1;
        } else {
            surviving.push(path);
        }
    }
    if surviving.is_empty() {
        debug!(ignored, "no reviewable files in change-set");
        return Ok(ContextBundle {
            files: Vec::new(),
            truncated_paths: Vec::new(),
        });
    }

    // Prompt budget: completion reserve and instruction scaffold come off
    // the model's token ceiling first.
    let scaffold_cost = estimate_tokens(&prompt::scaffold(&cfg.review.scoring_rules));
    let budget = cfg
        .llm
        .max_tokens
        .saturating_sub(RESERVED_OUTPUT_TOKENS)
        .saturating_sub(scaffold_cost);

    let mut files: Vec<FileChange> = Vec::new();
    let mut truncated_paths = Vec::new();
    let mut used = 0u32;
    let mut exhausted = false;

    for path in surviving {
        if exhausted {
            truncated_paths.push(path);
            continue;
        }
        cancel.ensure_active()?;

        let change = with_backoff(retry, "scm get_diff", || async {
            scm.get_diff(
                &request.repo,
                request.pr_number,
                &path,
                &request.head_sha,
                cfg.scm.context_window,
            )
            .await
            .map_err(Error::from)
        })
        .await?;

        if !change.has_hunks() {
            debug!(path = %change.path, "no text hunks (binary or rename), skipped");
            continue;
        }

        let cost = estimate_tokens(&prompt::render_file_section(&change));
        if !files.is_empty() && used + cost > budget {
            warn!(
                path = %change.path,
                used,
                cost,
                budget,
                "context budget exhausted, remaining files go unreviewed"
            );
            exhausted = true;
            truncated_paths.push(change.path);
            continue;
        }
        used += cost;
        files.push(change);
    }

    debug!(
        files = files.len(),
        truncated = truncated_paths.len(),
        ignored,
        used_tokens = used,
        "context assembled"
    );
    Ok(ContextBundle {
        files,
        truncated_paths,
    })
}
