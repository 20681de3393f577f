//! review-engine: pull-request review orchestration from webhook to merge.
//!
//! One accepted webhook becomes one pipeline run:
//!
//! 1. **step1** extract diff context (changed files, ignore filtering,
//!    widened hunks, token budget)
//! 2. **step2** invoke the model once over all four dimensions and parse
//!    the findings
//! 3. **step3** score deterministically and decide merge or hold
//!
//! then actuation publishes the comment, merges when allowed, and settles
//! the idempotency ledger. Backends hide behind enum dispatch
//! ([`ScmClient`], [`llm_service::LlmClient`]) so tests drive the whole
//! pipeline with in-memory doubles.

pub mod actuate;
pub mod config;
pub mod context;
pub mod engine;
pub mod errors;
pub mod idempotency;
pub mod intake;
pub mod invoke;
pub mod leases;
pub mod limiter;
pub mod prompt;
pub mod report;
pub mod retry;
pub mod scm;
pub mod score;

use std::time::Instant;

use llm_service::LlmClient;
use tracing::debug;

use crate::invoke::LlmReview;
use crate::leases::CancelFlag;
use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;

pub use config::ConfigSnapshot;
pub use engine::ReviewEngine;
pub use errors::{Error, IntakeError, ReviewResult, ScmError};
pub use intake::{IntakeOutcome, SIGNATURE_HEADER};
pub use scm::{FakeScm, MergeOutcome, RepoId, ReviewKey, ReviewRequest, ScmClient};
pub use score::{Decision, Dimension, Finding, ReviewReport, Severity};

/// The three review steps for one accepted request. Does not publish
/// anything; actuation is the caller's follow-up.
pub async fn run_pipeline(
    snapshot: &ConfigSnapshot,
    scm: &ScmClient,
    llm: &LlmClient,
    limiter: &RateLimiter,
    retry: RetryPolicy,
    cancel: &CancelFlag,
    request: &ReviewRequest,
) -> ReviewResult<ReviewReport> {
    let key = request.key();

    debug!(%key, "step1: extracting diff context");
    let t1 = Instant::now();
    let bundle = context::extract_context(scm, snapshot, retry, cancel, request).await?;
    debug!(
        "step1: done in {} ms (files={}, truncated={})",
        t1.elapsed().as_millis(),
        bundle.files.len(),
        bundle.truncated_paths.len()
    );

    if bundle.is_vacuous() {
        debug!(%key, "step2: skipped, nothing reviewable in the change-set");
        return Ok(score::aggregate(key, Vec::new(), snapshot, 0, Vec::new()));
    }

    debug!(%key, "step2: invoking model review");
    let t2 = Instant::now();
    let outcome = invoke::review_changes(llm, limiter, retry, cancel, snapshot, &bundle).await?;
    debug!("step2: done in {} ms", t2.elapsed().as_millis());

    debug!(%key, "step3: scoring findings");
    let t3 = Instant::now();
    let reviewed_files = bundle.reviewed_files();
    let report = match outcome {
        LlmReview::Findings(findings) => score::aggregate(
            key,
            findings,
            snapshot,
            reviewed_files,
            bundle.truncated_paths,
        ),
        LlmReview::Degraded => {
            score::degraded_report(key, snapshot, reviewed_files, bundle.truncated_paths)
        }
    };
    debug!(
        "step3: done in {} ms (score={:.1}, decision={}, findings={})",
        t3.elapsed().as_millis(),
        report.score,
        report.decision,
        report.findings.len()
    );

    Ok(report)
}
