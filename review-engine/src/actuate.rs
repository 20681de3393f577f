//! Actuation: publish the report, gate the merge, settle the ledger.
//!
//! Ordering is the contract here. The comment always goes out first, the
//! merge (when decided) is pinned to the reviewed head SHA, and the
//! identity key flips to completed only after the effects succeeded. A
//! crash mid-actuation therefore leaves the key retryable instead of
//! falsely done.

use std::time::Instant;

use tracing::{debug, info, warn};

use crate::config::ConfigSnapshot;
use crate::errors::{Error, ReviewResult};
use crate::idempotency::IdempotencyStore;
use crate::leases::CancelFlag;
use crate::report;
use crate::retry::{RetryPolicy, with_backoff};
use crate::scm::types::MergeOutcome;
use crate::scm::ScmClient;
use crate::score::{Decision, ReviewReport};

/// Externally visible effects of one actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActuationOutcome {
    pub merged: bool,
    /// The merge was aborted because the branch moved past the reviewed
    /// head.
    pub stale: bool,
    /// The identity key transitioned to completed. False when the run was
    /// superseded between comment and completion.
    pub completed: bool,
}

pub async fn actuate(
    scm: &ScmClient,
    store: &IdempotencyStore,
    retry: RetryPolicy,
    cancel: &CancelFlag,
    cfg: &ConfigSnapshot,
    report: &ReviewReport,
) -> ReviewResult<ActuationOutcome> {
    let started = Instant::now();

    // Last cancellation point. Once the comment is out the run finishes its
    // effects; a superseding push mid-merge is caught by the head SHA pin.
    cancel.ensure_active()?;

    let key = &report.key;
    let body = report::render_comment(report, cfg);
    with_backoff(retry, "scm post_comment", || async {
        scm.post_comment(&key.repo, key.pr_number, &body)
            .await
            .map_err(Error::from)
    })
    .await?;
    debug!(%key, "review comment posted");

    let mut merged = false;
    let mut stale = false;
    if report.decision == Decision::Merge {
        let outcome = with_backoff(retry, "scm merge", || async {
            scm.merge(&key.repo, key.pr_number, &key.head_sha)
                .await
                .map_err(Error::from)
        })
        .await?;
        match outcome {
            MergeOutcome::Merged => merged = true,
            MergeOutcome::Stale => {
                stale = true;
                warn!(%key, "branch advanced past reviewed head, merge aborted");
                let follow_up = report::render_stale_comment(key);
                with_backoff(retry, "scm post_comment stale note", || async {
                    scm.post_comment(&key.repo, key.pr_number, &follow_up)
                        .await
                        .map_err(Error::from)
                })
                .await?;
            }
        }
    }

    let completed = store.complete(key);
    if !completed {
        warn!(%key, "key left the in-flight state during actuation, not marking completed");
    }

    info!(
        %key,
        decision = %report.decision,
        score = report.score,
        merged,
        stale,
        completed,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "actuation finished"
    );
    Ok(ActuationOutcome {
        merged,
        stale,
        completed,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::config::test_snapshot;
    use crate::scm::types::{RepoId, ReviewKey};
    use crate::scm::FakeScm;
    use crate::score::aggregate;

    fn key() -> ReviewKey {
        ReviewKey {
            repo: RepoId::parse("acme/widgets").expect("repo id"),
            pr_number: 7,
            head_sha: "abc123".to_string(),
        }
    }

    fn retry(cfg: &ConfigSnapshot) -> RetryPolicy {
        RetryPolicy::from_runtime(&cfg.runtime)
    }

    #[tokio::test]
    async fn merge_decision_comments_then_merges_then_completes() {
        let cfg = Arc::new(test_snapshot());
        let fake = FakeScm::new();
        let store = IdempotencyStore::new();
        let k = key();
        store.begin(&k.repo, k.pr_number, &k.head_sha);

        let report = aggregate(k.clone(), Vec::new(), &cfg, 1, Vec::new());
        let scm = ScmClient::Fake(fake.clone());
        let outcome = actuate(&scm, &store, retry(&cfg), &CancelFlag::new(), &cfg, &report)
            .await
            .expect("actuate");

        assert!(outcome.merged && !outcome.stale && outcome.completed);
        let comments = fake.comments().await;
        assert_eq!(comments.len(), 1);
        assert!(comments[0].body.contains("**merge** ✅"));
        let merges = fake.merges().await;
        assert_eq!(merges.len(), 1);
        assert_eq!(merges[0].expected_head_sha, "abc123");
        // Completed means the same key can no longer complete again.
        assert!(!store.complete(&k));
    }

    #[tokio::test]
    async fn hold_decision_comments_without_merging() {
        let cfg = Arc::new(test_snapshot());
        let fake = FakeScm::new();
        let store = IdempotencyStore::new();
        let k = key();
        store.begin(&k.repo, k.pr_number, &k.head_sha);

        let mut report = aggregate(k, Vec::new(), &cfg, 1, Vec::new());
        report.score = 5.0;
        report.decision = Decision::Hold;

        let scm = ScmClient::Fake(fake.clone());
        let outcome = actuate(&scm, &store, retry(&cfg), &CancelFlag::new(), &cfg, &report)
            .await
            .expect("actuate");

        assert!(!outcome.merged && !outcome.stale && outcome.completed);
        assert_eq!(fake.comments().await.len(), 1);
        assert!(fake.merges().await.is_empty());
    }

    #[tokio::test]
    async fn stale_merge_posts_a_follow_up_and_still_completes() {
        let cfg = Arc::new(test_snapshot());
        let fake = FakeScm::new();
        let store = IdempotencyStore::new();
        let k = key();
        store.begin(&k.repo, k.pr_number, &k.head_sha);
        fake.push_merge_result(&k.repo, k.pr_number, MergeOutcome::Stale)
            .await;

        let report = aggregate(k, Vec::new(), &cfg, 1, Vec::new());
        let scm = ScmClient::Fake(fake.clone());
        let outcome = actuate(&scm, &store, retry(&cfg), &CancelFlag::new(), &cfg, &report)
            .await
            .expect("actuate");

        assert!(!outcome.merged && outcome.stale && outcome.completed);
        let comments = fake.comments().await;
        assert_eq!(comments.len(), 2);
        assert!(comments[1].body.contains("aborted"));
        // One merge attempt, no blind retry against a moved branch.
        assert_eq!(fake.merges().await.len(), 1);
    }

    #[tokio::test]
    async fn cancellation_before_the_comment_publishes_nothing() {
        let cfg = Arc::new(test_snapshot());
        let fake = FakeScm::new();
        let store = IdempotencyStore::new();
        let k = key();
        store.begin(&k.repo, k.pr_number, &k.head_sha);

        let cancel = CancelFlag::new();
        cancel.cancel();

        let report = aggregate(k, Vec::new(), &cfg, 1, Vec::new());
        let scm = ScmClient::Fake(fake.clone());
        let result = actuate(&scm, &store, retry(&cfg), &cancel, &cfg, &report).await;

        assert!(matches!(result, Err(Error::Cancelled)));
        assert!(fake.comments().await.is_empty());
        assert!(fake.merges().await.is_empty());
    }
}
