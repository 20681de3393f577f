//! Idempotency ledger over review identity keys.
//!
//! The ledger remembers every head SHA ever observed per pull request,
//! together with its lifecycle state: in-flight, completed, or superseded.
//! Webhook redelivery of a known SHA is a no-op in every state, so duplicate
//! and out-of-order deliveries never double-review or double-merge. The
//! ledger is process-local; a restart simply forgets history and the next
//! delivery re-runs the review.

use std::collections::HashMap;
use std::sync::Mutex;

use tracing::debug;

use crate::leases::CancelFlag;
use crate::scm::types::{RepoId, ReviewKey};

#[derive(Debug, Clone)]
enum ShaState {
    InFlight(CancelFlag),
    Completed,
    Superseded,
}

/// Outcome of [`IdempotencyStore::begin`].
#[derive(Debug)]
pub enum BeginOutcome {
    /// Fresh key. `superseded_previous` names the in-flight SHA this event
    /// displaced, if any.
    Accepted {
        cancel: CancelFlag,
        superseded_previous: Option<String>,
    },
    /// The SHA was seen before, in any state. Nothing to do.
    Duplicate,
}

/// Ledger of review keys keyed by `(repo, pr)` and then by head SHA.
#[derive(Debug, Default)]
pub struct IdempotencyStore {
    prs: Mutex<HashMap<(RepoId, u64), HashMap<String, ShaState>>>,
}

impl IdempotencyStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically records `sha` as in flight.
    ///
    /// A SHA already present answers [`BeginOutcome::Duplicate`]. Otherwise
    /// any in-flight entry of the same PR (necessarily an older head) is
    /// marked superseded and its cancel flag raised before the new entry is
    /// inserted; both transitions happen under one lock so a concurrent
    /// delivery of either SHA observes a consistent ledger.
    pub fn begin(&self, repo: &RepoId, pr_number: u64, sha: &str) -> BeginOutcome {
        let mut prs = self.prs.lock().unwrap();
        let ledger = prs.entry((repo.clone(), pr_number)).or_default();

        if ledger.contains_key(sha) {
            return BeginOutcome::Duplicate;
        }

        let mut superseded_previous = None;
        for (other_sha, state) in ledger.iter_mut() {
            if let ShaState::InFlight(cancel) = state {
                cancel.cancel();
                superseded_previous = Some(other_sha.clone());
                *state = ShaState::Superseded;
            }
        }

        let cancel = CancelFlag::new();
        ledger.insert(sha.to_string(), ShaState::InFlight(cancel.clone()));
        BeginOutcome::Accepted {
            cancel,
            superseded_previous,
        }
    }

    /// Check-and-set in-flight -> completed.
    ///
    /// Returns false when the entry is no longer in flight, which keeps a
    /// run that was superseded mid-actuation from marking the newer key's
    /// history as done.
    pub fn complete(&self, key: &ReviewKey) -> bool {
        let mut prs = self.prs.lock().unwrap();
        let Some(ledger) = prs.get_mut(&(key.repo.clone(), key.pr_number)) else {
            return false;
        };
        match ledger.get_mut(&key.head_sha) {
            Some(state) if matches!(state, ShaState::InFlight(_)) => {
                *state = ShaState::Completed;
                true
            }
            _ => false,
        }
    }

    /// Forgets a failed in-flight run so webhook redelivery can retry it.
    ///
    /// Completed and superseded entries stay recorded; only the in-flight
    /// state is retryable.
    pub fn release(&self, key: &ReviewKey) -> bool {
        let mut prs = self.prs.lock().unwrap();
        let Some(ledger) = prs.get_mut(&(key.repo.clone(), key.pr_number)) else {
            return false;
        };
        if matches!(ledger.get(&key.head_sha), Some(ShaState::InFlight(_))) {
            ledger.remove(&key.head_sha);
            debug!(key = %key, "in-flight key released for redelivery");
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoId {
        RepoId::parse("acme/widgets").expect("repo id")
    }

    fn key(sha: &str) -> ReviewKey {
        ReviewKey {
            repo: repo(),
            pr_number: 7,
            head_sha: sha.to_string(),
        }
    }

    #[test]
    fn fresh_sha_is_accepted_and_redelivery_is_duplicate() {
        let store = IdempotencyStore::new();

        let first = store.begin(&repo(), 7, "aaa");
        assert!(matches!(
            first,
            BeginOutcome::Accepted {
                superseded_previous: None,
                ..
            }
        ));
        assert!(matches!(
            store.begin(&repo(), 7, "aaa"),
            BeginOutcome::Duplicate
        ));
    }

    #[test]
    fn completed_sha_stays_a_duplicate() {
        let store = IdempotencyStore::new();
        store.begin(&repo(), 7, "aaa");
        assert!(store.complete(&key("aaa")));
        assert!(matches!(
            store.begin(&repo(), 7, "aaa"),
            BeginOutcome::Duplicate
        ));
    }

    #[test]
    fn complete_is_a_one_shot_transition() {
        let store = IdempotencyStore::new();
        store.begin(&repo(), 7, "aaa");
        assert!(store.complete(&key("aaa")));
        assert!(!store.complete(&key("aaa")));
        assert!(!store.complete(&key("never-begun")));
    }

    #[test]
    fn newer_sha_supersedes_and_cancels_the_in_flight_run() {
        let store = IdempotencyStore::new();
        let BeginOutcome::Accepted { cancel, .. } = store.begin(&repo(), 7, "aaa") else {
            panic!("first begin must be accepted");
        };
        assert!(!cancel.is_cancelled());

        let BeginOutcome::Accepted {
            superseded_previous,
            ..
        } = store.begin(&repo(), 7, "bbb")
        else {
            panic!("superseding begin must be accepted");
        };
        assert_eq!(superseded_previous.as_deref(), Some("aaa"));
        assert!(cancel.is_cancelled());

        // The displaced SHA stays known: redelivering it is a no-op.
        assert!(matches!(
            store.begin(&repo(), 7, "aaa"),
            BeginOutcome::Duplicate
        ));
        // The superseded run can no longer complete its key.
        assert!(!store.complete(&key("aaa")));
        assert!(store.complete(&key("bbb")));
    }

    #[test]
    fn completed_older_sha_does_not_block_a_newer_one() {
        let store = IdempotencyStore::new();
        store.begin(&repo(), 7, "aaa");
        assert!(store.complete(&key("aaa")));

        let outcome = store.begin(&repo(), 7, "bbb");
        assert!(matches!(
            outcome,
            BeginOutcome::Accepted {
                superseded_previous: None,
                ..
            }
        ));
    }

    #[test]
    fn release_reopens_only_in_flight_entries() {
        let store = IdempotencyStore::new();
        store.begin(&repo(), 7, "aaa");
        assert!(store.release(&key("aaa")));
        // Released means forgotten: the same SHA is accepted again.
        assert!(matches!(
            store.begin(&repo(), 7, "aaa"),
            BeginOutcome::Accepted { .. }
        ));

        store.complete(&key("aaa"));
        assert!(!store.release(&key("aaa")));
        assert!(!store.release(&key("unknown")));
    }

    #[test]
    fn prs_are_isolated_from_each_other() {
        let store = IdempotencyStore::new();
        let BeginOutcome::Accepted { cancel, .. } = store.begin(&repo(), 7, "aaa") else {
            panic!("first begin must be accepted");
        };

        assert!(matches!(
            store.begin(&repo(), 8, "aaa"),
            BeginOutcome::Accepted {
                superseded_previous: None,
                ..
            }
        ));
        assert!(!cancel.is_cancelled());
    }
}
