//! Per-PR run serialization and cooperative cancellation.
//!
//! Every pull request owns one lease. A pipeline run holds the lease from
//! its first external call until its effects are published, so two runs for
//! the same PR can never interleave comments or merges. Cancellation is
//! cooperative: superseding an in-flight run raises its [`CancelFlag`], and
//! the run observes the flag between external calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use tokio::sync::Mutex as AsyncMutex;

use crate::errors::{Error, ReviewResult};
use crate::scm::types::RepoId;

/// Cancellation token for one pipeline run.
///
/// Raised when a newer head SHA supersedes the run. Checked at every
/// suspension point of the pipeline; a raised flag turns into
/// [`Error::Cancelled`] and the run stops without publishing anything.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Errors with [`Error::Cancelled`] once the flag has been raised.
    pub fn ensure_active(&self) -> ReviewResult<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Registry of per-PR leases.
///
/// Leases are created on first use and live for the process lifetime; the
/// map grows with the number of distinct PRs seen, which mirrors the
/// in-memory idempotency ledger.
#[derive(Debug, Default)]
pub struct LeaseMap {
    leases: Mutex<HashMap<(RepoId, u64), Arc<AsyncMutex<()>>>>,
}

impl LeaseMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the lease for a PR, creating it on first use.
    pub fn lease(&self, repo: &RepoId, pr_number: u64) -> Arc<AsyncMutex<()>> {
        let mut leases = self.leases.lock().unwrap();
        Arc::clone(leases.entry((repo.clone(), pr_number)).or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo() -> RepoId {
        RepoId::parse("acme/widgets").expect("repo id")
    }

    #[test]
    fn flag_starts_lowered_and_trips_once_raised() {
        let flag = CancelFlag::new();
        assert!(!flag.is_cancelled());
        assert!(flag.ensure_active().is_ok());

        flag.cancel();
        assert!(flag.is_cancelled());
        assert!(matches!(flag.ensure_active(), Err(Error::Cancelled)));
    }

    #[test]
    fn clones_share_the_same_flag() {
        let flag = CancelFlag::new();
        let observer = flag.clone();
        flag.cancel();
        assert!(observer.is_cancelled());
    }

    #[test]
    fn same_pr_maps_to_the_same_lease() {
        let leases = LeaseMap::new();
        let first = leases.lease(&repo(), 7);
        let again = leases.lease(&repo(), 7);
        let other = leases.lease(&repo(), 8);

        assert!(Arc::ptr_eq(&first, &again));
        assert!(!Arc::ptr_eq(&first, &other));
    }

    #[tokio::test]
    async fn lease_serializes_two_holders() {
        let leases = LeaseMap::new();
        let lease = leases.lease(&repo(), 7);

        let guard = lease.clone().lock_owned().await;
        assert!(lease.try_lock().is_err());
        drop(guard);
        assert!(lease.try_lock().is_ok());
    }
}
