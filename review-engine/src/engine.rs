//! The engine behind the webhook: intake, dispatch, and the spawned review
//! runs.
//!
//! `submit` is synchronous and cheap; it verifies, parses, and consults the
//! idempotency ledger, then hands accepted requests to a spawned task. The
//! task waits for a worker-pool permit and the per-PR lease before running
//! the pipeline, so webhook latency never depends on review latency.

use std::sync::Arc;
use std::time::Instant;

use llm_service::{ChatCompletionsService, LlmClient, LlmConfig};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::actuate::{self, ActuationOutcome};
use crate::config::ConfigSnapshot;
use crate::errors::{Error, IntakeError, ReviewResult};
use crate::idempotency::{BeginOutcome, IdempotencyStore};
use crate::intake::{self, IntakeOutcome, ParsedEvent};
use crate::leases::{CancelFlag, LeaseMap};
use crate::limiter::RateLimiter;
use crate::retry::RetryPolicy;
use crate::run_pipeline;
use crate::scm::types::ReviewRequest;
use crate::scm::ScmClient;

pub struct ReviewEngine {
    snapshot: Arc<ConfigSnapshot>,
    scm: ScmClient,
    llm: Arc<LlmClient>,
    store: Arc<IdempotencyStore>,
    leases: Arc<LeaseMap>,
    limiter: RateLimiter,
    workers: Arc<Semaphore>,
    retry: RetryPolicy,
}

impl ReviewEngine {
    /// Wires the production clients from the snapshot.
    pub fn new(snapshot: Arc<ConfigSnapshot>) -> ReviewResult<Self> {
        let scm = ScmClient::gitea(&snapshot)?;
        let llm = LlmClient::Chat(ChatCompletionsService::new(LlmConfig {
            endpoint: snapshot.llm.endpoint.clone(),
            model: snapshot.llm.model.clone(),
            api_key: snapshot.llm.api_key.clone(),
            temperature: snapshot.llm.temperature,
            timeout_secs: snapshot.runtime.llm_timeout_secs,
        })?);
        Ok(Self::with_clients(snapshot, scm, llm))
    }

    /// Wires explicit backends; tests pass the fake SCM and a scripted
    /// model here.
    pub fn with_clients(snapshot: Arc<ConfigSnapshot>, scm: ScmClient, llm: LlmClient) -> Self {
        let runtime = &snapshot.runtime;
        let limiter = RateLimiter::new(runtime.llm_requests_per_second, runtime.llm_burst);
        let workers = Arc::new(Semaphore::new(runtime.max_workers));
        let retry = RetryPolicy::from_runtime(runtime);
        Self {
            scm,
            llm: Arc::new(llm),
            store: Arc::new(IdempotencyStore::new()),
            leases: Arc::new(LeaseMap::new()),
            limiter,
            workers,
            retry,
            snapshot,
        }
    }

    /// Intake for one webhook delivery.
    ///
    /// Verifies the signature when a secret is configured, parses and
    /// filters the payload, consults the ledger, and dispatches accepted
    /// requests onto the worker pool. Returns without waiting for the run.
    pub fn submit(
        &self,
        body: &[u8],
        signature: Option<&str>,
    ) -> Result<IntakeOutcome, IntakeError> {
        if let Some(secret) = self.snapshot.scm.webhook_secret.as_deref() {
            intake::verify_signature(secret, body, signature)?;
        }

        let request = match intake::parse_event(body)? {
            ParsedEvent::Review(request) => request,
            ParsedEvent::Ignored { action } => {
                debug!(%action, "pull-request action outside the trigger set");
                return Ok(IntakeOutcome::Ignored { action });
            }
        };

        let key = request.key();
        match self
            .store
            .begin(&request.repo, request.pr_number, &request.head_sha)
        {
            BeginOutcome::Duplicate => {
                debug!(%key, "duplicate delivery, nothing queued");
                Ok(IntakeOutcome::Duplicate { key })
            }
            BeginOutcome::Accepted {
                cancel,
                superseded_previous,
            } => {
                if let Some(previous) = &superseded_previous {
                    info!(%key, previous_sha = %previous, "newer head supersedes in-flight review");
                }
                self.spawn_run(request, cancel);
                Ok(IntakeOutcome::Accepted {
                    key,
                    superseded: superseded_previous.is_some(),
                })
            }
        }
    }

    fn spawn_run(&self, request: ReviewRequest, cancel: CancelFlag) {
        let snapshot = Arc::clone(&self.snapshot);
        let scm = self.scm.clone();
        let llm = Arc::clone(&self.llm);
        let store = Arc::clone(&self.store);
        let leases = Arc::clone(&self.leases);
        let limiter = self.limiter.clone();
        let workers = Arc::clone(&self.workers);
        let retry = self.retry;

        tokio::spawn(async move {
            let key = request.key();
            let Ok(_permit) = workers.acquire_owned().await else {
                // The pool only closes at shutdown.
                return;
            };
            let lease = leases.lease(&request.repo, request.pr_number);
            let _guard = lease.lock_owned().await;
            if cancel.is_cancelled() {
                debug!(%key, "superseded while queued, run skipped");
                return;
            }

            let started = Instant::now();
            let result: ReviewResult<ActuationOutcome> = async {
                let report =
                    run_pipeline(&snapshot, &scm, &llm, &limiter, retry, &cancel, &request).await?;
                actuate::actuate(&scm, &store, retry, &cancel, &snapshot, &report).await
            }
            .await;

            match result {
                Ok(outcome) => info!(
                    %key,
                    merged = outcome.merged,
                    stale = outcome.stale,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "review run finished"
                ),
                Err(Error::Cancelled) => {
                    debug!(%key, "run cancelled by a newer head, nothing published")
                }
                Err(error) => {
                    warn!(%key, %error, "review run failed, key released for redelivery");
                    store.release(&key);
                }
            }
        });
    }
}
