//! Review invocation: prompt assembly, rate-limited completion calls, and
//! reply parsing.
//!
//! Model output is hostile input. The parser accepts the outermost JSON
//! object wherever it sits in the reply, drops findings it cannot map onto
//! the known dimensions and severities, and never lets a malformed reply
//! abort the run: one stricter retry, then the caller degrades.

use llm_service::LlmClient;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::config::{ConfigSnapshot, RESERVED_OUTPUT_TOKENS};
use crate::context::ContextBundle;
use crate::errors::{Error, ReviewResult};
use crate::leases::CancelFlag;
use crate::limiter::RateLimiter;
use crate::prompt;
use crate::retry::{RetryPolicy, with_backoff};
use crate::score::{BpCategory, Dimension, Finding, Severity};

/// Outcome of the review call pair.
#[derive(Debug)]
pub enum LlmReview {
    /// Structured findings extracted from a parsable reply.
    Findings(Vec<Finding>),
    /// Both attempts produced unparsable output.
    Degraded,
}

/// Runs the combined four-dimension review over the bundle.
///
/// Transport failures retry inside [`with_backoff`] and surface as errors
/// once exhausted. Parse failures are different: the first gets one retry
/// with a stricter format instruction, the second answers
/// [`LlmReview::Degraded`].
pub async fn review_changes(
    llm: &LlmClient,
    limiter: &RateLimiter,
    retry: RetryPolicy,
    cancel: &CancelFlag,
    cfg: &ConfigSnapshot,
    bundle: &ContextBundle,
) -> ReviewResult<LlmReview> {
    let prompt_text = prompt::build_review_prompt(bundle, &cfg.review.scoring_rules);
    debug!(
        prompt_chars = prompt_text.chars().count(),
        files = bundle.files.len(),
        "review prompt assembled"
    );

    let reply = completion(llm, limiter, retry, cancel, &prompt_text).await?;
    match parse_reply(&reply) {
        Ok(findings) => return Ok(LlmReview::Findings(findings)),
        Err(reason) => {
            warn!(%reason, "reply not parsable, retrying once with a stricter format instruction")
        }
    }

    cancel.ensure_active()?;
    let stricter = prompt::strict_retry_prompt(&prompt_text);
    let reply = completion(llm, limiter, retry, cancel, &stricter).await?;
    match parse_reply(&reply) {
        Ok(findings) => Ok(LlmReview::Findings(findings)),
        Err(reason) => {
            warn!(%reason, "stricter retry still unparsable, degrading");
            Ok(LlmReview::Degraded)
        }
    }
}

/// One completion attempt series: every try re-checks cancellation and
/// takes a limiter token, so backoff retries are rate-limited too.
async fn completion(
    llm: &LlmClient,
    limiter: &RateLimiter,
    retry: RetryPolicy,
    cancel: &CancelFlag,
    prompt: &str,
) -> ReviewResult<String> {
    with_backoff(retry, "llm completion", || async {
        cancel.ensure_active()?;
        limiter.acquire().await;
        llm.complete(prompt, RESERVED_OUTPUT_TOKENS)
            .await
            .map_err(Error::from)
    })
    .await
}

#[derive(Debug, Deserialize)]
struct ReplyEnvelope {
    findings: Vec<RawFinding>,
}

#[derive(Debug, Deserialize)]
struct RawFinding {
    dimension: String,
    severity: String,
    #[serde(default)]
    file_path: String,
    #[serde(default)]
    line: Option<u32>,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    message: String,
}

/// Maps a raw reply onto findings, or explains why it cannot.
///
/// Unknown dimensions and severities drop the finding with a warning;
/// unknown best-practice categories fold into `other`.
fn parse_reply(reply: &str) -> Result<Vec<Finding>, String> {
    let json = extract_json_object(reply).ok_or_else(|| "no JSON object in reply".to_string())?;
    let envelope: ReplyEnvelope =
        serde_json::from_str(json).map_err(|e| format!("bad findings JSON: {e}"))?;

    let mut findings = Vec::with_capacity(envelope.findings.len());
    for raw in envelope.findings {
        let Some(dimension) = Dimension::parse(&raw.dimension) else {
            warn!(dimension = %raw.dimension, "dropping finding with unknown dimension");
            continue;
        };
        let Some(severity) = Severity::parse(&raw.severity) else {
            warn!(severity = %raw.severity, "dropping finding with unknown severity");
            continue;
        };
        let category = raw.category.as_deref().map(|label| {
            BpCategory::parse(label).unwrap_or_else(|| {
                warn!(category = %label, "unknown best-practice category treated as other");
                BpCategory::Other
            })
        });
        findings.push(Finding {
            dimension,
            severity,
            file_path: raw.file_path,
            line: raw.line,
            category,
            message: raw.message,
        });
    }
    Ok(findings)
}

/// Outermost `{ … }` of the reply. Skips Markdown fences and prose on
/// either side without caring what they contain.
fn extract_json_object(reply: &str) -> Option<&str> {
    let start = reply.find('{')?;
    let end = reply.rfind('}')?;
    if end < start {
        return None;
    }
    Some(&reply[start..=end])
}
