//! Immutable configuration snapshot.
//!
//! Loaded once at boot from a YAML file. Every pipeline run keeps an `Arc`
//! of the snapshot it started with, so editing the file never changes the
//! behavior of an in-flight review; a restart applies new values.
//!
//! Validation is fatal: the service must not start on a snapshot with
//! inconsistent weights, an out-of-range threshold, or ignore patterns that
//! do not compile.

use std::{fs, path::Path, sync::Arc};

use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::Deserialize;

use crate::errors::ConfigError;

/// Tolerance for the scoring-weight sum check.
pub const WEIGHT_SUM_EPSILON: f64 = 1e-6;

/// Completion-side allowance subtracted from `llm.max_tokens` when
/// budgeting prompt context, and passed to the provider as the completion
/// cap.
pub const RESERVED_OUTPUT_TOKENS: u32 = 1000;

#[derive(Debug, Clone, Deserialize)]
pub struct ConfigSnapshot {
    pub scm: ScmSection,
    pub llm: LlmSection,
    pub review: ReviewSection,
    #[serde(default)]
    pub runtime: RuntimeSection,
}

/// SCM connection settings (Gitea).
#[derive(Debug, Clone, Deserialize)]
pub struct ScmSection {
    /// Server root, e.g. `https://gitea.example.com`.
    pub url: String,
    /// API token sent as `Authorization: token …`.
    pub token: String,
    /// Unchanged lines kept around each hunk when building review context.
    #[serde(default = "default_context_window")]
    pub context_window: u32,
    /// Webhook HMAC secret; when unset, signature checking is disabled.
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// LLM endpoint settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    pub model: String,
    pub api_key: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    /// Total token budget for one review call (prompt + completion).
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

/// Review policy settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ReviewSection {
    /// Minimum aggregate score required to auto-merge.
    #[serde(default = "default_threshold")]
    pub quality_threshold: f64,
    /// Glob patterns for files excluded from review entirely.
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    pub scoring_rules: ScoringWeights,
}

/// Per-dimension weights; must sum to 1.0 within [`WEIGHT_SUM_EPSILON`].
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ScoringWeights {
    pub security: f64,
    pub performance: f64,
    pub readability: f64,
    pub best_practice: f64,
}

impl ScoringWeights {
    pub fn sum(&self) -> f64 {
        self.security + self.performance + self.readability + self.best_practice
    }
}

/// Scheduling and resilience knobs. The whole section is optional.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RuntimeSection {
    /// Upper bound on concurrently progressing pipeline runs.
    pub max_workers: usize,
    /// Token-bucket refill rate shared by all LLM calls.
    pub llm_requests_per_second: f64,
    /// Token-bucket capacity (short bursts above the steady rate).
    pub llm_burst: f64,
    /// Attempt ceiling for transient failures (first try included).
    pub retry_max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Per-call deadline for SCM requests.
    pub scm_timeout_secs: u64,
    /// Per-call deadline for LLM requests.
    pub llm_timeout_secs: u64,
}

impl Default for RuntimeSection {
    fn default() -> Self {
        Self {
            max_workers: 4,
            llm_requests_per_second: 1.0,
            llm_burst: 2.0,
            retry_max_attempts: 3,
            retry_base_delay_ms: 500,
            retry_max_delay_ms: 8_000,
            scm_timeout_secs: 30,
            llm_timeout_secs: 120,
        }
    }
}

impl ConfigSnapshot {
    /// Reads, parses, and validates a snapshot file.
    pub fn load(path: impl AsRef<Path>) -> Result<Arc<Self>, ConfigError> {
        let raw = fs::read_to_string(path.as_ref())?;
        let snapshot: Self = serde_yml::from_str(&raw)?;
        snapshot.validate()?;
        Ok(Arc::new(snapshot))
    }

    /// Checks every structural invariant; any violation refuses the whole
    /// snapshot.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.scm.url.trim();
        if url.is_empty() || !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(invalid("scm.url", "must be an http(s) URL"));
        }
        if self.scm.token.trim().is_empty() {
            return Err(invalid("scm.token", "must not be empty"));
        }
        if self.scm.context_window == 0 {
            return Err(invalid("scm.context_window", "must be at least 1"));
        }

        if self.llm.model.trim().is_empty() {
            return Err(invalid("llm.model", "must not be empty"));
        }
        if self.llm.api_key.trim().is_empty() {
            return Err(invalid("llm.api_key", "must not be empty"));
        }
        if self.llm.max_tokens <= RESERVED_OUTPUT_TOKENS {
            return Err(invalid(
                "llm.max_tokens",
                &format!("must exceed the reserved output allowance of {RESERVED_OUTPUT_TOKENS}"),
            ));
        }
        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(invalid("llm.temperature", "must be within 0.0..=2.0"));
        }

        let threshold = self.review.quality_threshold;
        if !threshold.is_finite() || !(0.0..=10.0).contains(&threshold) {
            return Err(invalid(
                "review.quality_threshold",
                "must be within 0.0..=10.0",
            ));
        }

        let w = &self.review.scoring_rules;
        for (name, value) in [
            ("security", w.security),
            ("performance", w.performance),
            ("readability", w.readability),
            ("best_practice", w.best_practice),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid(
                    "review.scoring_rules",
                    &format!("{name} weight must be a non-negative number"),
                ));
            }
        }
        if (w.sum() - 1.0).abs() > WEIGHT_SUM_EPSILON {
            return Err(invalid(
                "review.scoring_rules",
                &format!("weights must sum to 1.0, got {}", w.sum()),
            ));
        }

        // Compile eagerly so a broken glob fails the boot, not a run.
        self.compiled_ignores()?;

        let rt = &self.runtime;
        if rt.max_workers == 0 {
            return Err(invalid("runtime.max_workers", "must be at least 1"));
        }
        if !(rt.llm_requests_per_second.is_finite() && rt.llm_requests_per_second > 0.0) {
            return Err(invalid("runtime.llm_requests_per_second", "must be > 0"));
        }
        if !(rt.llm_burst.is_finite() && rt.llm_burst >= 1.0) {
            return Err(invalid("runtime.llm_burst", "must be at least 1"));
        }
        if rt.retry_max_attempts == 0 {
            return Err(invalid("runtime.retry_max_attempts", "must be at least 1"));
        }
        if rt.scm_timeout_secs == 0 || rt.llm_timeout_secs == 0 {
            return Err(invalid("runtime", "timeouts must be at least 1 second"));
        }

        Ok(())
    }

    /// Compiled ignore set. A bare-filename pattern (no `/`) also matches in
    /// subdirectories, so `*.lock` ignores lockfiles anywhere in the tree.
    ///
    /// Validated at load time; for a snapshot obtained via [`Self::load`]
    /// this cannot fail.
    pub fn compiled_ignores(&self) -> Result<GlobSet, ConfigError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in &self.review.ignore_patterns {
            builder.add(glob(pattern)?);
            if !pattern.contains('/') {
                builder.add(glob(&format!("**/{pattern}"))?);
            }
        }
        builder.build().map_err(|e| invalid(
            "review.ignore_patterns",
            &format!("failed to build glob set: {e}"),
        ))
    }
}

fn glob(pattern: &str) -> Result<Glob, ConfigError> {
    Glob::new(pattern)
        .map_err(|e| invalid("review.ignore_patterns", &format!("bad glob {pattern:?}: {e}")))
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

fn default_context_window() -> u32 {
    10
}

fn default_endpoint() -> String {
    "https://api.deepseek.com".to_string()
}

fn default_max_tokens() -> u32 {
    60_000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_threshold() -> f64 {
    8.5
}

/// Ready-made snapshot for unit tests across the crate: balanced weights,
/// 8.5 threshold, lockfile and vendor ignores.
#[cfg(test)]
pub(crate) fn test_snapshot() -> ConfigSnapshot {
    ConfigSnapshot {
        scm: ScmSection {
            url: "https://gitea.example.com".to_string(),
            token: "t0ken".to_string(),
            context_window: 5,
            webhook_secret: None,
        },
        llm: LlmSection {
            model: "deepseek/deepseek-chat".to_string(),
            api_key: "sk-test".to_string(),
            endpoint: default_endpoint(),
            max_tokens: 8_000,
            temperature: default_temperature(),
        },
        review: ReviewSection {
            quality_threshold: 8.5,
            ignore_patterns: vec!["*.lock".to_string(), "vendor/**".to_string()],
            scoring_rules: ScoringWeights {
                security: 0.3,
                performance: 0.2,
                readability: 0.2,
                best_practice: 0.3,
            },
        },
        runtime: RuntimeSection::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn yaml(weights: &str, threshold: f64, window: u32) -> String {
        format!(
            r#"
scm:
  url: "https://gitea.example.com"
  token: "t0ken"
  context_window: {window}
llm:
  model: "deepseek/deepseek-chat"
  api_key: "sk-test"
review:
  quality_threshold: {threshold}
  ignore_patterns:
    - "*.lock"
    - "vendor/**"
  scoring_rules:
{weights}
"#
        )
    }

    const BALANCED: &str = "    security: 0.3\n    performance: 0.2\n    readability: 0.2\n    best_practice: 0.3";

    #[test]
    fn parses_and_validates_a_full_snapshot() {
        let snapshot: ConfigSnapshot =
            serde_yml::from_str(&yaml(BALANCED, 8.5, 10)).expect("parse");
        snapshot.validate().expect("validate");

        assert_eq!(snapshot.scm.context_window, 10);
        assert_eq!(snapshot.llm.max_tokens, 60_000);
        assert!((snapshot.llm.temperature - 0.2).abs() < 1e-6);
        assert_eq!(snapshot.runtime.max_workers, 4);
    }

    #[test]
    fn rejects_weights_that_do_not_sum_to_one() {
        let weights = "    security: 0.5\n    performance: 0.2\n    readability: 0.2\n    best_practice: 0.3";
        let snapshot: ConfigSnapshot =
            serde_yml::from_str(&yaml(weights, 8.5, 10)).expect("parse");
        let err = snapshot.validate().expect_err("must fail");
        assert!(err.to_string().contains("sum to 1.0"), "{err}");
    }

    #[test]
    fn rejects_threshold_outside_scale() {
        let snapshot: ConfigSnapshot =
            serde_yml::from_str(&yaml(BALANCED, 12.0, 10)).expect("parse");
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn rejects_zero_context_window() {
        let snapshot: ConfigSnapshot =
            serde_yml::from_str(&yaml(BALANCED, 8.5, 0)).expect("parse");
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn rejects_broken_ignore_glob() {
        let mut snapshot: ConfigSnapshot =
            serde_yml::from_str(&yaml(BALANCED, 8.5, 10)).expect("parse");
        snapshot.review.ignore_patterns.push("a[".into());
        assert!(snapshot.validate().is_err());
    }

    #[test]
    fn bare_filename_patterns_match_nested_paths() {
        let snapshot: ConfigSnapshot =
            serde_yml::from_str(&yaml(BALANCED, 8.5, 10)).expect("parse");
        let set = snapshot.compiled_ignores().expect("globs");

        assert!(set.is_match("Cargo.lock"));
        assert!(set.is_match("sub/dir/Cargo.lock"));
        assert!(set.is_match("vendor/lib/code.c"));
        assert!(!set.is_match("src/main.rs"));
    }
}
