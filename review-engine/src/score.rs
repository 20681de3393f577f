//! Deterministic scoring and the merge/hold decision.
//!
//! Findings come in from the model, everything after that is pure
//! arithmetic: per-dimension deductions from 10.0, a weighted sum, a clamp
//! to `[0, 10]`, and the threshold comparison with a high-severity security
//! veto. Identical findings always produce the identical report.

use std::collections::HashSet;
use std::fmt;

use crate::config::{ConfigSnapshot, ScoringWeights};
use crate::scm::types::ReviewKey;

/// Tolerance for the threshold comparison, so float noise in the weighted
/// sum never flips a boundary decision.
pub const SCORE_EPSILON: f64 = 1e-6;

/// How far below the threshold a degraded review lands. Keeps the decision
/// a hold for any threshold above the penalty.
pub const DEGRADED_PENALTY: f64 = 0.5;

const PERFECT_SCORE: f64 = 10.0;

/// The four review dimensions, in report order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Dimension {
    Security,
    Performance,
    Readability,
    BestPractice,
}

impl Dimension {
    pub const ALL: [Dimension; 4] = [
        Dimension::Security,
        Dimension::Performance,
        Dimension::Readability,
        Dimension::BestPractice,
    ];

    /// Lenient parse of a model-supplied dimension label. `None` means the
    /// label is unknown and the finding must be dropped.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "security" => Some(Dimension::Security),
            "performance" => Some(Dimension::Performance),
            "readability" => Some(Dimension::Readability),
            "best_practice" | "best_practices" => Some(Dimension::BestPractice),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Dimension::Security => "security",
            Dimension::Performance => "performance",
            Dimension::Readability => "readability",
            Dimension::BestPractice => "best_practice",
        }
    }

    pub fn weight(self, weights: &ScoringWeights) -> f64 {
        match self {
            Dimension::Security => weights.security,
            Dimension::Performance => weights.performance,
            Dimension::Readability => weights.readability,
            Dimension::BestPractice => weights.best_practice,
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Finding severity, most severe first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "high" | "critical" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Best-practice finding category. Deductions apply once per category no
/// matter how often the model repeats a complaint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BpCategory {
    MissingTests,
    MissingTypeAnnotations,
    Other,
}

impl BpCategory {
    /// Strict parse; unknown categories are the caller's to map to `Other`.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "missing_tests" => Some(BpCategory::MissingTests),
            "missing_type_annotations" => Some(BpCategory::MissingTypeAnnotations),
            "other" => Some(BpCategory::Other),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BpCategory::MissingTests => "missing_tests",
            BpCategory::MissingTypeAnnotations => "missing_type_annotations",
            BpCategory::Other => "other",
        }
    }

    fn deduction(self) -> f64 {
        match self {
            BpCategory::MissingTests => 2.0,
            BpCategory::MissingTypeAnnotations => 1.0,
            BpCategory::Other => 0.5,
        }
    }
}

/// One normalized review finding.
#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub dimension: Dimension,
    pub severity: Severity,
    /// Path as it appeared in the diff; empty for process-level notes.
    pub file_path: String,
    /// New-side line number, when the model pinned one.
    pub line: Option<u32>,
    /// Only meaningful on best-practice findings.
    pub category: Option<BpCategory>,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Merge,
    Hold,
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Decision::Merge => "merge",
            Decision::Hold => "hold",
        })
    }
}

/// Everything the actuator and the report renderer need about one review.
#[derive(Debug, Clone)]
pub struct ReviewReport {
    pub key: ReviewKey,
    pub findings: Vec<Finding>,
    pub score: f64,
    pub decision: Decision,
    /// Files that actually reached the model.
    pub reviewed_files: usize,
    /// Files dropped because the context budget ran out.
    pub truncated_paths: Vec<String>,
    /// True when both parse attempts failed and the conservative score was
    /// substituted.
    pub degraded: bool,
}

impl ReviewReport {
    /// True when the change-set had nothing reviewable (every changed file
    /// ignored), so the model was never consulted.
    pub fn is_vacuous(&self) -> bool {
        self.reviewed_files == 0 && !self.degraded
    }

    pub fn has_security_high(&self) -> bool {
        self.findings
            .iter()
            .any(|f| f.dimension == Dimension::Security && f.severity == Severity::High)
    }
}

/// Unweighted deduction total for one dimension.
pub fn raw_deduction(dimension: Dimension, findings: &[Finding]) -> f64 {
    let of_dim = findings.iter().filter(|f| f.dimension == dimension);
    match dimension {
        Dimension::Security => of_dim
            .map(|f| match f.severity {
                Severity::High => 3.0,
                Severity::Medium => 1.0,
                Severity::Low | Severity::Info => 0.0,
            })
            .sum(),
        Dimension::Performance => of_dim.count() as f64 * 2.0,
        Dimension::Readability => of_dim.count() as f64 * 0.5,
        Dimension::BestPractice => {
            let categories: HashSet<BpCategory> = of_dim
                .map(|f| f.category.unwrap_or(BpCategory::Other))
                .collect();
            categories.iter().map(|c| c.deduction()).sum()
        }
    }
}

/// Standalone per-dimension score for the report table.
pub fn dimension_score(dimension: Dimension, findings: &[Finding]) -> f64 {
    (PERFECT_SCORE - raw_deduction(dimension, findings)).clamp(0.0, PERFECT_SCORE)
}

/// Weighted overall score over all four dimensions, clamped to `[0, 10]`.
pub fn overall_score(findings: &[Finding], weights: &ScoringWeights) -> f64 {
    let weighted: f64 = Dimension::ALL
        .iter()
        .map(|&dim| dim.weight(weights) * raw_deduction(dim, findings))
        .sum();
    (PERFECT_SCORE - weighted).clamp(0.0, PERFECT_SCORE)
}

/// Merge iff the score clears the threshold and no high-severity security
/// finding vetoes, regardless of how well the other dimensions did.
pub fn decide(score: f64, findings: &[Finding], threshold: f64) -> Decision {
    let vetoed = findings
        .iter()
        .any(|f| f.dimension == Dimension::Security && f.severity == Severity::High);
    if !vetoed && score + SCORE_EPSILON >= threshold {
        Decision::Merge
    } else {
        Decision::Hold
    }
}

/// Builds the report for a parsed set of findings. An empty set scores a
/// clean 10.0 and merges.
pub fn aggregate(
    key: ReviewKey,
    findings: Vec<Finding>,
    snapshot: &ConfigSnapshot,
    reviewed_files: usize,
    truncated_paths: Vec<String>,
) -> ReviewReport {
    let score = overall_score(&findings, &snapshot.review.scoring_rules);
    let decision = decide(score, &findings, snapshot.review.quality_threshold);
    ReviewReport {
        key,
        findings,
        score,
        decision,
        reviewed_files,
        truncated_paths,
        degraded: false,
    }
}

/// Conservative report for a review whose model replies never parsed: the
/// score sits [`DEGRADED_PENALTY`] below the threshold, which holds the
/// merge and flags the PR for a human.
pub fn degraded_report(
    key: ReviewKey,
    snapshot: &ConfigSnapshot,
    reviewed_files: usize,
    truncated_paths: Vec<String>,
) -> ReviewReport {
    let threshold = snapshot.review.quality_threshold;
    let score = (threshold - DEGRADED_PENALTY).clamp(0.0, PERFECT_SCORE);
    let findings = vec![Finding {
        dimension: Dimension::BestPractice,
        severity: Severity::Info,
        file_path: String::new(),
        line: None,
        category: None,
        message: "automated review output could not be parsed; conservative score applied"
            .to_string(),
    }];
    let decision = decide(score, &findings, threshold);
    ReviewReport {
        key,
        findings,
        score,
        decision,
        reviewed_files,
        truncated_paths,
        degraded: true,
    }
}
