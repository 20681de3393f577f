//! Markdown rendering of the review report.
//!
//! The comment is the only surface reviewers see, so it carries everything:
//! overall score, per-dimension table, findings grouped per file, security
//! call-outs, and coverage caveats. A hidden HTML marker embeds the
//! identity key so later runs and humans can trace which head SHA a
//! comment belongs to.

use crate::config::ConfigSnapshot;
use crate::scm::types::ReviewKey;
use crate::score::{Decision, Dimension, Finding, ReviewReport, Severity, dimension_score};

/// Hidden marker tying a comment to its review identity key.
pub fn identity_marker(key: &ReviewKey) -> String {
    format!("<!-- review-gate:key={key} -->")
}

fn dimension_emoji(dimension: Dimension) -> &'static str {
    match dimension {
        Dimension::Security => "🛡️",
        Dimension::Performance => "⚡",
        Dimension::Readability => "📖",
        Dimension::BestPractice => "✨",
    }
}

fn severity_icon(severity: Severity) -> &'static str {
    match severity {
        Severity::High => "🔴",
        Severity::Medium => "🟡",
        Severity::Low | Severity::Info => "🔵",
    }
}

/// Renders the full review comment.
pub fn render_comment(report: &ReviewReport, cfg: &ConfigSnapshot) -> String {
    let weights = &cfg.review.scoring_rules;
    let mut out = String::new();

    out.push_str("# 🔍 Code Review Report\n\n");
    out.push_str(&format!(
        "## 📊 Overall score: {:.1}/10 (threshold {:.1})\n\n",
        report.score, cfg.review.quality_threshold
    ));

    out.push_str("| Dimension | Score | Weight |\n|-----------|-------|--------|\n");
    for dimension in Dimension::ALL {
        out.push_str(&format!(
            "| {} {} | {:.1}/10 | {:.0}% |\n",
            dimension_emoji(dimension),
            dimension.label(),
            dimension_score(dimension, &report.findings),
            dimension.weight(weights) * 100.0,
        ));
    }

    let verdict = match report.decision {
        Decision::Merge => "**merge** ✅",
        Decision::Hold => "**hold** ⛔",
    };
    out.push_str(&format!("\n## 🚦 Decision: {verdict}\n"));
    if report.has_security_high() {
        out.push_str("\nA high-severity security finding blocks the merge regardless of score.\n");
    }

    if report.is_vacuous() {
        out.push_str(
            "\nEvery changed file matched the review ignore patterns; nothing to review.\n",
        );
    } else if report.findings.is_empty() {
        out.push_str("\nNo findings. Clean change. ✅\n");
    } else {
        render_findings(&mut out, &report.findings);
    }

    if report.degraded {
        out.push_str(
            "\n> ⚠️ The reviewer's reply could not be parsed after a retry; a conservative score was applied. A maintainer should look at this change by hand.\n",
        );
    }
    if !report.truncated_paths.is_empty() {
        let listed = report
            .truncated_paths
            .iter()
            .map(|p| format!("`{p}`"))
            .collect::<Vec<_>>()
            .join(", ");
        out.push_str(&format!(
            "\n> ⚠️ Partial coverage: {} changed file(s) did not fit the review context budget and went unreviewed: {}\n",
            report.truncated_paths.len(),
            listed,
        ));
    }

    out.push('\n');
    out.push_str(&identity_marker(&report.key));
    out.push('\n');
    out
}

fn render_findings(out: &mut String, findings: &[Finding]) {
    let general: Vec<&Finding> = findings
        .iter()
        .filter(|f| f.dimension != Dimension::Security)
        .collect();
    if !general.is_empty() {
        out.push_str("\n## 💡 Findings\n");
        for (path, group) in group_by_file(&general) {
            out.push_str(&format!("\n### {path}\n"));
            for finding in group {
                out.push_str(&format!(
                    "- [{}/{}]{} {}\n",
                    finding.dimension,
                    finding.severity,
                    location(finding),
                    finding.message,
                ));
            }
        }
    }

    let security: Vec<&Finding> = findings
        .iter()
        .filter(|f| f.dimension == Dimension::Security)
        .collect();
    if !security.is_empty() {
        out.push_str("\n## ⚠️ Security issues\n\n");
        for finding in security {
            out.push_str(&format!(
                "- {} **{}** {}{}: {}\n",
                severity_icon(finding.severity),
                finding.severity,
                display_path(finding),
                finding
                    .line
                    .map(|l| format!(":{l}"))
                    .unwrap_or_default(),
                finding.message,
            ));
        }
    }
}

fn location(finding: &Finding) -> String {
    finding
        .line
        .map(|l| format!(" line {l}:"))
        .unwrap_or_else(|| ":".to_string())
}

fn display_path(finding: &Finding) -> &str {
    if finding.file_path.is_empty() {
        "(general)"
    } else {
        &finding.file_path
    }
}

/// Groups findings per file, keeping first-seen file order and the finding
/// order within each file.
fn group_by_file<'a>(findings: &[&'a Finding]) -> Vec<(String, Vec<&'a Finding>)> {
    let mut groups: Vec<(String, Vec<&'a Finding>)> = Vec::new();
    for finding in findings {
        let path = if finding.file_path.is_empty() {
            "(general)".to_string()
        } else {
            finding.file_path.clone()
        };
        match groups.iter_mut().find(|(p, _)| *p == path) {
            Some((_, group)) => group.push(finding),
            None => groups.push((path, vec![finding])),
        }
    }
    groups
}

/// Follow-up comment for a merge aborted by a stale head.
pub fn render_stale_comment(key: &ReviewKey) -> String {
    format!(
        "⚠️ The branch moved past reviewed head `{}` before the merge ran, so the merge was aborted. The newer push triggers its own review.\n\n{}\n",
        key.head_sha,
        identity_marker(key),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::test_snapshot;
    use crate::scm::types::RepoId;
    use crate::score::{BpCategory, aggregate, degraded_report};

    fn key() -> ReviewKey {
        ReviewKey {
            repo: RepoId::parse("acme/widgets").expect("repo id"),
            pr_number: 7,
            head_sha: "abc123".to_string(),
        }
    }

    fn finding(dimension: Dimension, severity: Severity, path: &str, msg: &str) -> Finding {
        Finding {
            dimension,
            severity,
            file_path: path.to_string(),
            line: Some(14),
            category: None,
            message: msg.to_string(),
        }
    }

    #[test]
    fn comment_carries_score_decision_table_and_marker() {
        let cfg = test_snapshot();
        let findings = vec![
            finding(Dimension::Security, Severity::Medium, "src/db.rs", "string-built SQL"),
            finding(Dimension::Readability, Severity::Low, "src/db.rs", "one-letter name"),
        ];
        let report = aggregate(key(), findings, &cfg, 1, Vec::new());
        let comment = render_comment(&report, &cfg);

        assert!(comment.contains("9.6/10"));
        assert!(comment.contains("**merge** ✅"));
        assert!(comment.contains("| 🛡️ security | 9.0/10 | 30% |"));
        assert!(comment.contains("## ⚠️ Security issues"));
        assert!(comment.contains("src/db.rs:14: string-built SQL"));
        assert!(comment.contains("### src/db.rs"));
        assert!(comment.contains("[readability/low] line 14: one-letter name"));
        assert!(comment.contains("<!-- review-gate:key=acme/widgets#7@abc123 -->"));
    }

    #[test]
    fn security_veto_is_called_out() {
        let cfg = test_snapshot();
        let findings = vec![finding(
            Dimension::Security,
            Severity::High,
            "src/db.rs",
            "secret in source",
        )];
        let report = aggregate(key(), findings, &cfg, 1, Vec::new());
        let comment = render_comment(&report, &cfg);

        assert!(comment.contains("**hold** ⛔"));
        assert!(comment.contains("blocks the merge regardless of score"));
        assert!(comment.contains("🔴 **high**"));
    }

    #[test]
    fn vacuous_report_reads_as_nothing_to_review() {
        let cfg = test_snapshot();
        let report = aggregate(key(), Vec::new(), &cfg, 0, Vec::new());
        let comment = render_comment(&report, &cfg);

        assert!(comment.contains("10.0/10"));
        assert!(comment.contains("nothing to review"));
        assert!(comment.contains("**merge** ✅"));
    }

    #[test]
    fn clean_reviewed_change_reads_as_clean() {
        let cfg = test_snapshot();
        let report = aggregate(key(), Vec::new(), &cfg, 2, Vec::new());
        let comment = render_comment(&report, &cfg);
        assert!(comment.contains("No findings. Clean change."));
    }

    #[test]
    fn degraded_report_warns_and_holds() {
        let cfg = test_snapshot();
        let report = degraded_report(key(), &cfg, 2, Vec::new());
        let comment = render_comment(&report, &cfg);

        assert!(comment.contains("8.0/10"));
        assert!(comment.contains("**hold** ⛔"));
        assert!(comment.contains("could not be parsed"));
    }

    #[test]
    fn truncated_files_are_listed() {
        let cfg = test_snapshot();
        let report = aggregate(
            key(),
            Vec::new(),
            &cfg,
            1,
            vec!["src/big.rs".to_string(), "src/huge.rs".to_string()],
        );
        let comment = render_comment(&report, &cfg);
        assert!(comment.contains("Partial coverage: 2 changed file(s)"));
        assert!(comment.contains("`src/big.rs`, `src/huge.rs`"));
    }

    #[test]
    fn best_practice_category_shows_in_findings_list() {
        let cfg = test_snapshot();
        let findings = vec![Finding {
            category: Some(BpCategory::MissingTests),
            ..finding(
                Dimension::BestPractice,
                Severity::Medium,
                "src/new.rs",
                "no tests cover the new branch",
            )
        }];
        let report = aggregate(key(), findings, &cfg, 1, Vec::new());
        let comment = render_comment(&report, &cfg);
        assert!(comment.contains("[best_practice/medium] line 14: no tests cover the new branch"));
    }

    #[test]
    fn stale_comment_names_the_dead_head() {
        let text = render_stale_comment(&key());
        assert!(text.contains("`abc123`"));
        assert!(text.contains("aborted"));
        assert!(text.contains("<!-- review-gate:key=acme/widgets#7@abc123 -->"));
    }
}
