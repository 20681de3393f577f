//! Review prompt assembly.
//!
//! One combined prompt covers all four dimensions in a single completion
//! call. The reply contract is a bare JSON object; the format block below
//! and the parser in `invoke` are the two halves of that contract.

use crate::config::ScoringWeights;
use crate::context::ContextBundle;
use crate::scm::types::{DiffLine, FileChange};

/// Instruction scaffold ahead of the diff sections. Weights are surfaced so
/// the model prioritizes the way the score will.
pub fn scaffold(weights: &ScoringWeights) -> String {
    format!(
        r#"You are a code review expert. Review the changed files below across four dimensions:

1. security (weight {sec}%): injection vulnerabilities (SQL, XSS), leaked secrets or credentials, missing permission checks.
2. performance (weight {perf}%): algorithmic complexity, wasteful resource usage, blocking or unsafe concurrency.
3. readability (weight {read}%): formatting, naming, comments.
4. best_practice (weight {bp}%): design, missing unit tests, missing type annotations, error handling.

Report each concrete issue as a finding. Severity is one of: high, medium, low, info.
For best_practice findings set "category" to one of: missing_tests, missing_type_annotations, other.
Line numbers refer to the new side of the diff; hunk headers carry the positions.

Respond with ONLY a JSON object of this exact shape and nothing else:
{{"findings": [{{"dimension": "security|performance|readability|best_practice", "severity": "high|medium|low|info", "file_path": "path/from/diff", "line": 123, "category": "missing_tests|missing_type_annotations|other", "message": "what is wrong and how to fix it"}}]}}
"line" and "category" may be null. An empty "findings" array means the change-set is clean.
"#,
        sec = percent(weights.security),
        perf = percent(weights.performance),
        read = percent(weights.readability),
        bp = percent(weights.best_practice),
    )
}

fn percent(weight: f64) -> u32 {
    (weight * 100.0).round() as u32
}

/// Unified-diff block for one changed file, fenced for the model.
pub fn render_file_section(file: &FileChange) -> String {
    let mut out = String::new();
    out.push_str(&format!("\n## {}\n```diff\n", file.path));
    for hunk in &file.hunks {
        out.push_str(&format!(
            "@@ -{},{} +{},{} @@\n",
            hunk.old_start, hunk.old_lines, hunk.new_start, hunk.new_lines
        ));
        for line in &hunk.lines {
            let (sigil, content) = match line {
                DiffLine::Added { content, .. } => ('+', content),
                DiffLine::Removed { content, .. } => ('-', content),
                DiffLine::Context { content, .. } => (' ', content),
            };
            out.push(sigil);
            out.push_str(content);
            out.push('\n');
        }
    }
    out.push_str("```\n");
    out
}

/// The full prompt: scaffold, then one section per surviving file.
pub fn build_review_prompt(bundle: &ContextBundle, weights: &ScoringWeights) -> String {
    let mut out = scaffold(weights);
    out.push_str("\n# Changed files\n");
    for file in &bundle.files {
        out.push_str(&render_file_section(file));
    }
    out
}

/// Retry prompt after an unparsable reply: the original plus a terse
/// format reminder.
pub fn strict_retry_prompt(original: &str) -> String {
    let mut out = String::with_capacity(original.len() + 256);
    out.push_str(original);
    out.push_str(
        "\n# Format reminder\nThe previous reply could not be parsed. Respond with ONLY the JSON object described above: no Markdown fences, no prose before or after it, double-quoted keys, and a top-level \"findings\" array.\n",
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scm::types::DiffHunk;

    fn change() -> FileChange {
        FileChange {
            path: "src/auth.rs".to_string(),
            hunks: vec![DiffHunk {
                old_start: 10,
                old_lines: 2,
                new_start: 10,
                new_lines: 3,
                lines: vec![
                    DiffLine::Context {
                        old_line: 10,
                        new_line: 10,
                        content: "fn login() {".to_string(),
                    },
                    DiffLine::Removed {
                        old_line: 11,
                        content: "    check(user);".to_string(),
                    },
                    DiffLine::Added {
                        new_line: 11,
                        content: "    check(user)?;".to_string(),
                    },
                    DiffLine::Added {
                        new_line: 12,
                        content: "    audit(user);".to_string(),
                    },
                ],
            }],
        }
    }

    #[test]
    fn scaffold_surfaces_the_configured_weights() {
        let weights = ScoringWeights {
            security: 0.3,
            performance: 0.2,
            readability: 0.2,
            best_practice: 0.3,
        };
        let text = scaffold(&weights);
        assert!(text.contains("security (weight 30%)"));
        assert!(text.contains("best_practice (weight 30%)"));
        assert!(text.contains("\"findings\""));
    }

    #[test]
    fn file_section_renders_a_fenced_unified_diff() {
        let section = render_file_section(&change());
        assert!(section.contains("## src/auth.rs"));
        assert!(section.contains("@@ -10,2 +10,3 @@"));
        assert!(section.contains("-    check(user);"));
        assert!(section.contains("+    check(user)?;"));
        assert!(section.contains(" fn login() {"));
        assert!(section.starts_with('\n'));
        assert!(section.ends_with("```\n"));
    }

    #[test]
    fn full_prompt_contains_every_file() {
        let bundle = ContextBundle {
            files: vec![change()],
            truncated_paths: Vec::new(),
        };
        let weights = ScoringWeights {
            security: 0.25,
            performance: 0.25,
            readability: 0.25,
            best_practice: 0.25,
        };
        let prompt = build_review_prompt(&bundle, &weights);
        assert!(prompt.contains("# Changed files"));
        assert!(prompt.contains("## src/auth.rs"));
    }

    #[test]
    fn strict_retry_keeps_the_original_and_appends_the_reminder() {
        let stricter = strict_retry_prompt("ORIGINAL");
        assert!(stricter.starts_with("ORIGINAL"));
        assert!(stricter.contains("# Format reminder"));
    }
}
