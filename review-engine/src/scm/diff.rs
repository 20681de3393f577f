//! Unified diff handling: whole-PR diff → per-file patches → hunks, plus
//! context widening against the file content at head.
//!
//! Parser notes:
//! - Splits on `diff --git` section markers.
//! - Takes the path from `+++ b/…`, falling back to `--- a/…` for
//!   deletions.
//! - Ignores `\ No newline at end of file` marker lines.
//! - Flags binary patches (`GIT binary patch`, `Binary files … differ`).

use crate::{
    errors::ParseError,
    scm::types::{DiffHunk, DiffLine},
};

/// One file section of a PR diff.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilePatch {
    /// Path on the new side (old side for deletions).
    pub path: String,
    /// File no longer exists at head; context widening is impossible.
    pub deleted: bool,
    /// Binary patch; carries no reviewable hunks.
    pub binary: bool,
    pub hunks: Vec<DiffHunk>,
}

/// Parses a whole-PR unified diff into per-file patches.
pub fn parse_pr_diff(diff: &str) -> Result<Vec<FilePatch>, ParseError> {
    let mut patches = Vec::new();
    for section in split_sections(diff) {
        if let Some(patch) = parse_section(section)? {
            patches.push(patch);
        }
    }
    Ok(patches)
}

/// Splits the diff into `diff --git`-delimited sections, keeping each
/// section's full text.
fn split_sections(diff: &str) -> Vec<&str> {
    let mut starts: Vec<usize> = Vec::new();
    let mut offset = 0usize;
    for line in diff.split_inclusive('\n') {
        if line.starts_with("diff --git ") {
            starts.push(offset);
        }
        offset += line.len();
    }
    let mut sections = Vec::with_capacity(starts.len());
    for (i, &start) in starts.iter().enumerate() {
        let end = starts.get(i + 1).copied().unwrap_or(diff.len());
        sections.push(&diff[start..end]);
    }
    sections
}

fn parse_section(section: &str) -> Result<Option<FilePatch>, ParseError> {
    let mut path: Option<String> = None;
    let mut old_path: Option<String> = None;
    let mut deleted = false;
    let mut binary = false;

    for line in section.lines() {
        if let Some(rest) = line.strip_prefix("+++ ") {
            if rest.trim() == "/dev/null" {
                deleted = true;
            } else {
                path = Some(strip_prefix_marker(rest));
            }
        } else if let Some(rest) = line.strip_prefix("--- ") {
            if rest.trim() != "/dev/null" {
                old_path = Some(strip_prefix_marker(rest));
            }
        } else if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
            binary = true;
        } else if line.starts_with("@@") {
            break;
        }
    }

    let path = match path.or(old_path) {
        Some(p) => p,
        // Header-only section without any file names; nothing to review.
        None => match header_path(section) {
            Some(p) => p,
            None => return Ok(None),
        },
    };

    let hunks = if binary { Vec::new() } else { parse_hunks(section)? };

    Ok(Some(FilePatch {
        path,
        deleted,
        binary,
        hunks,
    }))
}

/// `+++ b/src/lib.rs` → `src/lib.rs`; tolerates missing `a/`/`b/` markers.
fn strip_prefix_marker(raw: &str) -> String {
    let raw = raw.trim();
    raw.strip_prefix("a/")
        .or_else(|| raw.strip_prefix("b/"))
        .unwrap_or(raw)
        .to_string()
}

/// Last-resort path from the `diff --git a/X b/Y` header itself.
fn header_path(section: &str) -> Option<String> {
    let header = section.lines().next()?;
    let rest = header.strip_prefix("diff --git ")?;
    let b_side = rest.split_whitespace().last()?;
    Some(strip_prefix_marker(b_side))
}

/// Parses the hunks of one file section. Only `@@` headers are required;
/// stray prelude lines are skipped.
pub fn parse_hunks(text: &str) -> Result<Vec<DiffHunk>, ParseError> {
    let mut hunks: Vec<DiffHunk> = Vec::new();
    let mut current: Option<DiffHunk> = None;
    let mut old_line = 0u32;
    let mut new_line = 0u32;

    for line in text.lines() {
        if line.starts_with("@@") {
            if let Some(hunk) = current.take() {
                hunks.push(hunk);
            }
            let (old_start, old_lines, new_start, new_lines) = parse_hunk_header(line)?;
            old_line = old_start;
            new_line = new_start;
            current = Some(DiffHunk {
                old_start,
                old_lines,
                new_start,
                new_lines,
                lines: Vec::new(),
            });
            continue;
        }

        // `\ No newline at end of file` and similar markers.
        if line.starts_with("\\ ") {
            continue;
        }

        let Some(hunk) = current.as_mut() else {
            continue;
        };

        if let Some(rest) = line.strip_prefix('+') {
            hunk.lines.push(DiffLine::Added {
                new_line,
                content: rest.to_string(),
            });
            new_line += 1;
        } else if let Some(rest) = line.strip_prefix('-') {
            hunk.lines.push(DiffLine::Removed {
                old_line,
                content: rest.to_string(),
            });
            old_line += 1;
        } else if let Some(rest) = line.strip_prefix(' ') {
            hunk.lines.push(DiffLine::Context {
                old_line,
                new_line,
                content: rest.to_string(),
            });
            old_line += 1;
            new_line += 1;
        }
        // Anything else (diff/index/mode headers between hunks) is skipped.
    }

    if let Some(hunk) = current.take() {
        hunks.push(hunk);
    }
    Ok(hunks)
}

/// `@@ -12,7 +12,9 @@ fn main()` → (12, 7, 12, 9). A missing length
/// defaults to 1 per unified-diff convention.
fn parse_hunk_header(line: &str) -> Result<(u32, u32, u32, u32), ParseError> {
    let bad = || ParseError::InvalidHunkHeader(line.to_string());

    let core = line
        .trim_start_matches('@')
        .trim_start()
        .split("@@")
        .next()
        .ok_or_else(bad)?
        .trim();
    let (left, right) = core.split_once('+').ok_or_else(bad)?;

    let (old_start, old_lines) = split_nums(left.trim().trim_start_matches('-')).ok_or_else(bad)?;
    let (new_start, new_lines) = split_nums(right.trim()).ok_or_else(bad)?;
    Ok((old_start, old_lines, new_start, new_lines))
}

/// Splits `"12,7"` or `"12"` into (start, len).
fn split_nums(s: &str) -> Option<(u32, u32)> {
    let s = s.trim();
    if let Some((a, b)) = s.split_once(',') {
        Some((a.trim().parse().ok()?, b.trim().parse().ok()?))
    } else {
        Some((s.parse().ok()?, 1))
    }
}

/// Widens each hunk with up to `window` unchanged lines on both sides,
/// pulling content from the file at head (new side). Existing context
/// lines in the patch count toward the window, and widening never crosses
/// into a neighboring hunk or past the ends of the file.
pub fn widen_hunks(hunks: &[DiffHunk], file_lines: &[&str], window: u32) -> Vec<DiffHunk> {
    let total = file_lines.len() as u32;
    let mut out: Vec<DiffHunk> = Vec::with_capacity(hunks.len());
    // Lowest new-side line the current hunk may extend up into.
    let mut floor: u32 = 1;

    for (idx, hunk) in hunks.iter().enumerate() {
        let mut h = hunk.clone();

        // First line the hunk covers on each side; zero-length sides anchor
        // to the position after the header number.
        let new_first = if h.new_lines > 0 { h.new_start } else { h.new_start + 1 };
        let old_first = if h.old_lines > 0 { h.old_start } else { h.old_start + 1 };

        let leading = h
            .lines
            .iter()
            .take_while(|l| matches!(l, DiffLine::Context { .. }))
            .count() as u32;
        let need_before = window.saturating_sub(leading);
        let take_before = need_before
            .min(new_first.saturating_sub(floor))
            .min(old_first.saturating_sub(1));

        if take_before > 0 {
            let mut widened = Vec::with_capacity(h.lines.len() + take_before as usize);
            for i in 0..take_before {
                let new_line = new_first - take_before + i;
                let old_line = old_first - take_before + i;
                widened.push(DiffLine::Context {
                    old_line,
                    new_line,
                    content: line_at(file_lines, new_line),
                });
            }
            widened.append(&mut h.lines);
            h.lines = widened;
            h.new_start = new_first - take_before;
            h.old_start = old_first - take_before;
            h.new_lines += take_before;
            h.old_lines += take_before;
        }

        let new_last = if h.new_lines > 0 {
            h.new_start + h.new_lines - 1
        } else {
            h.new_start
        };
        let old_last = if h.old_lines > 0 {
            h.old_start + h.old_lines - 1
        } else {
            h.old_start
        };

        let trailing = h
            .lines
            .iter()
            .rev()
            .take_while(|l| matches!(l, DiffLine::Context { .. }))
            .count() as u32;
        let need_after = window.saturating_sub(trailing);
        let ceiling = hunks
            .get(idx + 1)
            .map(|n| {
                let next_first = if n.new_lines > 0 { n.new_start } else { n.new_start + 1 };
                next_first.saturating_sub(1)
            })
            .unwrap_or(total)
            .min(total);
        let take_after = need_after.min(ceiling.saturating_sub(new_last));

        if take_after > 0 {
            for i in 1..=take_after {
                h.lines.push(DiffLine::Context {
                    old_line: old_last + i,
                    new_line: new_last + i,
                    content: line_at(file_lines, new_last + i),
                });
            }
            // A side that was empty now starts at its first appended line.
            if h.new_lines == 0 {
                h.new_start = new_last + 1;
            }
            if h.old_lines == 0 {
                h.old_start = old_last + 1;
            }
            h.new_lines += take_after;
            h.old_lines += take_after;
        }

        floor = h.new_end() + 1;
        out.push(h);
    }

    out
}

/// 1-based lookup; out-of-range lines (diff/raw fetch race) come back
/// empty rather than failing the run.
fn line_at(file_lines: &[&str], number: u32) -> String {
    file_lines
        .get(number as usize - 1)
        .copied()
        .unwrap_or_default()
        .to_string()
}
