//! Strips top-level `if __name__ == "__main__":` blocks from script bodies.
//!
//! Composed scripts share one namespace, so a guard block from any of them would run as a
//! side effect. The syntax tree is used when the body parses; otherwise a line-based pattern
//! match removes the block on a best-effort basis.

use std::sync::OnceLock;

use regex::Regex;
use tree_sitter::{Node, Parser};

const NAME_INDICATOR: &str = "__name__";

/// Cheap pre-check before parsing: the name indicator plus a conditional keyword.
pub fn has_likely_entry_point_block(body: &str) -> bool {
    body.contains(NAME_INDICATOR) && body.contains("if")
}

/// Remove every top-level entry-point block. `label` tags log lines.
///
/// Bodies without such a block are returned unchanged, byte for byte.
pub fn remove_entry_point_block(body: &str, label: &str) -> String {
    if !has_likely_entry_point_block(body) {
        return body.to_string();
    }
    match guard_ranges(body) {
        Some(ranges) => {
            if ranges.is_empty() {
                return body.to_string();
            }
            for (start, end) in &ranges {
                tracing::info!(
                    script = label,
                    start_line = start + 1,
                    end_line = end + 1,
                    "stripped entry-point block"
                );
            }
            drop_rows(body, &ranges)
        }
        None => {
            tracing::warn!(script = label, "script does not parse, falling back to pattern match");
            remove_with_pattern(body, label)
        }
    }
}

/// Zero-based inclusive row ranges of guard blocks, or `None` when the body does not parse.
fn guard_ranges(body: &str) -> Option<Vec<(usize, usize)>> {
    let mut parser = Parser::new();
    parser.set_language(tree_sitter_python::language()).ok()?;
    let tree = parser.parse(body, None)?;
    let root = tree.root_node();
    if root.has_error() {
        return None;
    }

    let source = body.as_bytes();
    let mut ranges = Vec::new();
    for i in 0..root.named_child_count() {
        let Some(child) = root.named_child(i) else {
            continue;
        };
        if child.kind() != "if_statement" || !is_main_guard(&child, source) {
            continue;
        }
        let start = child.start_position().row;
        let end_pos = child.end_position();
        let end = if end_pos.column == 0 && end_pos.row > start {
            end_pos.row - 1
        } else {
            end_pos.row
        };
        ranges.push((start, end));
    }
    Some(ranges)
}

/// `__name__ == "__main__"` in either operand order, optionally parenthesized.
fn is_main_guard(if_node: &Node, source: &[u8]) -> bool {
    let Some(mut condition) = if_node.child_by_field_name("condition") else {
        return false;
    };
    while condition.kind() == "parenthesized_expression" {
        match condition.named_child(0) {
            Some(inner) => condition = inner,
            None => return false,
        }
    }
    if condition.kind() != "comparison_operator" || condition.child_count() != 3 {
        return false;
    }
    let (Some(left), Some(op), Some(right)) =
        (condition.child(0), condition.child(1), condition.child(2))
    else {
        return false;
    };
    if op.kind() != "==" {
        return false;
    }
    (is_name_indicator(&left, source) && is_main_literal(&right, source))
        || (is_main_literal(&left, source) && is_name_indicator(&right, source))
}

fn is_name_indicator(node: &Node, source: &[u8]) -> bool {
    node.kind() == "identifier" && node.utf8_text(source).map_or(false, |t| t == NAME_INDICATOR)
}

fn is_main_literal(node: &Node, source: &[u8]) -> bool {
    node.kind() == "string"
        && node
            .utf8_text(source)
            .map_or(false, |t| t == "\"__main__\"" || t == "'__main__'")
}

fn drop_rows(body: &str, ranges: &[(usize, usize)]) -> String {
    let kept: Vec<&str> = body
        .split('\n')
        .enumerate()
        .filter(|(row, _)| !ranges.iter().any(|(s, e)| row >= s && row <= e))
        .map(|(_, line)| line)
        .collect();
    join_trimmed(kept)
}

fn join_trimmed(mut lines: Vec<&str>) -> String {
    while lines.last().map_or(false, |l| l.trim().is_empty()) {
        lines.pop();
    }
    lines.join("\n")
}

fn guard_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| {
            Regex::new(
                r#"^if\s+\(?\s*(?:__name__\s*==\s*["']__main__["']|["']__main__["']\s*==\s*__name__)\s*\)?\s*:"#,
            )
            .ok()
        })
        .as_ref()
}

/// Drop each unindented guard line and the blank or indented lines that follow it.
fn remove_with_pattern(body: &str, label: &str) -> String {
    let Some(pattern) = guard_pattern() else {
        return body.to_string();
    };
    let mut kept = Vec::new();
    let mut in_guard = false;
    let mut removed = 0usize;

    for (row, line) in body.split('\n').enumerate() {
        if in_guard {
            if line.trim().is_empty() || line.starts_with(|c: char| c == ' ' || c == '\t') {
                removed += 1;
                continue;
            }
            in_guard = false;
        }
        if pattern.is_match(line) {
            tracing::info!(script = label, start_line = row + 1, "stripped entry-point block (pattern)");
            in_guard = true;
            removed += 1;
            continue;
        }
        kept.push(line);
    }

    if removed == 0 {
        return body.to_string();
    }
    join_trimmed(kept)
}
