//! Inline script metadata (`# /// script` ... `# ///`).
//!
//! The block body is TOML once the leading `# ` of every line is removed:
//!
//! ```text
//! # /// script
//! # requires-python = ">=3.12"
//! # dependencies = ["requests>=2.31"]
//! # ///
//! ```

use std::collections::BTreeSet;

use crate::error::{Error, Result};

pub const BLOCK_START: &str = "# /// script";
pub const BLOCK_END: &str = "# ///";

const DEPENDENCIES_KEY: &str = "dependencies";
const RUNTIME_VERSION_KEY: &str = "requires-python";

/// True iff a start marker line is followed by an end marker line.
pub fn has_metadata(body: &str) -> bool {
    let mut lines = body.lines().map(str::trim);
    lines.any(|l| l == BLOCK_START) && lines.any(|l| l == BLOCK_END)
}

/// Raw TOML text of the first block, or `None` when there is no block or it is empty.
pub fn extract_block(body: &str) -> Option<String> {
    let mut in_block = false;
    let mut collected: Vec<&str> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if !in_block {
            if trimmed == BLOCK_START {
                in_block = true;
            }
            continue;
        }
        if trimmed == BLOCK_END {
            break;
        }
        if let Some(rest) = trimmed.strip_prefix("# ") {
            collected.push(rest);
        } else if trimmed == "#" {
            collected.push("");
        } else {
            tracing::warn!(line = %line, "skipping malformed line in script metadata block");
        }
    }

    if collected.is_empty() {
        None
    } else {
        Some(collected.join("\n"))
    }
}

/// Parse the block as TOML. `script` labels errors.
pub fn parse_metadata(body: &str, script: Option<&str>) -> Result<Option<toml::Table>> {
    let Some(block) = extract_block(body) else {
        return Ok(None);
    };
    block
        .parse::<toml::Table>()
        .map(Some)
        .map_err(|e| Error::dependency_parse(script, format!("invalid TOML: {}", e.to_string().trim())))
}

/// The `dependencies` list. Absent block or key yields an empty list.
pub fn extract_dependencies(body: &str, script: Option<&str>) -> Result<Vec<String>> {
    let Some(table) = parse_metadata(body, script)? else {
        return Ok(Vec::new());
    };
    let Some(value) = table.get(DEPENDENCIES_KEY) else {
        return Ok(Vec::new());
    };
    let items = value.as_array().ok_or_else(|| {
        Error::dependency_parse(
            script,
            format!("'dependencies' must be a list, got {}", value.type_str()),
        )
    })?;
    items
        .iter()
        .map(|item| {
            item.as_str().map(String::from).ok_or_else(|| {
                Error::dependency_parse(
                    script,
                    format!("'dependencies' entries must be strings, got {}", item.type_str()),
                )
            })
        })
        .collect()
}

/// The `requires-python` constraint, if declared.
pub fn extract_runtime_version(body: &str, script: Option<&str>) -> Result<Option<String>> {
    let Some(table) = parse_metadata(body, script)? else {
        return Ok(None);
    };
    match table.get(RUNTIME_VERSION_KEY) {
        None => Ok(None),
        Some(toml::Value::String(v)) => Ok(Some(v.clone())),
        Some(other) => Err(Error::dependency_parse(
            script,
            format!("'requires-python' must be a string, got {}", other.type_str()),
        )),
    }
}

/// Union of every script's dependencies: exact-string dedup, sorted ascending.
///
/// Items are `(label, body)` pairs; the label only appears in errors.
pub fn merge_dependencies<'a, I>(scripts: I) -> Result<Vec<String>>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let mut merged = BTreeSet::new();
    for (label, body) in scripts {
        merged.extend(extract_dependencies(body, Some(label))?);
    }
    Ok(merged.into_iter().collect())
}

/// Render a metadata block. Values are written as TOML strings, so quotes survive.
pub fn generate_block(dependencies: &[String], runtime_version: Option<&str>) -> String {
    let mut lines = vec![BLOCK_START.to_string()];
    if let Some(version) = runtime_version {
        lines.push(format!(
            "# {} = {}",
            RUNTIME_VERSION_KEY,
            toml::Value::String(version.to_string())
        ));
    }
    if !dependencies.is_empty() {
        lines.push(format!("# {} = [", DEPENDENCIES_KEY));
        for dep in dependencies {
            lines.push(format!("#   {},", toml::Value::String(dep.clone())));
        }
        lines.push("# ]".to_string());
    }
    lines.push(BLOCK_END.to_string());
    lines.join("\n")
}

/// Drop every block line, then any leading blank lines.
pub fn remove_block(body: &str) -> String {
    let mut in_block = false;
    let mut kept: Vec<&str> = Vec::new();

    for line in body.lines() {
        let trimmed = line.trim();
        if !in_block && trimmed == BLOCK_START {
            in_block = true;
            continue;
        }
        if in_block {
            if trimmed == BLOCK_END {
                in_block = false;
            }
            continue;
        }
        kept.push(line);
    }

    let start = kept
        .iter()
        .position(|l| !l.trim().is_empty())
        .unwrap_or(kept.len());
    kept[start..].join("\n")
}

/// Replace any existing block with a freshly generated one at the top of `body`.
pub fn add_or_replace(body: &str, dependencies: &[String], runtime_version: Option<&str>) -> String {
    let cleaned = remove_block(body);
    let block = generate_block(dependencies, runtime_version);
    format!("{}\n\n{}", block, cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUESTS_SCRIPT: &str = r#"# /// script
# requires-python = ">=3.11"
# dependencies = [
#   "requests>=2.31",
#   "rich",
# ]
# ///

import requests

def fetch(url):
    return requests.get(url).json()
"#;

    #[test]
    fn test_has_metadata() {
        assert!(has_metadata(REQUESTS_SCRIPT));
        assert!(!has_metadata("def f():\n    pass\n"));
        assert!(!has_metadata("# /// script\n# dependencies = []\n"));
    }

    #[test]
    fn test_extract_dependencies_and_version() {
        let deps = extract_dependencies(REQUESTS_SCRIPT, Some("fetch")).expect("deps");
        assert_eq!(deps, vec!["requests>=2.31", "rich"]);
        let version = extract_runtime_version(REQUESTS_SCRIPT, None).expect("version");
        assert_eq!(version.as_deref(), Some(">=3.11"));
    }

    #[test]
    fn test_missing_block_yields_nothing() {
        let body = "def f():\n    return 1\n";
        assert!(parse_metadata(body, None).expect("parse").is_none());
        assert!(extract_dependencies(body, None).expect("deps").is_empty());
        assert_eq!(extract_runtime_version(body, None).expect("version"), None);
    }

    #[test]
    fn test_comment_lines_inside_block() {
        let body = "# /// script\n# # pinned for the API client\n#\n# dependencies = [\"httpx\"]\n# ///\n";
        let block = extract_block(body).expect("block");
        assert_eq!(block, "# pinned for the API client\n\ndependencies = [\"httpx\"]");
        assert_eq!(extract_dependencies(body, None).expect("deps"), vec!["httpx"]);
    }

    #[test]
    fn test_indented_block_keeps_its_dependencies() {
        let body = "    # /// script\n    # dependencies = [\"httpx\", \"rich\"]\n    # ///\nX = 1\n";
        assert_eq!(
            extract_dependencies(body, None).expect("deps"),
            vec!["httpx", "rich"]
        );
        assert_eq!(remove_block(body), "X = 1");
    }

    #[test]
    fn test_malformed_line_is_skipped() {
        let body = "# /// script\nnot a comment\n# dependencies = [\"httpx\"]\n# ///\n";
        assert_eq!(extract_dependencies(body, None).expect("deps"), vec!["httpx"]);
    }

    #[test]
    fn test_invalid_toml_is_labeled_error() {
        let body = "# /// script\n# dependencies = [\n# ///\n";
        let err = parse_metadata(body, Some("broken")).unwrap_err();
        match err {
            Error::DependencyParse { script, .. } => assert_eq!(script, "broken"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_list_dependencies_is_error() {
        let body = "# /// script\n# dependencies = \"requests\"\n# ///\n";
        let err = extract_dependencies(body, Some("s")).unwrap_err();
        assert!(err.to_string().contains("must be a list"));

        let body = "# /// script\n# dependencies = [1, 2]\n# ///\n";
        assert!(extract_dependencies(body, Some("s")).is_err());
    }

    #[test]
    fn test_merge_is_sorted_deduplicated_and_order_independent() {
        let a = "# /// script\n# dependencies = [\"requests\", \"pandas>=2\"]\n# ///\n";
        let b = "# /// script\n# dependencies = [\"numpy\", \"requests\"]\n# ///\n";
        let c = "print('no block')\n";

        let ab = merge_dependencies([("a", a), ("b", b), ("c", c)]).expect("merge");
        let ba = merge_dependencies([("c", c), ("b", b), ("a", a)]).expect("merge");
        let twice = merge_dependencies([("a", a), ("b", b), ("a", a), ("b", b)]).expect("merge");
        assert_eq!(ab, vec!["numpy", "pandas>=2", "requests"]);
        assert_eq!(ab, ba);
        assert_eq!(ab, twice);
    }

    #[test]
    fn test_merge_is_case_sensitive() {
        let a = "# /// script\n# dependencies = [\"Requests\"]\n# ///\n";
        let b = "# /// script\n# dependencies = [\"requests\"]\n# ///\n";
        let merged = merge_dependencies([("a", a), ("b", b)]).expect("merge");
        assert_eq!(merged, vec!["Requests", "requests"]);
    }

    #[test]
    fn test_generate_block() {
        let block = generate_block(&["requests".to_string(), "rich>=13".to_string()], Some(">=3.12"));
        assert_eq!(
            block,
            "# /// script\n# requires-python = \">=3.12\"\n# dependencies = [\n#   \"requests\",\n#   \"rich>=13\",\n# ]\n# ///"
        );
        assert_eq!(generate_block(&[], None), "# /// script\n# ///");
    }

    #[test]
    fn test_remove_block_trims_leading_blank_lines() {
        let cleaned = remove_block(REQUESTS_SCRIPT);
        assert!(cleaned.starts_with("import requests"));
        assert!(!cleaned.contains("# ///"));
        assert_eq!(remove_block("x = 1"), "x = 1");
    }

    #[test]
    fn test_add_or_replace_round_trip() {
        let deps = vec!["httpx".to_string(), "pydantic>=2".to_string()];
        let rewritten = add_or_replace(&remove_block(REQUESTS_SCRIPT), &deps, Some(">=3.12"));

        let mut extracted = extract_dependencies(&rewritten, None).expect("deps");
        extracted.sort();
        assert_eq!(extracted, deps);
        assert_eq!(
            extract_runtime_version(&rewritten, None).expect("version").as_deref(),
            Some(">=3.12")
        );
        assert_eq!(rewritten.matches(BLOCK_START).count(), 1);
        assert!(rewritten.contains("def fetch(url):"));
    }

    #[test]
    fn test_add_or_replace_replaces_existing_block() {
        let rewritten = add_or_replace(REQUESTS_SCRIPT, &["polars".to_string()], None);
        assert_eq!(extract_dependencies(&rewritten, None).expect("deps"), vec!["polars"]);
        assert_eq!(extract_runtime_version(&rewritten, None).expect("version"), None);
        assert_eq!(rewritten.matches(BLOCK_START).count(), 1);
    }

    #[test]
    fn test_generated_dependency_with_quote_round_trips() {
        let deps = vec!["pkg; extra == \"cli\"".to_string()];
        let rewritten = add_or_replace("pass", &deps, None);
        assert_eq!(extract_dependencies(&rewritten, None).expect("deps"), deps);
    }
}
