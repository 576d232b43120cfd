//! `skillgraph metadata show|set`: inspect or rewrite a script file's inline block.

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use skillgraph_core::script::metadata;

fn label(file: &Path) -> String {
    file.display().to_string()
}

pub fn cmd_show(file: &Path) -> Result<()> {
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let label = label(file);
    let dependencies = metadata::extract_dependencies(&body, Some(&label))?;
    let runtime_version = metadata::extract_runtime_version(&body, Some(&label))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "hasMetadata": metadata::has_metadata(&body),
            "dependencies": dependencies,
            "requiresPython": runtime_version,
        }))?
    );
    Ok(())
}

pub fn cmd_set(file: &Path, deps: &[String], requires_python: Option<&str>) -> Result<()> {
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let updated = metadata::add_or_replace(&body, deps, requires_python);
    std::fs::write(file, updated).with_context(|| format!("Failed to write {}", file.display()))?;
    eprintln!(
        "Updated {} ({} dependencies)",
        file.display(),
        deps.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_then_read_back() {
        let dir = tempfile::tempdir().expect("tempdir");
        let file = dir.path().join("tool.py");
        std::fs::write(
            &file,
            "# /// script\n# dependencies = [\"old\"]\n# ///\nimport json\n",
        )
        .expect("write");

        cmd_set(&file, &["requests>=2.31".to_string()], Some(">=3.11")).expect("set");

        let body = std::fs::read_to_string(&file).expect("read");
        assert_eq!(
            metadata::extract_dependencies(&body, None).expect("deps"),
            vec!["requests>=2.31"]
        );
        assert_eq!(
            metadata::extract_runtime_version(&body, None).expect("version").as_deref(),
            Some(">=3.11")
        );
        assert!(body.contains("import json"));
        assert!(!body.contains("\"old\""));
    }
}
