//! Composite program assembly: one dependency header, the cleaned imported scripts in
//! import order, then the user's code.

use skillgraph_core::graph::ScriptArtifact;
use skillgraph_core::script::{entry_point, metadata};
use skillgraph_core::Result;

pub const SCRIPT_MARKER: &str = "# Script: ";
pub const USER_CODE_MARKER: &str = "# User Code";

/// Body without its own metadata block or top-level entry-point block.
pub fn clean_script_body(script: &ScriptArtifact) -> String {
    let without_block = metadata::remove_block(&script.body);
    entry_point::remove_entry_point_block(&without_block, &script.name)
}

/// Sorted union of the imported scripts' declared dependencies.
pub fn merge_script_dependencies(scripts: &[ScriptArtifact]) -> Result<Vec<String>> {
    metadata::merge_dependencies(scripts.iter().map(|s| (s.name.as_str(), s.body.as_str())))
}

/// Deterministic: the same inputs always produce the same text.
pub fn build_program(
    scripts: &[ScriptArtifact],
    user_code: &str,
    dependencies: &[String],
    runtime_version: Option<&str>,
) -> String {
    let mut parts: Vec<String> = Vec::new();

    if !dependencies.is_empty() {
        parts.push(metadata::generate_block(dependencies, runtime_version));
        parts.push(String::new());
    }

    for script in scripts {
        parts.push(format!("{}{}", SCRIPT_MARKER, script.name));
        parts.push(clean_script_body(script).trim().to_string());
        parts.push(String::new());
    }

    parts.push(USER_CODE_MARKER.to_string());
    parts.push(user_code.trim().to_string());
    parts.push(String::new());

    parts.join("\n")
}
