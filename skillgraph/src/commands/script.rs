//! `skillgraph script add|show|list`

use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use skillgraph_core::graph::{NodeType, ScriptArtifact};
use skillgraph_core::script::metadata;
use skillgraph_core::Error;

use crate::context::AppContext;

pub fn cmd_add(ctx: &AppContext, name: &str, description: &str, signature: &str, file: &Path) -> Result<()> {
    let body = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    // Reject malformed inline metadata now rather than at execution time.
    let dependencies = metadata::extract_dependencies(&body, Some(name))?;

    let node = ctx.graph.create_node(
        NodeType::Script,
        name,
        ScriptArtifact::properties(description, signature, &body),
    )?;
    tracing::info!(script = name, dependencies = dependencies.len(), "stored script");
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "id": node.id,
            "name": node.name,
            "dependencies": dependencies,
        }))?
    );
    Ok(())
}

pub fn cmd_show(ctx: &AppContext, name: &str) -> Result<()> {
    let node = ctx
        .graph
        .get_node_by_name(NodeType::Script, name)?
        .ok_or_else(|| Error::not_found(NodeType::Script.as_str(), name))?;
    let script = ScriptArtifact::from_node(&node)?;
    let dependencies = metadata::extract_dependencies(&script.body, Some(name))?;
    let runtime_version = metadata::extract_runtime_version(&script.body, Some(name))?;
    println!(
        "{}",
        serde_json::to_string_pretty(&json!({
            "script": script,
            "dependencies": dependencies,
            "requiresPython": runtime_version,
        }))?
    );
    Ok(())
}

pub fn cmd_list(ctx: &AppContext) -> Result<()> {
    let scripts: Vec<_> = ctx
        .graph
        .list_nodes(Some(NodeType::Script))?
        .iter()
        .filter_map(|n| ScriptArtifact::from_node(n).ok())
        .map(|s| json!({ "name": s.name, "description": s.description, "signature": s.function_signature }))
        .collect();
    println!("{}", serde_json::to_string_pretty(&scripts)?);
    Ok(())
}
