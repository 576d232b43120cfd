//! `skillgraph link`

use anyhow::{Context, Result};

use skillgraph_core::graph::{EdgeType, NodeType, Properties};
use skillgraph_core::Error;

use crate::cli::LinkArgs;
use crate::context::AppContext;

pub fn cmd_link(ctx: &AppContext, args: &LinkArgs) -> Result<()> {
    let from_type: NodeType = args.from_type.parse().context("Invalid --from-type")?;
    let to_type: NodeType = args.to_type.parse().context("Invalid --to-type")?;
    let edge_type: EdgeType = args.edge.parse().context("Invalid --edge")?;

    let from = ctx
        .graph
        .get_node_by_name(from_type, &args.from)?
        .ok_or_else(|| Error::not_found(from_type.as_str(), args.from.as_str()))?;
    let to = ctx
        .graph
        .get_node_by_name(to_type, &args.to)?
        .ok_or_else(|| Error::not_found(to_type.as_str(), args.to.as_str()))?;

    let edge = ctx
        .graph
        .create_edge(edge_type, &from.id, &to.id, Properties::new())?;
    eprintln!(
        "Linked {} '{}' -[{}]-> {} '{}'",
        from_type, from.name, edge.edge_type, to_type, to.name
    );
    Ok(())
}
