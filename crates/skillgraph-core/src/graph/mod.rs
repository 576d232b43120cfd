//! Property graph model and the store capability trait.
//!
//! The execution core only needs `get_node_by_name` and `get_connected_nodes`; the rest
//! serves the CLI and bundle management.

mod artifacts;
mod memory;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub use artifacts::{EnvironmentBundle, ScriptArtifact};
pub use memory::MemoryGraph;

pub type Properties = serde_json::Map<String, serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum NodeType {
    Skill,
    Knowledge,
    Script,
    Env,
}

impl NodeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Skill => "SKILL",
            Self::Knowledge => "KNOWLEDGE",
            Self::Script => "SCRIPT",
            Self::Env => "ENV",
        }
    }

    /// Knowledge nodes may share a name; every other type is unique by name.
    pub fn has_unique_name(&self) -> bool {
        !matches!(self, Self::Knowledge)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "SKILL" => Ok(Self::Skill),
            "KNOWLEDGE" => Ok(Self::Knowledge),
            "SCRIPT" => Ok(Self::Script),
            "ENV" => Ok(Self::Env),
            other => Err(Error::Validation(format!("unknown node type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    Contains,
    RelateTo,
}

impl EdgeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Contains => "CONTAINS",
            Self::RelateTo => "RELATE_TO",
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_uppercase().as_str() {
            "CONTAINS" => Ok(Self::Contains),
            "RELATE_TO" => Ok(Self::RelateTo),
            other => Err(Error::Validation(format!("unknown edge type '{}'", other))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Outgoing,
    Incoming,
    Both,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub node_type: NodeType,
    pub name: String,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Node {
    pub fn new(node_type: NodeType, name: &str, properties: Properties) -> Self {
        let now = Utc::now();
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            node_type,
            name: name.to_string(),
            properties,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn property_str(&self, key: &str) -> Option<&str> {
        self.properties.get(key).and_then(|v| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub edge_type: EdgeType,
    pub source_id: String,
    pub target_id: String,
    pub properties: Properties,
    pub created_at: DateTime<Utc>,
}

impl Edge {
    pub fn new(edge_type: EdgeType, source_id: &str, target_id: &str, properties: Properties) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            edge_type,
            source_id: source_id.to_string(),
            target_id: target_id.to_string(),
            properties,
            created_at: Utc::now(),
        }
    }
}

/// Node/edge CRUD plus traversal over a property graph.
///
/// Implementations enforce per-type name uniqueness and reject CONTAINS cycles.
/// `get_connected_nodes` returns nodes in edge creation order.
pub trait GraphStore: Send + Sync {
    fn create_node(&self, node_type: NodeType, name: &str, properties: Properties) -> Result<Node>;

    /// Fails with `NotFound` when no node has this id.
    fn get_node(&self, id: &str) -> Result<Node>;

    fn get_node_by_name(&self, node_type: NodeType, name: &str) -> Result<Option<Node>>;

    /// Merge `properties` into the node's existing properties.
    fn update_node(&self, id: &str, properties: Properties) -> Result<Node>;

    /// Delete the node and every edge touching it. Returns false when it did not exist.
    fn delete_node(&self, id: &str) -> Result<bool>;

    fn list_nodes(&self, node_type: Option<NodeType>) -> Result<Vec<Node>>;

    fn create_edge(
        &self,
        edge_type: EdgeType,
        source_id: &str,
        target_id: &str,
        properties: Properties,
    ) -> Result<Edge>;

    fn delete_edge(&self, edge_type: EdgeType, source_id: &str, target_id: &str) -> Result<bool>;

    fn get_connected_nodes(
        &self,
        node_id: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Result<Vec<Node>>;

    /// Would a CONTAINS edge `source -> target` close a cycle?
    fn would_create_cycle(&self, source_id: &str, target_id: &str) -> Result<bool> {
        if source_id == target_id {
            return Ok(true);
        }
        let mut stack = vec![target_id.to_string()];
        let mut seen = std::collections::HashSet::new();
        while let Some(current) = stack.pop() {
            if !seen.insert(current.clone()) {
                continue;
            }
            for next in self.get_connected_nodes(&current, Some(EdgeType::Contains), Direction::Outgoing)? {
                if next.id == source_id {
                    return Ok(true);
                }
                stack.push(next.id);
            }
        }
        Ok(false)
    }
}
