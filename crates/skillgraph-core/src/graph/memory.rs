//! In-process graph store.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;

use super::{Direction, Edge, EdgeType, GraphStore, Node, NodeType, Properties};
use crate::error::{Error, Result};

#[derive(Default)]
struct State {
    nodes: Vec<Node>,
    edges: Vec<Edge>,
}

/// `GraphStore` kept entirely in memory. Nothing survives the process.
#[derive(Default)]
pub struct MemoryGraph {
    state: RwLock<State>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, State>> {
        self.state
            .read()
            .map_err(|_| Error::Storage("graph lock poisoned".to_string()))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, State>> {
        self.state
            .write()
            .map_err(|_| Error::Storage("graph lock poisoned".to_string()))
    }
}

impl GraphStore for MemoryGraph {
    fn create_node(&self, node_type: NodeType, name: &str, properties: Properties) -> Result<Node> {
        let mut state = self.write()?;
        if node_type.has_unique_name()
            && state
                .nodes
                .iter()
                .any(|n| n.node_type == node_type && n.name == name)
        {
            return Err(Error::AlreadyExists {
                node_type: node_type.to_string(),
                name: name.to_string(),
            });
        }
        let node = Node::new(node_type, name, properties);
        state.nodes.push(node.clone());
        Ok(node)
    }

    fn get_node(&self, id: &str) -> Result<Node> {
        self.read()?
            .nodes
            .iter()
            .find(|n| n.id == id)
            .cloned()
            .ok_or_else(|| Error::not_found("node", id))
    }

    fn get_node_by_name(&self, node_type: NodeType, name: &str) -> Result<Option<Node>> {
        Ok(self
            .read()?
            .nodes
            .iter()
            .find(|n| n.node_type == node_type && n.name == name)
            .cloned())
    }

    fn update_node(&self, id: &str, properties: Properties) -> Result<Node> {
        let mut state = self.write()?;
        let node = state
            .nodes
            .iter_mut()
            .find(|n| n.id == id)
            .ok_or_else(|| Error::not_found("node", id))?;
        node.properties.extend(properties);
        node.updated_at = Utc::now();
        Ok(node.clone())
    }

    fn delete_node(&self, id: &str) -> Result<bool> {
        let mut state = self.write()?;
        let before = state.nodes.len();
        state.nodes.retain(|n| n.id != id);
        if state.nodes.len() == before {
            return Ok(false);
        }
        state.edges.retain(|e| e.source_id != id && e.target_id != id);
        Ok(true)
    }

    fn list_nodes(&self, node_type: Option<NodeType>) -> Result<Vec<Node>> {
        Ok(self
            .read()?
            .nodes
            .iter()
            .filter(|n| node_type.map_or(true, |t| n.node_type == t))
            .cloned()
            .collect())
    }

    fn create_edge(
        &self,
        edge_type: EdgeType,
        source_id: &str,
        target_id: &str,
        properties: Properties,
    ) -> Result<Edge> {
        self.get_node(source_id)?;
        self.get_node(target_id)?;
        if edge_type == EdgeType::Contains && self.would_create_cycle(source_id, target_id)? {
            return Err(Error::CircularDependency {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            });
        }
        let edge = Edge::new(edge_type, source_id, target_id, properties);
        self.write()?.edges.push(edge.clone());
        Ok(edge)
    }

    fn delete_edge(&self, edge_type: EdgeType, source_id: &str, target_id: &str) -> Result<bool> {
        let mut state = self.write()?;
        let before = state.edges.len();
        state.edges.retain(|e| {
            !(e.edge_type == edge_type && e.source_id == source_id && e.target_id == target_id)
        });
        Ok(state.edges.len() != before)
    }

    fn get_connected_nodes(
        &self,
        node_id: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Result<Vec<Node>> {
        let state = self.read()?;
        let neighbour_ids = state
            .edges
            .iter()
            .filter(|e| edge_type.map_or(true, |t| e.edge_type == t))
            .filter_map(|e| match direction {
                Direction::Outgoing if e.source_id == node_id => Some(&e.target_id),
                Direction::Incoming if e.target_id == node_id => Some(&e.source_id),
                Direction::Both if e.source_id == node_id => Some(&e.target_id),
                Direction::Both if e.target_id == node_id => Some(&e.source_id),
                _ => None,
            });
        Ok(neighbour_ids
            .filter_map(|id| state.nodes.iter().find(|n| &n.id == id).cloned())
            .collect())
    }
}
