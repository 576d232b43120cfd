//! SQLite graph store: `nodes` and `relationships` tables, JSON properties.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use skillgraph_core::graph::{Direction, Edge, EdgeType, GraphStore, Node, NodeType, Properties};
use skillgraph_core::{Error, Result};

const NODE_COLUMNS: &str = "n.id, n.node_type, n.name, n.properties, n.created_at, n.updated_at";

fn storage(e: rusqlite::Error) -> Error {
    Error::Storage(e.to_string())
}

// ─── Schema ─────────────────────────────────────────────────────────────────

fn ensure_graph_tables(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            node_type TEXT NOT NULL,
            name TEXT NOT NULL,
            properties TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS relationships (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            id TEXT NOT NULL UNIQUE,
            rel_type TEXT NOT NULL,
            source_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            target_id TEXT NOT NULL REFERENCES nodes(id) ON DELETE CASCADE,
            properties TEXT NOT NULL DEFAULT '{}',
            created_at TEXT NOT NULL
        );

        CREATE UNIQUE INDEX IF NOT EXISTS idx_nodes_unique_name
            ON nodes(node_type, name) WHERE node_type IN ('SKILL', 'SCRIPT', 'ENV');
        CREATE INDEX IF NOT EXISTS idx_nodes_type ON nodes(node_type);
        CREATE INDEX IF NOT EXISTS idx_rel_source ON relationships(source_id, rel_type);
        CREATE INDEX IF NOT EXISTS idx_rel_target ON relationships(target_id, rel_type);
        "#,
    )
    .map_err(storage)
}

// ─── Row decoding ───────────────────────────────────────────────────────────

struct NodeRow {
    id: String,
    node_type: String,
    name: String,
    properties: String,
    created_at: String,
    updated_at: String,
}

impl NodeRow {
    fn read(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            node_type: row.get(1)?,
            name: row.get(2)?,
            properties: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn into_node(self) -> Result<Node> {
        let properties: Properties = serde_json::from_str(&self.properties)
            .map_err(|e| Error::Storage(format!("node {} has corrupt properties: {}", self.id, e)))?;
        Ok(Node {
            node_type: self.node_type.parse::<NodeType>()?,
            name: self.name,
            properties,
            created_at: parse_ts(&self.created_at)?,
            updated_at: parse_ts(&self.updated_at)?,
            id: self.id,
        })
    }
}

fn parse_ts(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| Error::Storage(format!("bad timestamp '{}': {}", raw, e)))
}

fn encode_properties(properties: &Properties) -> Result<String> {
    serde_json::to_string(properties).map_err(|e| Error::Storage(e.to_string()))
}

fn collect_nodes(rows: impl Iterator<Item = rusqlite::Result<NodeRow>>) -> Result<Vec<Node>> {
    rows.map(|r| r.map_err(storage).and_then(NodeRow::into_node))
        .collect()
}

// ─── Store ──────────────────────────────────────────────────────────────────

/// `GraphStore` persisted in one SQLite database.
pub struct SqliteGraph {
    conn: Mutex<Connection>,
}

impl SqliteGraph {
    /// Open (or create) the database at `path` and ensure the schema exists.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::Storage(format!("cannot create {}: {}", parent.display(), e))
            })?;
        }
        let conn = Connection::open(path).map_err(storage)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")
            .map_err(storage)?;
        ensure_graph_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(storage)?;
        conn.execute_batch("PRAGMA foreign_keys=ON;").map_err(storage)?;
        ensure_graph_tables(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::Storage("sqlite connection lock poisoned".to_string()))
    }

    fn node_exists(conn: &Connection, id: &str) -> Result<bool> {
        conn.query_row("SELECT 1 FROM nodes WHERE id = ?1", params![id], |_| Ok(()))
            .optional()
            .map(|found| found.is_some())
            .map_err(storage)
    }
}

impl GraphStore for SqliteGraph {
    fn create_node(&self, node_type: NodeType, name: &str, properties: Properties) -> Result<Node> {
        let conn = self.conn()?;
        if node_type.has_unique_name() {
            let taken = conn
                .query_row(
                    "SELECT 1 FROM nodes WHERE node_type = ?1 AND name = ?2",
                    params![node_type.as_str(), name],
                    |_| Ok(()),
                )
                .optional()
                .map_err(storage)?;
            if taken.is_some() {
                return Err(Error::AlreadyExists {
                    node_type: node_type.to_string(),
                    name: name.to_string(),
                });
            }
        }
        let node = Node::new(node_type, name, properties);
        conn.execute(
            "INSERT INTO nodes (id, node_type, name, properties, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                node.id,
                node.node_type.as_str(),
                node.name,
                encode_properties(&node.properties)?,
                node.created_at.to_rfc3339(),
                node.updated_at.to_rfc3339(),
            ],
        )
        .map_err(storage)?;
        tracing::debug!(id = %node.id, node_type = %node_type, name, "created node");
        Ok(node)
    }

    fn get_node(&self, id: &str) -> Result<Node> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!("SELECT {} FROM nodes n WHERE n.id = ?1", NODE_COLUMNS),
                params![id],
                NodeRow::read,
            )
            .optional()
            .map_err(storage)?;
        row.ok_or_else(|| Error::not_found("node", id))?.into_node()
    }

    fn get_node_by_name(&self, node_type: NodeType, name: &str) -> Result<Option<Node>> {
        let conn = self.conn()?;
        let row = conn
            .query_row(
                &format!(
                    "SELECT {} FROM nodes n WHERE n.node_type = ?1 AND n.name = ?2
                     ORDER BY n.created_at LIMIT 1",
                    NODE_COLUMNS
                ),
                params![node_type.as_str(), name],
                NodeRow::read,
            )
            .optional()
            .map_err(storage)?;
        row.map(NodeRow::into_node).transpose()
    }

    fn update_node(&self, id: &str, properties: Properties) -> Result<Node> {
        let mut node = self.get_node(id)?;
        node.properties.extend(properties);
        node.updated_at = Utc::now();
        let conn = self.conn()?;
        conn.execute(
            "UPDATE nodes SET properties = ?1, updated_at = ?2 WHERE id = ?3",
            params![
                encode_properties(&node.properties)?,
                node.updated_at.to_rfc3339(),
                id
            ],
        )
        .map_err(storage)?;
        Ok(node)
    }

    fn delete_node(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        // Foreign-key cascade drops the node's relationships.
        let removed = conn
            .execute("DELETE FROM nodes WHERE id = ?1", params![id])
            .map_err(storage)?;
        Ok(removed > 0)
    }

    fn list_nodes(&self, node_type: Option<NodeType>) -> Result<Vec<Node>> {
        let conn = self.conn()?;
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {} FROM nodes n WHERE (?1 IS NULL OR n.node_type = ?1)
                 ORDER BY n.created_at, n.name",
                NODE_COLUMNS
            ))
            .map_err(storage)?;
        let rows = stmt
            .query_map(params![node_type.map(|t| t.as_str())], NodeRow::read)
            .map_err(storage)?;
        collect_nodes(rows)
    }

    fn create_edge(
        &self,
        edge_type: EdgeType,
        source_id: &str,
        target_id: &str,
        properties: Properties,
    ) -> Result<Edge> {
        {
            let conn = self.conn()?;
            for id in [source_id, target_id] {
                if !Self::node_exists(&conn, id)? {
                    return Err(Error::not_found("node", id));
                }
            }
        }
        if edge_type == EdgeType::Contains && self.would_create_cycle(source_id, target_id)? {
            return Err(Error::CircularDependency {
                source_id: source_id.to_string(),
                target_id: target_id.to_string(),
            });
        }

        let edge = Edge::new(edge_type, source_id, target_id, properties);
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO relationships (id, rel_type, source_id, target_id, properties, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                edge.id,
                edge.edge_type.as_str(),
                edge.source_id,
                edge.target_id,
                encode_properties(&edge.properties)?,
                edge.created_at.to_rfc3339(),
            ],
        )
        .map_err(storage)?;
        tracing::debug!(edge_type = %edge_type, source_id, target_id, "created edge");
        Ok(edge)
    }

    fn delete_edge(&self, edge_type: EdgeType, source_id: &str, target_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let removed = conn
            .execute(
                "DELETE FROM relationships WHERE rel_type = ?1 AND source_id = ?2 AND target_id = ?3",
                params![edge_type.as_str(), source_id, target_id],
            )
            .map_err(storage)?;
        Ok(removed > 0)
    }

    fn get_connected_nodes(
        &self,
        node_id: &str,
        edge_type: Option<EdgeType>,
        direction: Direction,
    ) -> Result<Vec<Node>> {
        let (join_on, filter) = match direction {
            Direction::Outgoing => ("r.target_id", "r.source_id = ?1"),
            Direction::Incoming => ("r.source_id", "r.target_id = ?1"),
            Direction::Both => (
                "CASE WHEN r.source_id = ?1 THEN r.target_id ELSE r.source_id END",
                "(r.source_id = ?1 OR r.target_id = ?1)",
            ),
        };
        let sql = format!(
            "SELECT {} FROM relationships r JOIN nodes n ON n.id = {}
             WHERE {} AND (?2 IS NULL OR r.rel_type = ?2)
             ORDER BY r.seq",
            NODE_COLUMNS, join_on, filter
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(storage)?;
        let rows = stmt
            .query_map(params![node_id, edge_type.map(|t| t.as_str())], NodeRow::read)
            .map_err(storage)?;
        collect_nodes(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props(description: &str) -> Properties {
        let mut p = Properties::new();
        p.insert("description".into(), json!(description));
        p
    }

    #[test]
    fn test_node_round_trip_through_file() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("graph.db");
        let id = {
            let graph = SqliteGraph::open(&path).expect("open");
            graph
                .create_node(NodeType::Script, "add", props("adds"))
                .expect("create")
                .id
        };
        let graph = SqliteGraph::open(&path).expect("reopen");
        let node = graph
            .get_node_by_name(NodeType::Script, "add")
            .expect("lookup")
            .expect("present");
        assert_eq!(node.id, id);
        assert_eq!(node.property_str("description"), Some("adds"));
        assert!(graph.get_node_by_name(NodeType::Env, "add").expect("lookup").is_none());
    }

    #[test]
    fn test_unique_names() {
        let graph = SqliteGraph::open_in_memory().expect("open");
        graph.create_node(NodeType::Env, "api", props("")).expect("create");
        let err = graph.create_node(NodeType::Env, "api", props("")).unwrap_err();
        assert!(matches!(err, Error::AlreadyExists { .. }));
        graph.create_node(NodeType::Knowledge, "faq", props("")).expect("k1");
        graph.create_node(NodeType::Knowledge, "faq", props("")).expect("k2");
        assert_eq!(graph.list_nodes(Some(NodeType::Knowledge)).expect("list").len(), 2);
        assert_eq!(graph.list_nodes(None).expect("list").len(), 3);
    }

    #[test]
    fn test_edges_traversal_and_cycles() {
        let graph = SqliteGraph::open_in_memory().expect("open");
        let skill = graph.create_node(NodeType::Skill, "skill", props("")).expect("skill");
        let script = graph.create_node(NodeType::Script, "script", props("")).expect("script");
        let env_b = graph.create_node(NodeType::Env, "b", props("")).expect("b");
        let env_a = graph.create_node(NodeType::Env, "a", props("")).expect("a");

        graph.create_edge(EdgeType::Contains, &skill.id, &script.id, props("")).expect("e");
        graph.create_edge(EdgeType::Contains, &script.id, &env_b.id, props("")).expect("e");
        graph.create_edge(EdgeType::Contains, &script.id, &env_a.id, props("")).expect("e");
        graph.create_edge(EdgeType::RelateTo, &env_a.id, &skill.id, props("")).expect("e");

        let names: Vec<String> = graph
            .get_connected_nodes(&script.id, Some(EdgeType::Contains), Direction::Outgoing)
            .expect("out")
            .into_iter()
            .map(|n| n.name)
            .collect();
        assert_eq!(names, vec!["b", "a"]);

        let both = graph
            .get_connected_nodes(&script.id, None, Direction::Both)
            .expect("both");
        assert_eq!(both.len(), 3);
        assert_eq!(both[0].id, skill.id);

        let err = graph
            .create_edge(EdgeType::Contains, &env_a.id, &skill.id, props(""))
            .unwrap_err();
        assert!(matches!(err, Error::CircularDependency { .. }));

        let missing = graph
            .create_edge(EdgeType::Contains, &skill.id, "no-such-id", props(""))
            .unwrap_err();
        assert!(matches!(missing, Error::NotFound { .. }));
    }

    #[test]
    fn test_delete_cascades_edges() {
        let graph = SqliteGraph::open_in_memory().expect("open");
        let script = graph.create_node(NodeType::Script, "s", props("")).expect("s");
        let env = graph.create_node(NodeType::Env, "e", props("")).expect("e");
        graph.create_edge(EdgeType::Contains, &script.id, &env.id, props("")).expect("edge");

        assert!(graph.delete_node(&env.id).expect("delete"));
        assert!(graph
            .get_connected_nodes(&script.id, None, Direction::Outgoing)
            .expect("out")
            .is_empty());
        assert!(!graph.delete_node(&env.id).expect("delete again"));
        assert!(matches!(graph.get_node(&env.id), Err(Error::NotFound { .. })));
    }

    #[test]
    fn test_update_and_delete_edge() {
        let graph = SqliteGraph::open_in_memory().expect("open");
        let a = graph.create_node(NodeType::Skill, "a", props("old")).expect("a");
        let b = graph.create_node(NodeType::Skill, "b", props("")).expect("b");

        let mut patch = Properties::new();
        patch.insert("description".into(), json!("new"));
        patch.insert("tags".into(), json!(["x"]));
        let updated = graph.update_node(&a.id, patch).expect("update");
        assert_eq!(updated.property_str("description"), Some("new"));
        let reloaded = graph.get_node(&a.id).expect("get");
        assert_eq!(reloaded.properties.get("tags"), Some(&json!(["x"])));

        graph.create_edge(EdgeType::RelateTo, &a.id, &b.id, props("")).expect("edge");
        assert!(graph.delete_edge(EdgeType::RelateTo, &a.id, &b.id).expect("delete"));
        assert!(!graph.delete_edge(EdgeType::RelateTo, &a.id, &b.id).expect("again"));
    }
}
