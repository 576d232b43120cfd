//! Collects the environment bundles a request needs and merges their variables.
//!
//! Order: bundles linked from the imported scripts (CONTAINS edges, scripts in request
//! order), then bundles named directly in the request. Bundles are deduplicated by id;
//! when two bundles set the same variable the later one wins.

use std::collections::{BTreeMap, HashSet};

use skillgraph_core::graph::{Direction, EdgeType, EnvironmentBundle, GraphStore, NodeType, ScriptArtifact};
use skillgraph_core::{Error, Result};

use super::env_file::BundleStore;

/// Merged variables plus the values that must be redacted from output.
#[derive(Debug, Default)]
pub struct ResolvedEnvironment {
    pub variables: BTreeMap<String, String>,
    /// Only for redaction. Never returned to callers.
    pub secret_values: Vec<String>,
    /// Names of the bundles that were merged, in merge order.
    pub bundles: Vec<String>,
}

pub struct EnvironmentResolver<'a> {
    graph: &'a dyn GraphStore,
    store: &'a dyn BundleStore,
}

impl<'a> EnvironmentResolver<'a> {
    pub fn new(graph: &'a dyn GraphStore, store: &'a dyn BundleStore) -> Self {
        Self { graph, store }
    }

    pub fn resolve(&self, scripts: &[ScriptArtifact], direct: &[String]) -> Result<ResolvedEnvironment> {
        let mut ordered: Vec<EnvironmentBundle> = Vec::new();

        for script in scripts {
            let linked = self
                .graph
                .get_connected_nodes(&script.id, Some(EdgeType::Contains), Direction::Outgoing)?;
            ordered.extend(linked.iter().filter_map(EnvironmentBundle::from_node));
        }

        for name in direct {
            let node = self
                .graph
                .get_node_by_name(NodeType::Env, name)?
                .ok_or_else(|| Error::not_found(NodeType::Env.as_str(), name.as_str()))?;
            let bundle = EnvironmentBundle::from_node(&node).ok_or_else(|| {
                Error::Validation(format!("ENV node '{}' has no variables", name))
            })?;
            ordered.push(bundle);
        }

        let mut seen = HashSet::new();
        ordered.retain(|b| seen.insert(b.id.clone()));

        let mut resolved = ResolvedEnvironment::default();
        for bundle in &ordered {
            if !self.store.exists(&bundle.id) {
                tracing::warn!(bundle = %bundle.name, "env file missing, bundle contributes nothing");
                continue;
            }
            let values = self.store.read_all(&bundle.id)?;
            for key in &bundle.secret_keys {
                if let Some(value) = values.get(key) {
                    resolved.secret_values.push(value.clone());
                }
            }
            for (key, value) in values {
                if resolved.variables.insert(key.clone(), value).is_some() {
                    tracing::debug!(bundle = %bundle.name, key = %key, "variable overridden by later bundle");
                }
            }
            resolved.bundles.push(bundle.name.clone());
        }

        tracing::debug!(
            bundles = resolved.bundles.len(),
            variables = resolved.variables.len(),
            secrets = resolved.secret_values.len(),
            "resolved environment"
        );
        Ok(resolved)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::env::EnvFileStore;
    use skillgraph_core::graph::{MemoryGraph, Node, Properties};

    struct Fixture {
        _dir: tempfile::TempDir,
        graph: MemoryGraph,
        files: EnvFileStore,
    }

    impl Fixture {
        fn new() -> Self {
            let dir = tempfile::tempdir().expect("tempdir");
            let files = EnvFileStore::new(dir.path());
            Self {
                _dir: dir,
                graph: MemoryGraph::new(),
                files,
            }
        }

        fn script(&self, name: &str) -> ScriptArtifact {
            let node = self
                .graph
                .create_node(NodeType::Script, name, ScriptArtifact::properties("", "", "pass"))
                .expect("script");
            ScriptArtifact::from_node(&node).expect("artifact")
        }

        fn bundle(&self, name: &str, all: &[(&str, &str)], secret_keys: &[&str]) -> Node {
            let values: BTreeMap<String, String> =
                all.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
            let public = values
                .iter()
                .filter(|(k, _)| !secret_keys.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect();
            let secrets: Vec<String> = secret_keys.iter().map(|s| s.to_string()).collect();
            let node = self
                .graph
                .create_node(NodeType::Env, name, EnvironmentBundle::properties("", &public, &secrets))
                .expect("bundle");
            self.files.write(&node.id, &values).expect("env file");
            node
        }

        fn link(&self, from: &str, to: &str) {
            self.graph
                .create_edge(EdgeType::Contains, from, to, Properties::new())
                .expect("edge");
        }

        fn resolver(&self) -> EnvironmentResolver<'_> {
            EnvironmentResolver::new(&self.graph, &self.files)
        }
    }

    #[test]
    fn test_script_linked_then_direct_last_write_wins() {
        let fx = Fixture::new();
        let script = fx.script("greet");
        let linked = fx.bundle("linked", &[("MODE", "linked"), ("SECRET_KEY", "s1")], &["SECRET_KEY"]);
        let direct = fx.bundle("direct", &[("MODE", "direct"), ("PORT", "1")], &[]);
        fx.link(&script.id, &linked.id);

        let env = fx
            .resolver()
            .resolve(&[script], &["direct".to_string()])
            .expect("resolve");
        assert_eq!(env.variables.get("MODE").map(String::as_str), Some("direct"));
        assert_eq!(env.variables.get("SECRET_KEY").map(String::as_str), Some("s1"));
        assert_eq!(env.secret_values, vec!["s1".to_string()]);
        assert_eq!(env.bundles, vec!["linked", "direct"]);
    }

    #[test]
    fn test_bundles_deduplicated_by_identity() {
        let fx = Fixture::new();
        let a = fx.script("a");
        let b = fx.script("b");
        let shared = fx.bundle("shared", &[("TOKEN", "t")], &["TOKEN"]);
        fx.link(&a.id, &shared.id);
        fx.link(&b.id, &shared.id);

        let env = fx
            .resolver()
            .resolve(&[a, b], &["shared".to_string()])
            .expect("resolve");
        assert_eq!(env.bundles, vec!["shared"]);
        assert_eq!(env.secret_values, vec!["t".to_string()]);
    }

    #[test]
    fn test_missing_direct_bundle_is_not_found() {
        let fx = Fixture::new();
        let err = fx
            .resolver()
            .resolve(&[], &["nope".to_string()])
            .unwrap_err();
        match err {
            Error::NotFound { name, .. } => assert_eq!(name, "nope"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_bundle_nodes_and_missing_files_are_skipped() {
        let fx = Fixture::new();
        let script = fx.script("s");
        let knowledge = fx
            .graph
            .create_node(NodeType::Knowledge, "notes", Properties::new())
            .expect("knowledge");
        fx.link(&script.id, &knowledge.id);
        let orphan = fx.bundle("orphan", &[("A", "1")], &[]);
        fx.files.delete(&orphan.id).expect("delete file");
        fx.link(&script.id, &orphan.id);

        let env = fx.resolver().resolve(&[script], &[]).expect("resolve");
        assert!(env.variables.is_empty());
        assert!(env.bundles.is_empty());
    }

    #[test]
    fn test_secret_names_absent_from_file_are_ignored() {
        let fx = Fixture::new();
        fx.bundle("partial", &[("PORT", "1")], &["API_KEY"]);
        let env = fx
            .resolver()
            .resolve(&[], &["partial".to_string()])
            .expect("resolve");
        assert!(env.secret_values.is_empty());
        assert_eq!(env.variables.len(), 1);
    }
}
