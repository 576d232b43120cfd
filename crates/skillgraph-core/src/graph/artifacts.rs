//! Typed read-only views over graph nodes.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{Node, NodeType, Properties};
use crate::error::{Error, Result};

/// A reusable script body plus the metadata agents see when browsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScriptArtifact {
    pub id: String,
    pub name: String,
    pub description: String,
    pub function_signature: String,
    pub body: String,
}

impl ScriptArtifact {
    pub fn from_node(node: &Node) -> Result<Self> {
        if node.node_type != NodeType::Script {
            return Err(Error::Validation(format!(
                "node '{}' is {}, not SCRIPT",
                node.name, node.node_type
            )));
        }
        let body = node
            .property_str("body")
            .ok_or_else(|| Error::Validation(format!("script '{}' has no body", node.name)))?;
        Ok(Self {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.property_str("description").unwrap_or_default().to_string(),
            function_signature: node
                .property_str("function_signature")
                .unwrap_or_default()
                .to_string(),
            body: body.to_string(),
        })
    }

    pub fn properties(description: &str, function_signature: &str, body: &str) -> Properties {
        let mut props = Properties::new();
        props.insert("description".into(), json!(description));
        props.insert("function_signature".into(), json!(function_signature));
        props.insert("body".into(), json!(body));
        props
    }
}

/// A named set of environment variables.
///
/// The graph record holds public values and secret *names* only; every value lives in the
/// bundle's at-rest file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnvironmentBundle {
    pub id: String,
    pub name: String,
    pub description: String,
    pub variables: BTreeMap<String, String>,
    pub secret_keys: Vec<String>,
}

impl EnvironmentBundle {
    /// `None` unless the node has a `variables` object; contained nodes of other kinds
    /// are skipped this way.
    pub fn from_node(node: &Node) -> Option<Self> {
        let variables = node.properties.get("variables")?.as_object()?;
        let variables = variables
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect();
        let secret_keys = node
            .properties
            .get("secret_keys")
            .and_then(Value::as_array)
            .map(|keys| {
                keys.iter()
                    .filter_map(|k| k.as_str().map(String::from))
                    .collect()
            })
            .unwrap_or_default();
        Some(Self {
            id: node.id.clone(),
            name: node.name.clone(),
            description: node.property_str("description").unwrap_or_default().to_string(),
            variables,
            secret_keys,
        })
    }

    pub fn properties(
        description: &str,
        public: &BTreeMap<String, String>,
        secret_keys: &[String],
    ) -> Properties {
        let mut props = Properties::new();
        props.insert("description".into(), json!(description));
        props.insert("variables".into(), json!(public));
        props.insert("secret_keys".into(), json!(secret_keys));
        props
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_from_node_requires_body() {
        let node = Node::new(NodeType::Script, "greet", Properties::new());
        assert!(ScriptArtifact::from_node(&node).is_err());

        let node = Node::new(
            NodeType::Script,
            "greet",
            ScriptArtifact::properties("Greets", "greet(name: str) -> str", "def greet(n): ..."),
        );
        let script = ScriptArtifact::from_node(&node).expect("script");
        assert_eq!(script.function_signature, "greet(name: str) -> str");
    }

    #[test]
    fn test_bundle_from_node_needs_variables_shape() {
        let knowledge = Node::new(NodeType::Knowledge, "notes", Properties::new());
        assert!(EnvironmentBundle::from_node(&knowledge).is_none());

        let public = BTreeMap::from([("PORT".to_string(), "8080".to_string())]);
        let node = Node::new(
            NodeType::Env,
            "api",
            EnvironmentBundle::properties("API creds", &public, &["API_KEY".to_string()]),
        );
        let bundle = EnvironmentBundle::from_node(&node).expect("bundle");
        assert_eq!(bundle.variables.get("PORT").map(String::as_str), Some("8080"));
        assert_eq!(bundle.secret_keys, vec!["API_KEY".to_string()]);
    }
}
