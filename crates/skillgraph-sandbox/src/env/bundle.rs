//! Environment-bundle management: the graph record keeps public values and secret names,
//! the at-rest file keeps every value.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Serialize;

use skillgraph_core::graph::{EnvironmentBundle, GraphStore, Node, NodeType};
use skillgraph_core::observability::{audit_bundle_created, audit_bundle_deleted};
use skillgraph_core::{Error, Result};

use super::env_file::EnvFileStore;
use crate::security::{mask_for_display, SecretClassifier, MASK_PLACEHOLDER};

/// What callers see: public values plus secret names under the mask placeholder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BundleView {
    pub id: String,
    pub name: String,
    pub description: String,
    pub variables: BTreeMap<String, String>,
    pub secret_keys: Vec<String>,
}

impl BundleView {
    fn from_bundle(bundle: EnvironmentBundle) -> Self {
        let mut variables = bundle.variables;
        for key in &bundle.secret_keys {
            variables.insert(key.clone(), MASK_PLACEHOLDER.to_string());
        }
        Self {
            id: bundle.id,
            name: bundle.name,
            description: bundle.description,
            variables,
            secret_keys: bundle.secret_keys,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KeyInfo {
    pub key: String,
    pub is_secret: bool,
}

pub struct BundleService {
    graph: Arc<dyn GraphStore>,
    files: Arc<EnvFileStore>,
    classifier: Arc<SecretClassifier>,
}

impl BundleService {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        files: Arc<EnvFileStore>,
        classifier: Arc<SecretClassifier>,
    ) -> Self {
        Self {
            graph,
            files,
            classifier,
        }
    }

    fn find(&self, name: &str) -> Result<(Node, EnvironmentBundle)> {
        let node = self
            .graph
            .get_node_by_name(NodeType::Env, name)?
            .ok_or_else(|| Error::not_found(NodeType::Env.as_str(), name))?;
        let bundle = EnvironmentBundle::from_node(&node)
            .ok_or_else(|| Error::Validation(format!("ENV node '{}' has no variables", name)))?;
        Ok((node, bundle))
    }

    pub fn create(
        &self,
        name: &str,
        description: &str,
        variables: &BTreeMap<String, String>,
    ) -> Result<BundleView> {
        validate_names(variables)?;
        let classified = self.classifier.classify(variables);
        let node = self.graph.create_node(
            NodeType::Env,
            name,
            EnvironmentBundle::properties(description, &classified.public, &classified.secret_names),
        )?;

        if let Err(e) = self.files.write(&node.id, variables) {
            if let Err(rollback) = self.graph.delete_node(&node.id) {
                tracing::warn!(bundle = name, error = %rollback, "failed to roll back bundle record");
            }
            return Err(e);
        }

        audit_bundle_created(name, classified.public.len(), &classified.secret_names);
        tracing::info!(
            bundle = name,
            public = classified.public.len(),
            secret = classified.secret_names.len(),
            "created environment bundle"
        );
        let bundle = EnvironmentBundle::from_node(&node)
            .ok_or_else(|| Error::Validation(format!("ENV node '{}' has no variables", name)))?;
        Ok(BundleView::from_bundle(bundle))
    }

    pub fn read(&self, name: &str) -> Result<BundleView> {
        let (_, bundle) = self.find(name)?;
        Ok(BundleView::from_bundle(bundle))
    }

    /// Replace the description and/or the full variable set.
    pub fn update(
        &self,
        name: &str,
        description: Option<&str>,
        variables: Option<&BTreeMap<String, String>>,
    ) -> Result<BundleView> {
        let (node, bundle) = self.find(name)?;
        let description = description.unwrap_or(&bundle.description);

        let props = match variables {
            Some(vars) => {
                validate_names(vars)?;
                let classified = self.classifier.classify(vars);
                self.files.write(&node.id, vars)?;
                EnvironmentBundle::properties(description, &classified.public, &classified.secret_names)
            }
            None => EnvironmentBundle::properties(description, &bundle.variables, &bundle.secret_keys),
        };
        let updated = self.graph.update_node(&node.id, props)?;
        let bundle = EnvironmentBundle::from_node(&updated)
            .ok_or_else(|| Error::Validation(format!("ENV node '{}' has no variables", name)))?;
        Ok(BundleView::from_bundle(bundle))
    }

    pub fn delete(&self, name: &str) -> Result<()> {
        let (node, _) = self.find(name)?;
        if !self.files.delete(&node.id)? {
            tracing::debug!(bundle = name, "no env file to remove");
        }
        self.graph.delete_node(&node.id)?;
        audit_bundle_deleted(name);
        tracing::info!(bundle = name, "deleted environment bundle");
        Ok(())
    }

    /// Variable names with their classification. Values are never included.
    pub fn list_keys(&self, name: &str) -> Result<Vec<KeyInfo>> {
        let (_, bundle) = self.find(name)?;
        let mut keys: Vec<KeyInfo> = bundle
            .variables
            .keys()
            .map(|k| KeyInfo {
                key: k.clone(),
                is_secret: false,
            })
            .chain(bundle.secret_keys.iter().map(|k| KeyInfo {
                key: k.clone(),
                is_secret: true,
            }))
            .collect();
        keys.sort_by(|a, b| a.key.cmp(&b.key));
        keys.dedup_by(|a, b| a.key == b.key);
        Ok(keys)
    }

    pub fn list(&self) -> Result<Vec<BundleView>> {
        Ok(self
            .graph
            .list_nodes(Some(NodeType::Env))?
            .iter()
            .filter_map(EnvironmentBundle::from_node)
            .map(BundleView::from_bundle)
            .collect())
    }

    /// The record with secret values shown masked, for display next to the real public values.
    pub fn masked_variables(&self, name: &str) -> Result<BTreeMap<String, String>> {
        let (node, bundle) = self.find(name)?;
        let path = self.files.path_for(&node.id)?;
        let all = if path.is_file() {
            EnvFileStore::load_file(&path)?
        } else {
            bundle.variables.clone()
        };
        Ok(mask_for_display(&all, &bundle.secret_keys))
    }
}

fn validate_names(variables: &BTreeMap<String, String>) -> Result<()> {
    for key in variables.keys() {
        let valid = !key.is_empty()
            && !key.starts_with(|c: char| c.is_ascii_digit())
            && key.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
        if !valid {
            return Err(Error::Validation(format!(
                "invalid environment variable name '{}'",
                key
            )));
        }
    }
    Ok(())
}
