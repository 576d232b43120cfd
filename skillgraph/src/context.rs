//! Everything a command needs, built once at startup and passed by reference.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use skillgraph_core::config::{AppConfig, StoreBackend};
use skillgraph_core::graph::GraphStore;
use skillgraph_core::observability;
use skillgraph_sandbox::{BundleService, EnvFileStore, RunnerSettings, ScriptRunner, SecretClassifier};

pub struct AppContext {
    pub config: AppConfig,
    pub graph: Arc<dyn GraphStore>,
    pub files: Arc<EnvFileStore>,
    pub classifier: Arc<SecretClassifier>,
}

impl AppContext {
    pub fn load(config_path: Option<&Path>, memory: bool) -> Result<Self> {
        let mut config = AppConfig::load(config_path).context("Failed to load configuration")?;
        if memory {
            config.store.backend = StoreBackend::Memory;
        }
        Self::from_config(config)
    }

    pub fn from_config(config: AppConfig) -> Result<Self> {
        if let Some(path) = &config.logging.audit_log {
            observability::set_audit_path(path);
        }
        let graph = skillgraph_store::open_graph_store(&config.store)
            .with_context(|| format!("Failed to open graph store at {}", config.store.db_path.display()))?;
        let classifier = SecretClassifier::from_config(&config.security)
            .context("Invalid security.secret_patterns")?;
        Ok(Self {
            files: Arc::new(EnvFileStore::new(&config.execution.env_dir)),
            classifier: Arc::new(classifier),
            graph,
            config,
        })
    }

    pub fn bundles(&self) -> BundleService {
        BundleService::new(self.graph.clone(), self.files.clone(), self.classifier.clone())
    }

    pub fn runner(&self) -> Result<ScriptRunner> {
        let settings = RunnerSettings::from_config(&self.config.execution)
            .context("Invalid execution.runner")?;
        Ok(ScriptRunner::new(
            self.graph.clone(),
            self.files.clone(),
            self.classifier.clone(),
            settings,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_memory_context_wires_bundles_and_runner() {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = AppConfig::default();
        config.store.backend = StoreBackend::Memory;
        config.execution.env_dir = dir.path().join("envs");
        config.execution.cache_dir = dir.path().join("cache");

        let ctx = AppContext::from_config(config).expect("context");
        let mut vars = BTreeMap::new();
        vars.insert("API_KEY".to_string(), "sk-1".to_string());
        let view = ctx.bundles().create("api", "", &vars).expect("create");
        assert_eq!(view.secret_keys, vec!["API_KEY"]);

        let runner = ctx.runner().expect("runner");
        assert_eq!(runner.settings().program, "uv");
        assert_eq!(runner.settings().cache_dir, dir.path().join("cache"));
    }
}
