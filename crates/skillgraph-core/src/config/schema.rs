//! Configuration structs grouped by concern.
//!
//! Values come from defaults, then an optional YAML file, then `SKILLGRAPH_*` variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use super::env_keys::{execution as exec_keys, observability as obv_keys, security as sec_keys, store as store_keys};
use super::loader::{env_bool, env_list, env_optional, env_or, env_u64, load_dotenv, substitute_env_vars};
use crate::error::{Error, Result};

pub const DEFAULT_TIMEOUT_SECS: u64 = 300;
pub const MAX_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_RUNNER: &str = "uv run";
pub const DEFAULT_RUNTIME_VERSION: &str = ">=3.12";

/// Case-insensitive patterns searched anywhere in a variable name.
pub const DEFAULT_SECRET_PATTERNS: &[&str] = &[
    "^SECRET_",
    "_SECRET$",
    "^.*_KEY$",
    "^.*_PASSWORD$",
    "^.*_TOKEN$",
    "^.*_API_KEY$",
    "^.*_PRIVATE_KEY$",
    "^API_KEY",
    "^PRIVATE_KEY",
    "^PASSWORD",
    "^TOKEN",
];

/// `~/.skillgraph`, or `./.skillgraph` when no home directory is known.
pub fn data_root() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skillgraph")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: StoreBackend,
    pub db_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Sqlite,
            db_path: data_root().join("graph.db"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutionConfig {
    /// Scratch programs are written here.
    pub cache_dir: PathBuf,
    /// Bundle files and scratch variable files live here.
    pub env_dir: PathBuf,
    pub default_timeout: u64,
    pub max_timeout: u64,
    /// Runner command line; the scratch program path is appended as the last argument.
    pub runner: String,
    pub runtime_version: Option<String>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        let root = data_root();
        Self {
            cache_dir: root.join("cache"),
            env_dir: root.join("envs"),
            default_timeout: DEFAULT_TIMEOUT_SECS,
            max_timeout: MAX_TIMEOUT_SECS,
            runner: DEFAULT_RUNNER.to_string(),
            runtime_version: Some(DEFAULT_RUNTIME_VERSION.to_string()),
        }
    }
}

impl ExecutionConfig {
    /// Split the runner command line into program and leading arguments.
    pub fn runner_command(&self) -> Result<(String, Vec<String>)> {
        let mut parts = self.runner.split_whitespace().map(String::from);
        let program = parts
            .next()
            .ok_or_else(|| Error::Config("execution.runner is empty".to_string()))?;
        Ok((program, parts.collect()))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SecurityConfig {
    pub secret_patterns: Vec<String>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            secret_patterns: DEFAULT_SECRET_PATTERNS.iter().map(|p| p.to_string()).collect(),
        }
    }
}

/// Observability: quiet, level, json output, audit log path.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    pub quiet: bool,
    pub level: String,
    pub json: bool,
    pub audit_log: Option<PathBuf>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            quiet: false,
            level: "info".to_string(),
            json: false,
            audit_log: None,
        }
    }
}

impl ObservabilityConfig {
    /// Defaults plus environment overrides, read once per process.
    pub fn from_env() -> &'static Self {
        use std::sync::OnceLock;
        static CACHE: OnceLock<ObservabilityConfig> = OnceLock::new();
        CACHE.get_or_init(|| {
            load_dotenv();
            let mut cfg = Self::default();
            cfg.apply_env_overrides();
            cfg
        })
    }

    fn apply_env_overrides(&mut self) {
        self.quiet = env_bool(obv_keys::SKILLGRAPH_QUIET, &[], self.quiet);
        let level = std::mem::take(&mut self.level);
        self.level = env_or(obv_keys::SKILLGRAPH_LOG_LEVEL, obv_keys::LOG_LEVEL_ALIASES, || level);
        self.json = env_bool(obv_keys::SKILLGRAPH_LOG_JSON, &[], self.json);
        if let Some(path) = env_optional(obv_keys::SKILLGRAPH_AUDIT_LOG, &[]) {
            self.audit_log = Some(PathBuf::from(path));
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub store: StoreConfig,
    pub execution: ExecutionConfig,
    pub security: SecurityConfig,
    pub logging: ObservabilityConfig,
}

impl AppConfig {
    /// Load `path` (or `SKILLGRAPH_CONFIG`), apply environment overrides and validate.
    ///
    /// A missing file is not an error: defaults are used.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        load_dotenv();
        let path = path.map(Path::to_path_buf).or_else(|| {
            env_optional(super::env_keys::SKILLGRAPH_CONFIG, super::env_keys::CONFIG_ALIASES)
                .map(PathBuf::from)
        });

        let mut cfg = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(&p)
                    .map_err(|e| Error::Config(format!("cannot read {}: {}", p.display(), e)))?;
                tracing::info!(path = %p.display(), "loading configuration file");
                Self::from_yaml_str(&raw)?
            }
            Some(p) => {
                tracing::warn!(path = %p.display(), "configuration file not found, using defaults");
                Self::default()
            }
            None => Self::default(),
        };
        cfg.apply_env_overrides();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Parse YAML after `${VAR}` substitution. Absent sections keep their defaults.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let content = substitute_env_vars(raw);
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content).map_err(|e| Error::Config(format!("invalid YAML: {}", e)))
    }

    pub fn apply_env_overrides(&mut self) {
        if let Some(p) = env_optional(store_keys::SKILLGRAPH_DB_PATH, store_keys::DB_PATH_ALIASES) {
            self.store.db_path = PathBuf::from(p);
        }
        match env_optional(store_keys::SKILLGRAPH_STORE, &[]).as_deref() {
            Some("memory") => self.store.backend = StoreBackend::Memory,
            Some("sqlite") => self.store.backend = StoreBackend::Sqlite,
            Some(other) => tracing::warn!(value = other, "unknown store backend, keeping configured one"),
            None => {}
        }

        let exec = &mut self.execution;
        if let Some(p) = env_optional(exec_keys::SKILLGRAPH_CACHE_DIR, &[]) {
            exec.cache_dir = PathBuf::from(p);
        }
        if let Some(p) = env_optional(exec_keys::SKILLGRAPH_ENV_DIR, &[]) {
            exec.env_dir = PathBuf::from(p);
        }
        exec.default_timeout = env_u64(exec_keys::SKILLGRAPH_DEFAULT_TIMEOUT, &[], exec.default_timeout);
        exec.max_timeout = env_u64(exec_keys::SKILLGRAPH_MAX_TIMEOUT, &[], exec.max_timeout);
        if let Some(runner) = env_optional(exec_keys::SKILLGRAPH_RUNNER, &[]) {
            exec.runner = runner;
        }
        if let Some(version) = env_optional(exec_keys::SKILLGRAPH_RUNTIME_VERSION, &[]) {
            exec.runtime_version = Some(version);
        }

        if let Some(patterns) = env_list(sec_keys::SKILLGRAPH_SECRET_PATTERNS, &[]) {
            self.security.secret_patterns = patterns;
        }

        self.logging.apply_env_overrides();
    }

    pub fn validate(&self) -> Result<()> {
        let exec = &self.execution;
        if exec.max_timeout == 0 {
            return Err(Error::Config("execution.max_timeout must be positive".to_string()));
        }
        if exec.default_timeout == 0 || exec.default_timeout > exec.max_timeout {
            return Err(Error::Config(format!(
                "execution.default_timeout must be between 1 and {}",
                exec.max_timeout
            )));
        }
        exec.runner_command()?;
        if self.security.secret_patterns.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::Config("security.secret_patterns contains an empty pattern".to_string()));
        }
        Ok(())
    }
}
