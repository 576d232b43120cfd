//! Environment variable keys.
//!
//! Every key uses the `SKILLGRAPH_` prefix; aliases cover the names the Python tooling
//! around the graph already exports.

/// Configuration file location
pub const SKILLGRAPH_CONFIG: &str = "SKILLGRAPH_CONFIG";
pub const CONFIG_ALIASES: &[&str] = &["MCP_KG_SKILLS_CONFIG"];

/// Graph store
pub mod store {
    pub const SKILLGRAPH_DB_PATH: &str = "SKILLGRAPH_DB_PATH";
    pub const DB_PATH_ALIASES: &[&str] = &["SQLITE_DB_PATH"];

    pub const SKILLGRAPH_STORE: &str = "SKILLGRAPH_STORE";
}

/// Composite program execution
pub mod execution {
    pub const SKILLGRAPH_CACHE_DIR: &str = "SKILLGRAPH_CACHE_DIR";
    pub const SKILLGRAPH_ENV_DIR: &str = "SKILLGRAPH_ENV_DIR";
    pub const SKILLGRAPH_DEFAULT_TIMEOUT: &str = "SKILLGRAPH_DEFAULT_TIMEOUT";
    pub const SKILLGRAPH_MAX_TIMEOUT: &str = "SKILLGRAPH_MAX_TIMEOUT";

    /// Runner command line, whitespace separated (e.g. `uv run`).
    pub const SKILLGRAPH_RUNNER: &str = "SKILLGRAPH_RUNNER";
    pub const SKILLGRAPH_RUNTIME_VERSION: &str = "SKILLGRAPH_RUNTIME_VERSION";
}

/// Secret classification
pub mod security {
    /// Comma separated list of patterns; replaces the defaults entirely.
    pub const SKILLGRAPH_SECRET_PATTERNS: &str = "SKILLGRAPH_SECRET_PATTERNS";
}

/// Observability and logging
pub mod observability {
    pub const SKILLGRAPH_QUIET: &str = "SKILLGRAPH_QUIET";

    pub const SKILLGRAPH_LOG_LEVEL: &str = "SKILLGRAPH_LOG_LEVEL";
    pub const LOG_LEVEL_ALIASES: &[&str] = &["LOG_LEVEL"];

    pub const SKILLGRAPH_LOG_JSON: &str = "SKILLGRAPH_LOG_JSON";

    pub const SKILLGRAPH_AUDIT_LOG: &str = "SKILLGRAPH_AUDIT_LOG";
}
