//! Unified configuration layer.
//!
//! All environment reads go through this module; other code works with the typed structs.
//!
//! - `loader`: env_or, env_optional, env_bool and `${VAR}` substitution
//! - `schema`: AppConfig and its sections
//! - `env_keys`: key constants and aliases

pub mod env_keys;
pub mod loader;
pub mod schema;

pub use loader::{env_bool, env_optional, env_or, load_dotenv, substitute_env_vars};
pub use schema::{
    data_root, AppConfig, ExecutionConfig, ObservabilityConfig, SecurityConfig, StoreBackend,
    StoreConfig, DEFAULT_RUNNER, DEFAULT_RUNTIME_VERSION, DEFAULT_SECRET_PATTERNS,
    DEFAULT_TIMEOUT_SECS, MAX_TIMEOUT_SECS,
};
