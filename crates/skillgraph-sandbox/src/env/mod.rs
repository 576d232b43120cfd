//! Environment bundles: at-rest files, resolution for execution, and management.

mod bundle;
mod env_file;
mod resolver;

pub use bundle::{BundleService, BundleView, KeyInfo};
pub use env_file::{format_env, parse_env, BundleStore, EnvFileStore};
pub use resolver::{EnvironmentResolver, ResolvedEnvironment};
