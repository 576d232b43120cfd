//! SkillGraph execution core.
//!
//! Turns "run this code with these imported scripts and these environment bundles" into one
//! composed program, runs it through the external runner under a deadline, and keeps secret
//! values out of everything returned to the caller.

pub mod common;
pub mod composer;
pub mod env;
pub mod runner;
pub mod security;

pub use env::{BundleService, BundleStore, EnvFileStore, EnvironmentResolver};
pub use runner::{ExecutionRequest, ExecutionResult, RunnerSettings, ScriptRunner};
pub use security::SecretClassifier;
