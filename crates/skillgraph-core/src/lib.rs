//! SkillGraph Core: configuration, errors, graph model and script text tooling.
//!
//! Shared by the store, sandbox and CLI crates.

pub mod config;
pub mod error;
pub mod graph;
pub mod observability;
pub mod script;

pub use error::{Error, Result};
