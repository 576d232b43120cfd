//! CLI command handlers. Each takes the startup `AppContext` by reference and prints JSON
//! to stdout; status lines go to stderr.

pub mod env;
pub mod exec;
pub mod link;
pub mod metadata;
pub mod script;
