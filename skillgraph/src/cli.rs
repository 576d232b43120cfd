use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// SkillGraph - compose stored scripts and environment bundles with your code, then run it
#[derive(Parser, Debug)]
#[command(name = "skillgraph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// YAML configuration file (default: $SKILLGRAPH_CONFIG)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Use an in-memory graph store for this invocation
    #[arg(long, global = true, default_value = "false")]
    pub memory: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Compose imported scripts and bundles with CODE and run it through the runner
    Exec {
        /// Code to run. Use "-" to read from stdin
        #[arg(long, value_name = "CODE")]
        code: String,

        /// Script to import (repeatable, order is kept)
        #[arg(long = "import", value_name = "NAME")]
        imports: Vec<String>,

        /// Environment bundle to apply (repeatable)
        #[arg(long = "env", value_name = "NAME")]
        envs: Vec<String>,

        /// Timeout in seconds (default: execution.default_timeout)
        #[arg(long)]
        timeout: Option<u64>,
    },

    /// Manage stored scripts
    #[command(subcommand)]
    Script(ScriptCommand),

    /// Manage environment bundles
    #[command(subcommand)]
    Env(EnvCommand),

    /// Create an edge between two nodes
    Link(LinkArgs),

    /// Read or rewrite a script file's inline dependency block
    #[command(subcommand)]
    Metadata(MetadataCommand),
}

#[derive(Subcommand, Debug)]
pub enum ScriptCommand {
    /// Store a script body from a file
    Add {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// Function signature shown to callers, e.g. "add(a, b)"
        #[arg(long, default_value = "")]
        signature: String,

        /// File holding the script body
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Print a stored script as JSON
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List stored scripts
    List,
}

#[derive(Subcommand, Debug)]
pub enum EnvCommand {
    /// Create a bundle; secret-looking names are stored outside the graph
    Create {
        #[arg(long)]
        name: String,

        #[arg(long, default_value = "")]
        description: String,

        /// KEY=VALUE (repeatable)
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Print a bundle with secret values masked
    Show {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List a bundle's variable names and whether each is secret
    Keys {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// Replace a bundle's description and/or variables
    Update {
        #[arg(value_name = "NAME")]
        name: String,

        #[arg(long)]
        description: Option<String>,

        /// KEY=VALUE (repeatable). When given, replaces every variable
        #[arg(long = "var", value_name = "KEY=VALUE")]
        vars: Vec<String>,
    },

    /// Delete a bundle and its at-rest file
    Delete {
        #[arg(value_name = "NAME")]
        name: String,
    },

    /// List bundles
    List,
}

#[derive(Args, Debug)]
pub struct LinkArgs {
    /// Source node type (SKILL, KNOWLEDGE, SCRIPT, ENV)
    #[arg(long, value_name = "TYPE")]
    pub from_type: String,

    #[arg(long, value_name = "NAME")]
    pub from: String,

    /// Target node type (SKILL, KNOWLEDGE, SCRIPT, ENV)
    #[arg(long, value_name = "TYPE")]
    pub to_type: String,

    #[arg(long, value_name = "NAME")]
    pub to: String,

    /// CONTAINS or RELATE_TO
    #[arg(long, default_value = "CONTAINS")]
    pub edge: String,
}

#[derive(Subcommand, Debug)]
pub enum MetadataCommand {
    /// Print the declared dependencies and runtime version
    Show {
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
    },

    /// Replace the block with the given dependencies and runtime version
    Set {
        #[arg(long, value_name = "PATH")]
        file: PathBuf,

        /// Dependency spec (repeatable)
        #[arg(long = "dep", value_name = "SPEC")]
        deps: Vec<String>,

        #[arg(long, value_name = "VERSION")]
        requires_python: Option<String>,
    },
}
