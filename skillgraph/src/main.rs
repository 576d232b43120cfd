mod cli;
mod commands;
mod context;

use anyhow::Result;
use clap::Parser;

use cli::{Cli, Commands, EnvCommand, MetadataCommand, ScriptCommand};
use context::AppContext;
use skillgraph_core::config::{load_dotenv, ObservabilityConfig};
use skillgraph_core::observability;

fn main() -> Result<()> {
    load_dotenv();
    observability::init_tracing(ObservabilityConfig::from_env());
    let cli = Cli::parse();

    // Metadata commands work on local files only.
    if let Commands::Metadata(cmd) = &cli.command {
        return match cmd {
            MetadataCommand::Show { file } => commands::metadata::cmd_show(file),
            MetadataCommand::Set {
                file,
                deps,
                requires_python,
            } => commands::metadata::cmd_set(file, deps, requires_python.as_deref()),
        };
    }

    let ctx = AppContext::load(cli.config.as_deref(), cli.memory)?;

    match cli.command {
        Commands::Exec {
            code,
            imports,
            envs,
            timeout,
        } => commands::exec::cmd_exec(&ctx, code, imports, envs, timeout)?,
        Commands::Script(cmd) => match cmd {
            ScriptCommand::Add {
                name,
                description,
                signature,
                file,
            } => commands::script::cmd_add(&ctx, &name, &description, &signature, &file)?,
            ScriptCommand::Show { name } => commands::script::cmd_show(&ctx, &name)?,
            ScriptCommand::List => commands::script::cmd_list(&ctx)?,
        },
        Commands::Env(cmd) => match cmd {
            EnvCommand::Create {
                name,
                description,
                vars,
            } => commands::env::cmd_create(&ctx, &name, &description, &vars)?,
            EnvCommand::Show { name } => commands::env::cmd_show(&ctx, &name)?,
            EnvCommand::Keys { name } => commands::env::cmd_keys(&ctx, &name)?,
            EnvCommand::Update {
                name,
                description,
                vars,
            } => commands::env::cmd_update(&ctx, &name, description.as_deref(), &vars)?,
            EnvCommand::Delete { name } => commands::env::cmd_delete(&ctx, &name)?,
            EnvCommand::List => commands::env::cmd_list(&ctx)?,
        },
        Commands::Link(args) => commands::link::cmd_link(&ctx, &args)?,
        Commands::Metadata(_) => {}
    }

    Ok(())
}
