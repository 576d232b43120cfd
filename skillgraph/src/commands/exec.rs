//! `skillgraph exec`

use std::io::Read;

use anyhow::{Context, Result};

use skillgraph_sandbox::ExecutionRequest;

use crate::context::AppContext;

/// Run the request and print the `ExecutionResult` JSON.
///
/// A composed program that fails still prints a result (`success: false`); only
/// infrastructure failures become errors.
pub fn cmd_exec(
    ctx: &AppContext,
    code: String,
    imports: Vec<String>,
    envs: Vec<String>,
    timeout: Option<u64>,
) -> Result<()> {
    let code = if code == "-" {
        let mut s = String::new();
        std::io::stdin()
            .read_to_string(&mut s)
            .context("Failed to read code from stdin")?;
        s
    } else {
        code
    };

    let request = ExecutionRequest {
        code,
        imports,
        envs,
        timeout_seconds: timeout,
    };
    let runner = ctx.runner()?;
    let rt = tokio::runtime::Runtime::new().context("Failed to create tokio runtime")?;
    let result = rt.block_on(runner.execute(&request))?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
