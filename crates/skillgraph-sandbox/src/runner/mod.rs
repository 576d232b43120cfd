//! Execution coordinator: resolve imports and environment, compose one program, run it
//! under a deadline through the external runner, and redact secrets from what comes back.
//!
//! Scratch files are `tempfile` handles owned by the pipeline, so every exit path
//! (success, error, timeout) removes them.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tempfile::TempPath;

use skillgraph_core::config::ExecutionConfig;
use skillgraph_core::graph::{GraphStore, NodeType, ScriptArtifact};
use skillgraph_core::observability::{
    audit_execution_completed, audit_execution_failed, audit_execution_started,
};
use skillgraph_core::{Error, Result};

use crate::common::{wait_with_timeout, WaitOutcome, PROGRAM_SUFFIX, SCRATCH_PREFIX};
use crate::composer::{build_program, merge_script_dependencies};
use crate::env::{BundleStore, EnvFileStore, EnvironmentResolver};
use crate::security::{redact_from_text, SecretClassifier};

#[cfg(test)]
mod tests;

/// One execution request.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionRequest {
    pub code: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub envs: Vec<String>,
    /// Falls back to the configured default when absent.
    #[serde(default)]
    pub timeout_seconds: Option<u64>,
}

impl ExecutionRequest {
    pub fn new(code: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            ..Default::default()
        }
    }

    pub fn validate(&self, max_timeout: u64) -> Result<()> {
        if self.code.trim().is_empty() {
            return Err(Error::Validation("code must not be empty".to_string()));
        }
        if let Some(secs) = self.timeout_seconds {
            if secs == 0 || secs > max_timeout {
                return Err(Error::Validation(format!(
                    "timeoutSeconds must be between 1 and {}, got {}",
                    max_timeout, secs
                )));
            }
        }
        if self.imports.iter().any(|n| n.trim().is_empty()) {
            return Err(Error::Validation("imports must not contain empty names".to_string()));
        }
        if self.envs.iter().any(|n| n.trim().is_empty()) {
            return Err(Error::Validation("envs must not contain empty names".to_string()));
        }
        Ok(())
    }
}

/// Outcome of a program that ran to completion. A non-zero exit is `success: false`, not an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutionResult {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
    pub execution_time_seconds: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionStage {
    Resolving,
    Building,
    Launching,
    Running,
    Sanitizing,
    Done,
}

impl ExecutionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resolving => "resolving",
            Self::Building => "building",
            Self::Launching => "launching",
            Self::Running => "running",
            Self::Sanitizing => "sanitizing",
            Self::Done => "done",
        }
    }
}

/// Runner settings derived from `ExecutionConfig`.
#[derive(Debug, Clone)]
pub struct RunnerSettings {
    pub cache_dir: PathBuf,
    /// Runner executable, looked up on PATH at launch.
    pub program: String,
    /// Arguments placed before the scratch program path.
    pub args: Vec<String>,
    pub default_timeout: u64,
    pub max_timeout: u64,
    pub runtime_version: Option<String>,
}

impl RunnerSettings {
    pub fn from_config(cfg: &ExecutionConfig) -> Result<Self> {
        let (program, args) = cfg.runner_command()?;
        Ok(Self {
            cache_dir: cfg.cache_dir.clone(),
            program,
            args,
            default_timeout: cfg.default_timeout,
            max_timeout: cfg.max_timeout,
            runtime_version: cfg.runtime_version.clone(),
        })
    }
}

pub struct ScriptRunner {
    graph: Arc<dyn GraphStore>,
    bundles: Arc<dyn BundleStore>,
    classifier: Arc<SecretClassifier>,
    settings: RunnerSettings,
}

impl ScriptRunner {
    pub fn new(
        graph: Arc<dyn GraphStore>,
        bundles: Arc<dyn BundleStore>,
        classifier: Arc<SecretClassifier>,
        settings: RunnerSettings,
    ) -> Self {
        Self {
            graph,
            bundles,
            classifier,
            settings,
        }
    }

    pub fn settings(&self) -> &RunnerSettings {
        &self.settings
    }

    /// Run `request` to completion.
    ///
    /// Errors are infrastructure failures: unknown script or bundle names, malformed
    /// metadata, launch/IO failures and timeouts. No step is retried.
    pub async fn execute(&self, request: &ExecutionRequest) -> Result<ExecutionResult> {
        let execution_id = uuid::Uuid::new_v4().to_string();
        let mut stage = ExecutionStage::Resolving;
        match self.run(&execution_id, request, &mut stage).await {
            Ok(result) => Ok(result),
            Err(e) => {
                tracing::warn!(
                    execution_id = %execution_id,
                    stage = stage.as_str(),
                    error = %e,
                    "execution failed"
                );
                audit_execution_failed(&execution_id, stage.as_str(), &e.to_string(), e.is_timeout());
                Err(e)
            }
        }
    }

    async fn run(
        &self,
        execution_id: &str,
        request: &ExecutionRequest,
        stage: &mut ExecutionStage,
    ) -> Result<ExecutionResult> {
        request.validate(self.settings.max_timeout)?;
        let timeout_secs = request.timeout_seconds.unwrap_or(self.settings.default_timeout);
        let started = Instant::now();

        let scripts = self.load_scripts(&request.imports)?;
        let env = EnvironmentResolver::new(self.graph.as_ref(), self.bundles.as_ref())
            .resolve(&scripts, &request.envs)?;
        let secret_values = self.redaction_values(&env.variables, env.secret_values);

        *stage = ExecutionStage::Building;
        let dependencies = merge_script_dependencies(&scripts)?;
        let program = build_program(
            &scripts,
            &request.code,
            &dependencies,
            self.settings.runtime_version.as_deref(),
        );

        *stage = ExecutionStage::Launching;
        let runner = self.locate_runner()?;
        let program_file = self.write_program(&program)?;
        let env_file = if env.variables.is_empty() {
            None
        } else {
            let scratch = self
                .bundles
                .write_scratch(&env.variables, SCRATCH_PREFIX)
                .map_err(|e| Error::ExecutionFailed(format!("cannot write scratch env file: {}", e)))?;
            Some(scratch)
        };
        let child_env = match &env_file {
            Some(path) => EnvFileStore::load_file(path)
                .map_err(|e| Error::ExecutionFailed(format!("cannot read scratch env file: {}", e)))?,
            None => BTreeMap::new(),
        };

        let program_path: &Path = &program_file;
        let mut args = self.settings.args.clone();
        args.push(program_path.display().to_string());

        let mut cmd = std::process::Command::new(&runner);
        cmd.args(&args)
            .envs(&child_env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        #[cfg(unix)]
        std::os::unix::process::CommandExt::process_group(&mut cmd, 0);

        audit_execution_started(
            execution_id,
            &runner.display().to_string(),
            &args,
            &request.imports,
            &request.envs,
        );
        tracing::info!(
            execution_id,
            imports = ?request.imports,
            envs = ?request.envs,
            dependencies = dependencies.len(),
            timeout_secs,
            "launching runner"
        );
        let mut child = tokio::process::Command::from(cmd)
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExecutionFailed(format!("failed to launch runner '{}': {}", self.settings.program, e)))?;

        *stage = ExecutionStage::Running;
        let output = match wait_with_timeout(&mut child, Duration::from_secs(timeout_secs)).await? {
            WaitOutcome::Exited(output) => output,
            WaitOutcome::TimedOut => return Err(Error::Timeout { secs: timeout_secs }),
        };

        *stage = ExecutionStage::Sanitizing;
        let result = ExecutionResult {
            success: output.exit_code == 0,
            stdout: redact_from_text(&output.stdout, &secret_values),
            stderr: redact_from_text(&output.stderr, &secret_values),
            return_code: output.exit_code,
            execution_time_seconds: started.elapsed().as_secs_f64(),
        };

        let duration_ms = (result.execution_time_seconds * 1000.0) as u64;
        audit_execution_completed(execution_id, result.return_code, duration_ms, result.stdout.len());
        tracing::info!(
            execution_id,
            return_code = result.return_code,
            duration_ms,
            "execution finished"
        );

        close_scratch(env_file);
        close_scratch(Some(program_file));
        *stage = ExecutionStage::Done;
        Ok(result)
    }

    /// Scripts in import order. The first unknown name aborts the request.
    fn load_scripts(&self, names: &[String]) -> Result<Vec<ScriptArtifact>> {
        names
            .iter()
            .map(|name| {
                let node = self
                    .graph
                    .get_node_by_name(NodeType::Script, name)?
                    .ok_or_else(|| Error::not_found(NodeType::Script.as_str(), name.as_str()))?;
                ScriptArtifact::from_node(&node)
            })
            .collect()
    }

    /// Declared secret values plus the values of any merged name the classifier flags.
    fn redaction_values(
        &self,
        variables: &BTreeMap<String, String>,
        mut declared: Vec<String>,
    ) -> Vec<String> {
        for (name, value) in variables {
            if self.classifier.is_secret(name) && !declared.contains(value) {
                declared.push(value.clone());
            }
        }
        declared
    }

    fn locate_runner(&self) -> Result<PathBuf> {
        which::which(&self.settings.program).map_err(|_| {
            let hint = if self.settings.program == "uv" {
                ". Install uv: https://docs.astral.sh/uv/"
            } else {
                ""
            };
            Error::ExecutionFailed(format!(
                "runner '{}' not found on PATH{}",
                self.settings.program, hint
            ))
        })
    }

    fn write_program(&self, program: &str) -> Result<TempPath> {
        use std::io::Write;

        let to_err = |e: std::io::Error| Error::ExecutionFailed(format!("cannot write scratch program: {}", e));
        std::fs::create_dir_all(&self.settings.cache_dir).map_err(to_err)?;
        let mut file = tempfile::Builder::new()
            .prefix(SCRATCH_PREFIX)
            .suffix(PROGRAM_SUFFIX)
            .tempfile_in(&self.settings.cache_dir)
            .map_err(to_err)?;
        file.write_all(program.as_bytes()).map_err(to_err)?;
        file.flush().map_err(to_err)?;
        Ok(file.into_temp_path())
    }
}

fn close_scratch(path: Option<TempPath>) {
    if let Some(path) = path {
        let shown = path.display().to_string();
        if let Err(e) = path.close() {
            tracing::warn!(path = %shown, error = %e, "failed to remove scratch file");
        }
    }
}
