//! Observability: tracing init and the JSONL audit log.
//!
//! Audit records describe what ran and how it ended. They never carry variable values.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde_json::json;
use tracing_subscriber::{prelude::*, EnvFilter};

use crate::config::ObservabilityConfig;

static AUDIT_PATH: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Initialize tracing. Call once at process startup.
///
/// `RUST_LOG` wins over the configured level. Quiet mode logs WARN and above only.
pub fn init_tracing(cfg: &ObservabilityConfig) {
    let level = if cfg.quiet {
        "warn".to_string()
    } else {
        cfg.level.clone()
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    if let Some(path) = &cfg.audit_log {
        set_audit_path(path);
    }

    // Logs go to stderr so stdout stays machine readable.
    let _ = if cfg.json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_writer(std::io::stderr),
            )
            .try_init()
    };
}

/// Route audit records to `path`, overriding `SKILLGRAPH_AUDIT_LOG`.
pub fn set_audit_path(path: &Path) {
    if let Ok(mut guard) = AUDIT_PATH.lock() {
        *guard = Some(path.to_path_buf());
    }
}

fn get_audit_path() -> Option<PathBuf> {
    {
        let guard = AUDIT_PATH.lock().ok()?;
        if let Some(ref p) = *guard {
            return Some(p.clone());
        }
    }
    let path = ObservabilityConfig::from_env().audit_log.clone()?;
    if let Ok(mut guard) = AUDIT_PATH.lock() {
        *guard = Some(path.clone());
    }
    Some(path)
}

fn append_jsonl(path: &Path, record: &serde_json::Value) {
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    if let Ok(mut f) = OpenOptions::new().create(true).append(true).open(path) {
        if let Ok(line) = serde_json::to_string(record) {
            let _ = writeln!(f, "{}", line);
        }
    }
}

fn audit(event: &str, mut fields: serde_json::Value) {
    let Some(path) = get_audit_path() else {
        return;
    };
    if let Some(obj) = fields.as_object_mut() {
        obj.insert(
            "ts".to_string(),
            json!(Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true)),
        );
        obj.insert("event".to_string(), json!(event));
    }
    append_jsonl(&path, &fields);
}

/// Audit: execution_started (right before spawn)
pub fn audit_execution_started(execution_id: &str, cmd: &str, args: &[String], imports: &[String], envs: &[String]) {
    audit(
        "execution_started",
        json!({
            "execution_id": execution_id,
            "cmd": cmd,
            "args": args,
            "imports": imports,
            "envs": envs,
        }),
    );
}

/// Audit: execution_completed
pub fn audit_execution_completed(execution_id: &str, exit_code: i32, duration_ms: u64, stdout_len: usize) {
    audit(
        "execution_completed",
        json!({
            "execution_id": execution_id,
            "exit_code": exit_code,
            "duration_ms": duration_ms,
            "stdout_len": stdout_len,
            "success": exit_code == 0,
        }),
    );
}

/// Audit: execution_failed (infrastructure failure or timeout)
pub fn audit_execution_failed(execution_id: &str, stage: &str, error: &str, timed_out: bool) {
    audit(
        "execution_failed",
        json!({
            "execution_id": execution_id,
            "stage": stage,
            "error": error,
            "timed_out": timed_out,
        }),
    );
}

/// Audit: bundle_created. Only variable names are recorded.
pub fn audit_bundle_created(bundle: &str, public_keys: usize, secret_keys: &[String]) {
    audit(
        "bundle_created",
        json!({
            "bundle": bundle,
            "public_keys": public_keys,
            "secret_keys": secret_keys,
        }),
    );
}

/// Audit: bundle_deleted
pub fn audit_bundle_deleted(bundle: &str) {
    audit("bundle_deleted", json!({ "bundle": bundle }));
}
