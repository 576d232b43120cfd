use std::collections::BTreeMap;
use std::path::Path;

use skillgraph_core::graph::{EdgeType, MemoryGraph, Properties};

use super::*;
use crate::env::BundleService;

struct Harness {
    _root: tempfile::TempDir,
    cache_dir: PathBuf,
    env_dir: PathBuf,
    graph: Arc<MemoryGraph>,
    files: Arc<EnvFileStore>,
    classifier: Arc<SecretClassifier>,
}

impl Harness {
    fn new() -> Self {
        let root = tempfile::tempdir().expect("tempdir");
        let cache_dir = root.path().join("cache");
        let env_dir = root.path().join("envs");
        Self {
            files: Arc::new(EnvFileStore::new(&env_dir)),
            _root: root,
            cache_dir,
            env_dir,
            graph: Arc::new(MemoryGraph::new()),
            classifier: Arc::new(SecretClassifier::with_defaults()),
        }
    }

    fn runner_with(&self, program: &str) -> ScriptRunner {
        ScriptRunner::new(
            self.graph.clone(),
            self.files.clone(),
            self.classifier.clone(),
            RunnerSettings {
                cache_dir: self.cache_dir.clone(),
                program: program.to_string(),
                args: Vec::new(),
                default_timeout: 30,
                max_timeout: 60,
                runtime_version: Some(">=3.12".to_string()),
            },
        )
    }

    /// Runner that executes the scratch program with python3, or `None` if python3 is absent.
    fn python_runner(&self) -> Option<ScriptRunner> {
        which::which("python3").ok()?;
        Some(self.runner_with("python3"))
    }

    fn add_script(&self, name: &str, body: &str) -> String {
        self.graph
            .create_node(NodeType::Script, name, ScriptArtifact::properties("", "", body))
            .expect("script")
            .id
    }

    fn add_bundle(&self, name: &str, pairs: &[(&str, &str)]) -> String {
        let vars: BTreeMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let svc = BundleService::new(self.graph.clone(), self.files.clone(), self.classifier.clone());
        svc.create(name, "", &vars).expect("bundle").id
    }

    fn link(&self, script_id: &str, bundle_id: &str) {
        self.graph
            .create_edge(EdgeType::Contains, script_id, bundle_id, Properties::new())
            .expect("edge");
    }
}

fn scratch_files(dir: &Path) -> Vec<String> {
    std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|n| n.starts_with(SCRATCH_PREFIX))
                .collect()
        })
        .unwrap_or_default()
}

fn request(code: &str, imports: &[&str], envs: &[&str]) -> ExecutionRequest {
    ExecutionRequest {
        code: code.to_string(),
        imports: imports.iter().map(|s| s.to_string()).collect(),
        envs: envs.iter().map(|s| s.to_string()).collect(),
        timeout_seconds: None,
    }
}

#[tokio::test]
async fn test_imported_functions_compose() {
    let h = Harness::new();
    let Some(runner) = h.python_runner() else {
        return;
    };
    h.add_script("add", "def add(a, b):\n    return a + b\n");
    h.add_script("multiply", "def multiply(a, b):\n    return a * b\n");

    let result = runner
        .execute(&request("print(multiply(add(2, 3), 4))", &["add", "multiply"], &[]))
        .await
        .expect("execute");
    assert!(result.success, "stderr: {}", result.stderr);
    assert_eq!(result.return_code, 0);
    assert!(result.stdout.contains("20"));
    assert!(result.execution_time_seconds >= 0.0);
    assert!(scratch_files(&h.cache_dir).is_empty());
}

#[tokio::test]
async fn test_linked_bundle_values_reach_child_but_secrets_never_leave() {
    let h = Harness::new();
    let Some(runner) = h.python_runner() else {
        return;
    };
    let script = h.add_script(
        "greet",
        "import os\n\ndef greet(name):\n    assert os.environ['SECRET_KEY'] == 'my-secret'\n    return f\"{os.environ['GREETING_PREFIX']}, {name}!\"\n",
    );
    let bundle = h.add_bundle("greeting", &[("GREETING_PREFIX", "Welcome"), ("SECRET_KEY", "my-secret")]);
    h.link(&script, &bundle);

    let result = runner
        .execute(&request("print(greet('Ada'))", &["greet"], &[]))
        .await
        .expect("execute");
    assert!(result.success, "stderr: {}", result.stderr);
    assert!(result.stdout.contains("Welcome, Ada!"));
    assert!(!result.stdout.contains("my-secret"));

    let leaked = runner
        .execute(&request(
            "import os, sys\nprint(os.environ['SECRET_KEY'])\nprint('err', os.environ['SECRET_KEY'], file=sys.stderr)",
            &["greet"],
            &[],
        ))
        .await
        .expect("execute");
    assert!(!leaked.stdout.contains("my-secret"));
    assert!(!leaked.stderr.contains("my-secret"));
    assert!(leaked.stdout.contains(crate::security::REDACTION_PLACEHOLDER));
    assert!(scratch_files(&h.env_dir).is_empty());
}

#[tokio::test]
async fn test_direct_bundle_overrides_linked_values() {
    let h = Harness::new();
    let Some(runner) = h.python_runner() else {
        return;
    };
    let script = h.add_script("mode", "import os\n\ndef mode():\n    return os.environ['RUN_MODE']\n");
    let linked = h.add_bundle("linked", &[("RUN_MODE", "linked")]);
    h.add_bundle("direct", &[("RUN_MODE", "direct")]);
    h.link(&script, &linked);

    let result = runner
        .execute(&request("print(mode())", &["mode"], &["direct"]))
        .await
        .expect("execute");
    assert_eq!(result.stdout.trim(), "direct");
}

#[tokio::test]
async fn test_script_failure_is_a_result_not_an_error() {
    let h = Harness::new();
    let Some(runner) = h.python_runner() else {
        return;
    };
    h.add_script("boom", "def boom():\n    raise ValueError('kaboom')\n");
    h.add_bundle("boom-env", &[("PORT", "8080")]);

    let result = runner
        .execute(&request("boom()", &["boom"], &["boom-env"]))
        .await
        .expect("execute");
    assert!(!result.success);
    assert_ne!(result.return_code, 0);
    assert!(result.stderr.contains("kaboom") || result.stdout.contains("kaboom"));
    assert!(scratch_files(&h.cache_dir).is_empty());
    assert!(scratch_files(&h.env_dir).is_empty());
}

#[tokio::test]
async fn test_timeout_kills_and_cleans_up() {
    let h = Harness::new();
    let Some(runner) = h.python_runner() else {
        return;
    };
    h.add_script("slow", "import time\n\ndef slow():\n    time.sleep(30)\n");
    h.add_bundle("cfg", &[("PORT", "8080")]);

    let mut req = request("slow()", &["slow"], &["cfg"]);
    req.timeout_seconds = Some(1);
    let started = Instant::now();
    let err = runner.execute(&req).await.unwrap_err();

    assert!(err.is_timeout(), "unexpected error: {err}");
    assert!(err.is_execution_failure());
    assert!(started.elapsed() < Duration::from_secs(20));
    assert!(scratch_files(&h.cache_dir).is_empty());
    assert!(scratch_files(&h.env_dir).is_empty());
}

#[tokio::test]
async fn test_missing_import_is_not_found_and_launches_nothing() {
    let h = Harness::new();
    let runner = h.runner_with("python3");

    let err = runner
        .execute(&request("print(1)", &["missing-script"], &[]))
        .await
        .unwrap_err();
    match err {
        Error::NotFound { node_type, name } => {
            assert_eq!(node_type, "SCRIPT");
            assert_eq!(name, "missing-script");
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!h.cache_dir.exists() || scratch_files(&h.cache_dir).is_empty());
}

#[tokio::test]
async fn test_missing_direct_env_is_not_found() {
    let h = Harness::new();
    let runner = h.runner_with("python3");
    let err = runner
        .execute(&request("print(1)", &[], &["nope"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NotFound { ref name, .. } if name == "nope"));
}

#[tokio::test]
async fn test_entry_point_of_import_does_not_run() {
    let h = Harness::new();
    let Some(runner) = h.python_runner() else {
        return;
    };
    h.add_script(
        "tool",
        "def tool():\n    return 'tool-ok'\n\nif __name__ == \"__main__\":\n    print('SIDE EFFECT')\n",
    );

    let result = runner
        .execute(&request("print(tool())", &["tool"], &[]))
        .await
        .expect("execute");
    assert!(result.stdout.contains("tool-ok"));
    assert!(!result.stdout.contains("SIDE EFFECT"));
}

#[tokio::test]
async fn test_missing_runner_is_labeled_execution_failure() {
    let h = Harness::new();
    let runner = h.runner_with("skillgraph-no-such-runner");
    let err = runner
        .execute(&request("print(1)", &[], &[]))
        .await
        .unwrap_err();
    assert!(err.is_execution_failure());
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("skillgraph-no-such-runner"));
    assert!(scratch_files(&h.cache_dir).is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn test_launch_failure_after_scratch_files_cleans_up() {
    use std::os::unix::fs::PermissionsExt;

    // Executable on disk, so lookup succeeds, but exec fails on the missing interpreter.
    let bin = tempfile::tempdir().expect("tempdir");
    let fake = bin.path().join("bad-runner");
    std::fs::write(&fake, "#!/nonexistent/interpreter\n").expect("write");
    std::fs::set_permissions(&fake, std::fs::Permissions::from_mode(0o755)).expect("chmod");

    let h = Harness::new();
    h.add_bundle("cfg", &[("PORT", "8080")]);
    let runner = h.runner_with(&fake.to_string_lossy());

    let err = runner
        .execute(&request("print(1)", &[], &["cfg"]))
        .await
        .unwrap_err();
    assert!(err.is_execution_failure(), "unexpected error: {err}");
    assert!(!err.is_timeout());
    assert!(err.to_string().contains("failed to launch runner"));
    assert!(scratch_files(&h.cache_dir).is_empty());
    assert!(scratch_files(&h.env_dir).is_empty());
}

#[tokio::test]
async fn test_malformed_metadata_is_dependency_error() {
    let h = Harness::new();
    let runner = h.runner_with("python3");
    h.add_script("broken", "# /// script\n# dependencies = [\n# ///\nX = 1\n");
    let err = runner
        .execute(&request("print(X)", &["broken"], &[]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::DependencyParse { ref script, .. } if script == "broken"));
}

#[test]
fn test_request_validation() {
    assert!(ExecutionRequest::new("  \n").validate(600).is_err());
    assert!(ExecutionRequest::new("print(1)").validate(600).is_ok());

    let mut req = ExecutionRequest::new("print(1)");
    req.timeout_seconds = Some(0);
    assert!(matches!(req.validate(600), Err(Error::Validation(_))));
    req.timeout_seconds = Some(601);
    assert!(req.validate(600).is_err());
    req.timeout_seconds = Some(600);
    assert!(req.validate(600).is_ok());

    req.imports = vec![String::new()];
    assert!(req.validate(600).is_err());
}

#[test]
fn test_wire_shapes_are_camel_case() {
    let req: ExecutionRequest = serde_json::from_str(
        r#"{"code": "print(1)", "imports": ["add"], "timeoutSeconds": 5}"#,
    )
    .expect("request");
    assert_eq!(req.imports, vec!["add"]);
    assert!(req.envs.is_empty());
    assert_eq!(req.timeout_seconds, Some(5));

    let result = ExecutionResult {
        success: true,
        stdout: "20\n".into(),
        stderr: String::new(),
        return_code: 0,
        execution_time_seconds: 0.5,
    };
    let json = serde_json::to_value(&result).expect("json");
    assert_eq!(json["returnCode"], 0);
    assert_eq!(json["executionTimeSeconds"], 0.5);
}

#[test]
fn test_settings_from_config_split_runner() {
    let cfg = ExecutionConfig::default();
    let settings = RunnerSettings::from_config(&cfg).expect("settings");
    assert_eq!(settings.program, "uv");
    assert_eq!(settings.args, vec!["run"]);
    assert_eq!(settings.max_timeout, cfg.max_timeout);
}
