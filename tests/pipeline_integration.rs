//! Integration tests for the request pipeline
//!
//! The isolation tool is replaced by scripted runners so every outcome path
//! can be driven deterministically.

use scriptbox::exec::{
    CompletedRun, IsolatedRunner, KillReport, LaunchResult, SandboxInvocation, TimedOutRun,
};
use scriptbox::verdict::FailureStage;
use scriptbox::{ExecutionOutcome, ExecutionRequest, Pipeline, PipelineConfig, ResponseClass};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

const VALID_SCRIPT: &str = "def main():\n    return {\"ok\": True}\n";

/// Returns a fixed launch result and remembers each workspace it saw
struct ScriptedRunner {
    result: LaunchResult,
    workdirs: Mutex<Vec<PathBuf>>,
}

impl ScriptedRunner {
    fn new(result: LaunchResult) -> Self {
        Self {
            result,
            workdirs: Mutex::new(Vec::new()),
        }
    }

    fn workdirs(&self) -> Vec<PathBuf> {
        self.workdirs.lock().unwrap().clone()
    }
}

impl IsolatedRunner for ScriptedRunner {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn run(&self, invocation: &SandboxInvocation) -> LaunchResult {
        assert!(invocation.workdir.is_dir(), "workspace must exist during launch");
        self.workdirs
            .lock()
            .unwrap()
            .push(invocation.workdir.clone());
        self.result.clone()
    }
}

fn completed(exit_code: i32, stdout: &str, stderr: &str) -> LaunchResult {
    LaunchResult::Completed(CompletedRun {
        exit_code: Some(exit_code),
        stdout: stdout.to_string(),
        stderr: stderr.to_string(),
        wall_time: Duration::from_millis(40),
        ..Default::default()
    })
}

fn pipeline_with(root: &Path, result: LaunchResult) -> Pipeline<ScriptedRunner> {
    let config = PipelineConfig {
        workspace_root: root.to_path_buf(),
        ..Default::default()
    };
    Pipeline::with_runner(config, ScriptedRunner::new(result)).unwrap()
}

fn assert_workspaces_removed(pipeline: &Pipeline<ScriptedRunner>, root: &Path) {
    for workdir in pipeline.runner().workdirs() {
        assert!(!workdir.exists(), "{} left behind", workdir.display());
    }
    assert_eq!(std::fs::read_dir(root).unwrap().count(), 0);
}

#[test]
fn test_successful_run_yields_result() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(dir.path(), completed(0, "{\"ok\": true}", ""));

    let outcome = pipeline.execute_script(VALID_SCRIPT).unwrap();
    assert_eq!(
        outcome,
        ExecutionOutcome::Result {
            value: json!({"ok": true}),
            stdout: "{\"ok\": true}".to_string(),
        }
    );
    assert_eq!(outcome.response_class(), ResponseClass::Ok);
    assert_eq!(pipeline.runner().workdirs().len(), 1);
    assert_workspaces_removed(&pipeline, dir.path());
}

#[test]
fn test_missing_entry_point_yields_execution_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        dir.path(),
        completed(11, "", "ERROR: No main() function found\n"),
    );

    let outcome = pipeline.execute_script("x = 1\n").unwrap();
    match &outcome {
        ExecutionOutcome::ExecutionError { message, stage, .. } => {
            assert!(message.contains("No main() function found"));
            assert_eq!(*stage, FailureStage::MissingEntryPoint);
        }
        other => panic!("expected ExecutionError, got {:?}", other),
    }
    assert_eq!(outcome.response_class().http_status(), 400);
    assert_workspaces_removed(&pipeline, dir.path());
}

#[test]
fn test_not_serializable_yields_format_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        dir.path(),
        completed(
            13,
            "",
            "ERROR: main() function must return JSON serializable data\n",
        ),
    );

    let outcome = pipeline
        .execute_script("def main():\n    return set()\n")
        .unwrap();
    assert!(matches!(outcome, ExecutionOutcome::FormatError { .. }));
    assert_workspaces_removed(&pipeline, dir.path());
}

#[test]
fn test_timeout_yields_timeout_and_removes_workspace() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        dir.path(),
        LaunchResult::TimedOut(TimedOutRun {
            elapsed: Duration::from_secs(35),
            limit: Duration::from_secs(35),
            kill_report: KillReport {
                term_sent: true,
                kill_sent: true,
                reaped: true,
                waited_ms: 200,
                ..Default::default()
            },
            partial_stdout: String::new(),
        }),
    );

    let outcome = pipeline
        .execute_script("def main():\n    while True:\n        pass\n")
        .unwrap();
    assert_eq!(
        outcome.error_message().unwrap(),
        "Script execution timeout (35 seconds)"
    );
    assert_eq!(outcome.response_class(), ResponseClass::ClientError);
    assert_workspaces_removed(&pipeline, dir.path());
}

#[test]
fn test_launch_failure_yields_infrastructure_error() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(
        dir.path(),
        LaunchResult::InfrastructureError {
            message: "Failed to start sandbox 'nsjail': No such file or directory".to_string(),
        },
    );

    let outcome = pipeline.execute_script(VALID_SCRIPT).unwrap();
    assert_eq!(outcome.response_class(), ResponseClass::ServerError);
    assert_eq!(
        outcome.to_response().error.unwrap(),
        "Execution error: Failed to start sandbox 'nsjail': No such file or directory"
    );
    assert_workspaces_removed(&pipeline, dir.path());
}

#[test]
fn test_rejected_script_builds_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(dir.path(), completed(0, "1", ""));

    let outcome = pipeline
        .execute_script("def main():\n    return OPEN('/etc/passwd').read()\n")
        .unwrap();
    assert_eq!(
        outcome,
        ExecutionOutcome::Rejected {
            pattern: "open(".to_string()
        }
    );
    assert!(pipeline.runner().workdirs().is_empty());
    assert_workspaces_removed(&pipeline, dir.path());
}

#[test]
fn test_configured_patterns_replace_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = PipelineConfig {
        workspace_root: dir.path().to_path_buf(),
        ..Default::default()
    };
    config.screening.patterns = Some(vec!["forbidden_word".to_string()]);
    let pipeline = Pipeline::with_runner(config, ScriptedRunner::new(completed(0, "1", ""))).unwrap();

    assert!(pipeline.screen("eval(1)").is_pass());
    let outcome = pipeline
        .execute_script("def main():\n    return 'FORBIDDEN_WORD'\n")
        .unwrap();
    assert!(matches!(outcome, ExecutionOutcome::Rejected { .. }));
}

#[test]
fn test_blank_request_is_refused_before_pipeline() {
    assert!(ExecutionRequest::new("   \n").is_err());
}

#[test]
fn test_concurrent_requests_use_distinct_workspaces() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = pipeline_with(dir.path(), completed(0, "[1, 2, 3]", ""));

    std::thread::scope(|scope| {
        for _ in 0..8 {
            scope.spawn(|| {
                let outcome = pipeline.execute_script(VALID_SCRIPT).unwrap();
                assert_eq!(
                    outcome,
                    ExecutionOutcome::Result {
                        value: json!([1, 2, 3]),
                        stdout: "[1, 2, 3]".to_string(),
                    }
                );
            });
        }
    });

    let mut workdirs = pipeline.runner().workdirs();
    assert_eq!(workdirs.len(), 8);
    workdirs.sort();
    workdirs.dedup();
    assert_eq!(workdirs.len(), 8, "workspaces must be unique per request");
    assert_workspaces_removed(&pipeline, dir.path());
}
