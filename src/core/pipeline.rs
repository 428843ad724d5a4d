/// Request pipeline: screen, build workspace, launch, interpret, clean up
use crate::config::types::{OutputIntegrity, Result};
use crate::config::PipelineConfig;
use crate::core::request::ExecutionRequest;
use crate::exec::{IsolatedRunner, LaunchResult, NsjailRunner, SandboxInvocation};
use crate::observability::audit;
use crate::safety::WorkspaceManager;
use crate::screening::{Screener, ScreeningVerdict};
use crate::verdict::{interpret, ExecutionOutcome};
use std::time::Instant;

/// Execution pipeline. Holds only read-only state; safe to share across threads.
pub struct Pipeline<R: IsolatedRunner = NsjailRunner> {
    config: PipelineConfig,
    screener: Screener,
    workspaces: WorkspaceManager,
    runner: R,
}

impl Pipeline<NsjailRunner> {
    /// Pipeline backed by the external isolation tool
    pub fn new(config: PipelineConfig) -> Result<Self> {
        let runner = NsjailRunner::new(config.output.clone());
        Self::with_runner(config, runner)
    }
}

impl<R: IsolatedRunner> Pipeline<R> {
    pub fn with_runner(config: PipelineConfig, runner: R) -> Result<Self> {
        config.validate()?;
        let screener = Screener::new(config.pattern_set());
        let workspaces = WorkspaceManager::new(config.workspace_root.clone())?;
        log::info!(
            "Pipeline ready: runner={}, timeout={}s, workspace_root={}",
            runner.name(),
            config.timeout_secs,
            workspaces.root().display()
        );
        Ok(Self {
            config,
            screener,
            workspaces,
            runner,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn workspaces(&self) -> &WorkspaceManager {
        &self.workspaces
    }

    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Screening only, without building or launching anything
    pub fn screen(&self, script: &str) -> ScreeningVerdict {
        self.screener.screen(script)
    }

    /// Validate `script` and run it
    pub fn execute_script(&self, script: &str) -> Result<ExecutionOutcome> {
        let request = ExecutionRequest::new(script)?;
        Ok(self.execute(&request))
    }

    /// Run one request to a final outcome. Never fails: every failure is an outcome.
    pub fn execute(&self, request: &ExecutionRequest) -> ExecutionOutcome {
        let request_id = request.request_id();

        if let ScreeningVerdict::Reject { pattern } = self.screener.screen(request.script()) {
            log::info!("Request {} rejected by screening: {:?}", request_id, pattern);
            audit::screening_rejected(request_id, &pattern);
            return ExecutionOutcome::Rejected { pattern };
        }

        let mut workspace = match self.workspaces.build(request.script()) {
            Ok(workspace) => workspace,
            Err(e) => {
                let message = format!("Failed to prepare workspace: {}", e);
                audit::infrastructure_failure(request_id, &message);
                return ExecutionOutcome::InfrastructureError { message };
            }
        };
        let run_id = workspace.run_id().to_string();

        let invocation = SandboxInvocation::for_workspace(&self.config, &workspace);
        audit::execution_start(request_id, &run_id, self.runner.name());
        let started = Instant::now();

        let launch = self.runner.run(&invocation);
        self.record_launch(request_id, &run_id, &launch);
        let outcome = interpret(&launch);

        match workspace.cleanup() {
            Ok(()) => audit::cleanup_success(request_id, &run_id),
            Err(e) => audit::cleanup_failure(request_id, &run_id, e.to_string()),
        }

        audit::execution_end(
            request_id,
            &run_id,
            outcome.tag(),
            started.elapsed().as_millis() as u64,
        );
        outcome
    }

    fn record_launch(&self, request_id: &str, run_id: &str, launch: &LaunchResult) {
        match launch {
            LaunchResult::Completed(run) => {
                log::debug!(
                    "Run {} finished: exit={:?} signal={:?} wall={:?}",
                    run_id,
                    run.exit_code,
                    run.signal,
                    run.wall_time
                );
                let integrity = run.output_integrity();
                if integrity != OutputIntegrity::Complete {
                    log::warn!("Run {} output incomplete: {}", run_id, integrity);
                }
            }
            LaunchResult::TimedOut(run) => {
                audit::wall_time_limit_violation(
                    request_id,
                    run_id,
                    run.elapsed.as_millis() as u64,
                    run.limit.as_millis() as u64,
                );
                if run.kill_report.kill_sent && !run.kill_report.exited_on_term {
                    audit::forced_kill(
                        request_id,
                        run_id,
                        format!("SIGKILL after {} ms", run.kill_report.waited_ms),
                    );
                }
            }
            LaunchResult::InfrastructureError { message } => {
                audit::infrastructure_failure(request_id, message);
            }
        }
    }
}
