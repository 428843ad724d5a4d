/// Isolated runner contract
///
/// The pipeline only needs "run this invocation, give me status and streams or
/// tell me it timed out / could not start". Keeping that behind a trait lets
/// tests substitute fake runners for the real isolation tool.
use crate::config::types::OutputIntegrity;
use crate::exec::invocation::SandboxInvocation;
use crate::exec::terminate::KillReport;
use std::time::Duration;

/// Child ran to completion (any exit status)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompletedRun {
    /// Exit status, absent when the child was killed by a signal
    pub exit_code: Option<i32>,
    /// Terminating signal, if any
    pub signal: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub wall_time: Duration,
    pub stdout_integrity: OutputIntegrity,
    pub stderr_integrity: OutputIntegrity,
    /// Byte limit the stdout collector enforced
    pub stdout_limit: usize,
}

impl CompletedRun {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }

    /// Most severe integrity state across both streams
    pub fn output_integrity(&self) -> OutputIntegrity {
        self.stdout_integrity.worst(self.stderr_integrity)
    }
}

/// Child exceeded the wall-clock budget and was terminated
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TimedOutRun {
    pub elapsed: Duration,
    pub limit: Duration,
    pub kill_report: KillReport,
    /// Output captured before the kill, kept for diagnostics only
    pub partial_stdout: String,
}

/// What the launcher observed
#[derive(Debug, Clone, PartialEq)]
pub enum LaunchResult {
    Completed(CompletedRun),
    TimedOut(TimedOutRun),
    /// The sandbox could not be started or monitored
    InfrastructureError { message: String },
}

impl LaunchResult {
    pub fn label(&self) -> &'static str {
        match self {
            LaunchResult::Completed(_) => "completed",
            LaunchResult::TimedOut(_) => "timed_out",
            LaunchResult::InfrastructureError { .. } => "infrastructure_error",
        }
    }
}

/// Narrow interface over the external isolation tool
pub trait IsolatedRunner: Send + Sync {
    /// Short name for logs and audit events
    fn name(&self) -> &'static str;

    /// Run the invocation to completion or until its deadline. Blocks the caller.
    fn run(&self, invocation: &SandboxInvocation) -> LaunchResult;
}

impl<R: IsolatedRunner + ?Sized> IsolatedRunner for Box<R> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn run(&self, invocation: &SandboxInvocation) -> LaunchResult {
        (**self).run(invocation)
    }
}
