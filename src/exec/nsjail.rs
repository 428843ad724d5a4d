/// Production runner: shells out to an nsjail-compatible isolation tool
use crate::exec::invocation::SandboxInvocation;
use crate::exec::runner::{CompletedRun, IsolatedRunner, LaunchResult, TimedOutRun};
use crate::exec::terminate;
use crate::utils::output::{OutputCollector, OutputLimits};
use std::os::unix::process::{CommandExt, ExitStatusExt};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Grace period between SIGTERM and SIGKILL on timeout
const TERM_GRACE: Duration = Duration::from_millis(200);

/// Runner for the external isolation tool
#[derive(Debug, Clone)]
pub struct NsjailRunner {
    collector: OutputCollector,
    poll_interval: Duration,
}

impl NsjailRunner {
    pub fn new(limits: OutputLimits) -> Self {
        Self {
            collector: OutputCollector::new(limits),
            poll_interval: Duration::from_millis(10),
        }
    }

    fn build_command(invocation: &SandboxInvocation) -> Command {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args)
            .current_dir(&invocation.workdir)
            .env_clear()
            .envs(invocation.environment.iter().map(|(k, v)| (k, v)))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            // Own process group so a timeout can take down everything the tool spawned.
            .process_group(0);
        cmd
    }
}

impl Default for NsjailRunner {
    fn default() -> Self {
        Self::new(OutputLimits::default())
    }
}

impl IsolatedRunner for NsjailRunner {
    fn name(&self) -> &'static str {
        "nsjail"
    }

    fn run(&self, invocation: &SandboxInvocation) -> LaunchResult {
        log::debug!("Launching sandbox: {:?}", invocation.argv());
        let started = Instant::now();

        let mut child = match Self::build_command(invocation).spawn() {
            Ok(child) => child,
            Err(e) => {
                return LaunchResult::InfrastructureError {
                    message: format!(
                        "Failed to start sandbox '{}': {}",
                        invocation.program.display(),
                        e
                    ),
                };
            }
        };

        let pending = self
            .collector
            .start(child.stdout.take(), child.stderr.take());

        loop {
            match child.try_wait() {
                Ok(Some(status)) => {
                    // Descendants still holding the pipes would stall collection.
                    terminate::sweep_group(child.id());
                    let output = pending.finish();
                    return LaunchResult::Completed(CompletedRun {
                        exit_code: status.code(),
                        signal: status.signal(),
                        stdout: output.stdout.to_string_lossy(),
                        stderr: output.stderr.to_string_lossy(),
                        wall_time: started.elapsed(),
                        stdout_integrity: output.stdout.integrity,
                        stderr_integrity: output.stderr.integrity,
                        stdout_limit: self.collector.limits().stdout_limit,
                    });
                }
                Ok(None) => {
                    let elapsed = started.elapsed();
                    if elapsed >= invocation.timeout {
                        log::warn!(
                            "Sandbox exceeded wall-clock limit of {:?}, terminating process group {}",
                            invocation.timeout,
                            child.id()
                        );
                        let kill_report = terminate::terminate_group(&mut child, TERM_GRACE);
                        let output = pending.finish();
                        return LaunchResult::TimedOut(TimedOutRun {
                            elapsed,
                            limit: invocation.timeout,
                            kill_report,
                            partial_stdout: output.stdout.to_string_lossy(),
                        });
                    }
                    thread::sleep(self.poll_interval);
                }
                Err(e) => {
                    let _ = terminate::terminate_group(&mut child, TERM_GRACE);
                    return LaunchResult::InfrastructureError {
                        message: format!("Sandbox monitoring failed: {}", e),
                    };
                }
            }
        }
    }
}
