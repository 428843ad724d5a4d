/// Process-group termination for timed-out sandbox runs
use nix::errno::Errno;
use nix::sys::signal::{self, Signal};
use nix::unistd::Pid;
use std::process::Child;
use std::thread;
use std::time::{Duration, Instant};

/// Record of what termination did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KillReport {
    pub term_sent: bool,
    pub kill_sent: bool,
    /// Leader exited during the SIGTERM grace period
    pub exited_on_term: bool,
    pub reaped: bool,
    pub waited_ms: u64,
    pub notes: Vec<String>,
}

fn signal_group(pgid: Pid, sig: Signal, report: &mut KillReport) -> bool {
    match signal::killpg(pgid, sig) {
        Ok(()) => true,
        // Group already empty.
        Err(Errno::ESRCH) => false,
        Err(e) => {
            report
                .notes
                .push(format!("group {} failed ({}), signalling leader only", sig, e));
            signal::kill(pgid, sig).is_ok()
        }
    }
}

/// SIGKILL whatever is left in the group of a leader that already exited.
/// Returns true if any process was still there to signal.
pub fn sweep_group(leader_pid: u32) -> bool {
    let pgid = Pid::from_raw(leader_pid as i32);
    match signal::killpg(pgid, Signal::SIGKILL) {
        Ok(()) => {
            log::warn!("Killed processes left in group {} after its leader exited", pgid);
            true
        }
        Err(Errno::ESRCH) => false,
        Err(e) => {
            log::warn!("Failed to sweep process group {}: {}", pgid, e);
            false
        }
    }
}

/// Terminate the child's whole process group: SIGTERM, a short grace period
/// for the sandbox tool to tear down its jail, then SIGKILL for anything left.
/// The child must have been spawned as a group leader.
pub fn terminate_group(child: &mut Child, grace: Duration) -> KillReport {
    let mut report = KillReport::default();
    let start = Instant::now();
    let pgid = Pid::from_raw(child.id() as i32);

    report.term_sent = signal_group(pgid, Signal::SIGTERM, &mut report);

    while start.elapsed() < grace {
        match child.try_wait() {
            Ok(Some(_)) => {
                report.exited_on_term = true;
                report.reaped = true;
                break;
            }
            Ok(None) => thread::sleep(Duration::from_millis(10)),
            Err(e) => {
                report.notes.push(format!("try_wait during grace failed: {}", e));
                break;
            }
        }
    }

    // Always sweep the group: grandchildren may outlive the leader.
    report.kill_sent = signal_group(pgid, Signal::SIGKILL, &mut report);

    if !report.reaped {
        match child.wait() {
            Ok(_) => report.reaped = true,
            Err(e) => report.notes.push(format!("wait after SIGKILL failed: {}", e)),
        }
    }

    report.waited_ms = start.elapsed().as_millis() as u64;
    log::debug!("Terminated process group {}: {:?}", pgid, report);
    report
}
