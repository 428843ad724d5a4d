//! Sandbox launcher
//!
//! Builds the external isolation tool invocation, runs it with a hard
//! wall-clock deadline, and reports status and captured streams.

pub mod invocation;
pub mod nsjail;
pub mod runner;
pub mod terminate;

pub use invocation::SandboxInvocation;
pub use nsjail::NsjailRunner;
pub use runner::{CompletedRun, IsolatedRunner, LaunchResult, TimedOutRun};
pub use terminate::KillReport;
