/// Outcome interpretation
/// Pure mapping from what the launcher observed to the request outcome.
use crate::config::types::OutputIntegrity;
use crate::entrypoint::WrapperExit;
use crate::exec::runner::{CompletedRun, LaunchResult};
use crate::verdict::outcome::{ExecutionOutcome, FailureStage};
use serde::Deserialize;
use serde_json::Value;

/// Message for entry points whose return value has no JSON form
pub const FORMAT_ERROR_MESSAGE: &str = "entry point must return JSON-serializable data";

/// Message used when a failed run left nothing on stderr
pub const GENERIC_FAILURE_MESSAGE: &str = "execution failed";

/// Outcome interpreter - no I/O, no clock, same input gives the same outcome
pub struct OutcomeInterpreter;

impl OutcomeInterpreter {
    /// Decision order: timeout, launch failure, non-serializable return,
    /// any other failure, incomplete stdout, then stdout JSON parse.
    pub fn interpret(launch: &LaunchResult) -> ExecutionOutcome {
        match launch {
            LaunchResult::TimedOut(run) => ExecutionOutcome::timeout(run.limit),
            LaunchResult::InfrastructureError { message } => {
                ExecutionOutcome::InfrastructureError {
                    message: message.clone(),
                }
            }
            LaunchResult::Completed(run) => Self::interpret_completed(run),
        }
    }

    fn interpret_completed(run: &CompletedRun) -> ExecutionOutcome {
        let stdout = run.stdout.trim().to_string();

        if run.exit_code == Some(WrapperExit::NotSerializable.code()) {
            return ExecutionOutcome::FormatError {
                message: FORMAT_ERROR_MESSAGE.to_string(),
                stdout,
            };
        }

        if !run.success() {
            let stderr = run.stderr.trim();
            let message = if stderr.is_empty() {
                GENERIC_FAILURE_MESSAGE.to_string()
            } else {
                stderr.to_string()
            };
            return ExecutionOutcome::ExecutionError {
                message,
                stdout,
                stage: Self::failure_stage(run),
            };
        }

        if run.stdout_integrity != OutputIntegrity::Complete {
            return ExecutionOutcome::ExecutionError {
                message: incomplete_stdout_message(run),
                stdout,
                stage: FailureStage::Output,
            };
        }

        match parse_json(&stdout) {
            Ok(value) => ExecutionOutcome::Result { value, stdout },
            Err(e) => {
                log::debug!("Entry point stdout is not valid JSON: {}", e);
                ExecutionOutcome::FormatError {
                    message: FORMAT_ERROR_MESSAGE.to_string(),
                    stdout,
                }
            }
        }
    }

    fn failure_stage(run: &CompletedRun) -> FailureStage {
        match run.exit_code.and_then(WrapperExit::from_code) {
            Some(WrapperExit::LoadFailed) => FailureStage::ScriptLoad,
            Some(WrapperExit::MissingEntryPoint) => FailureStage::MissingEntryPoint,
            Some(WrapperExit::InvocationFailed) => FailureStage::Invocation,
            _ => FailureStage::Sandbox,
        }
    }
}

fn incomplete_stdout_message(run: &CompletedRun) -> String {
    match run.stdout_integrity {
        OutputIntegrity::TruncatedByCollectorLimit => format!(
            "script output exceeded the {}-byte stdout limit",
            run.stdout_limit
        ),
        other => format!("script output could not be captured ({})", other),
    }
}

/// Parse one JSON document with no nesting limit. Deep documents recurse on
/// a growing heap stack instead of the thread stack.
fn parse_json(text: &str) -> serde_json::Result<Value> {
    let mut de = serde_json::Deserializer::from_str(text);
    de.disable_recursion_limit();
    let value = Value::deserialize(serde_stacker::Deserializer::new(&mut de))?;
    de.end()?;
    Ok(value)
}

/// Shorthand for [`OutcomeInterpreter::interpret`]
pub fn interpret(launch: &LaunchResult) -> ExecutionOutcome {
    OutcomeInterpreter::interpret(launch)
}
