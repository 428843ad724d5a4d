/// Execution outcomes and their response payloads
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Where a failed run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureStage {
    /// Script top-level code raised while loading
    ScriptLoad,
    /// Script loaded but defines no callable `main`
    MissingEntryPoint,
    /// `main()` raised
    Invocation,
    /// Non-zero status the wrapper never produces (sandbox refusal, kill by signal)
    Sandbox,
    /// Run exited cleanly but its stdout was not captured in full
    Output,
}

/// Final, request-scoped outcome. Exactly one variant per request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ExecutionOutcome {
    /// `main()` returned a JSON value
    Result { value: Value, stdout: String },
    /// Script failed; `message` is the wrapper's diagnostic
    ExecutionError {
        message: String,
        stdout: String,
        stage: FailureStage,
    },
    /// Entry point returned something with no JSON representation
    FormatError { message: String, stdout: String },
    /// Wall-clock budget exhausted; the run was killed
    Timeout { limit_ms: u64 },
    /// Sandbox tooling failed; not attributable to the script
    InfrastructureError { message: String },
    /// Static screening refused the script before launch
    Rejected { pattern: String },
}

/// Coarse response category for the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseClass {
    Ok,
    ClientError,
    ServerError,
}

impl ResponseClass {
    pub fn http_status(self) -> u16 {
        match self {
            ResponseClass::Ok => 200,
            ResponseClass::ClientError => 400,
            ResponseClass::ServerError => 500,
        }
    }
}

/// Normalized response body: `{"result": .., "stdout": ..}` or `{"error": .., "stdout": ..}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExecutionResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub stdout: String,
}

impl ExecutionOutcome {
    pub fn timeout(limit: Duration) -> Self {
        ExecutionOutcome::Timeout {
            limit_ms: limit.as_millis() as u64,
        }
    }

    /// Stable tag used in logs and audit events
    pub fn tag(&self) -> &'static str {
        match self {
            ExecutionOutcome::Result { .. } => "result",
            ExecutionOutcome::ExecutionError { .. } => "execution_error",
            ExecutionOutcome::FormatError { .. } => "format_error",
            ExecutionOutcome::Timeout { .. } => "timeout",
            ExecutionOutcome::InfrastructureError { .. } => "infrastructure_error",
            ExecutionOutcome::Rejected { .. } => "rejected",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, ExecutionOutcome::Result { .. })
    }

    /// Captured stdout, for variants that carry it
    pub fn stdout(&self) -> Option<&str> {
        match self {
            ExecutionOutcome::Result { stdout, .. }
            | ExecutionOutcome::ExecutionError { stdout, .. }
            | ExecutionOutcome::FormatError { stdout, .. } => Some(stdout),
            _ => None,
        }
    }

    pub fn response_class(&self) -> ResponseClass {
        match self {
            ExecutionOutcome::Result { .. } => ResponseClass::Ok,
            ExecutionOutcome::InfrastructureError { .. } => ResponseClass::ServerError,
            ExecutionOutcome::ExecutionError { .. }
            | ExecutionOutcome::FormatError { .. }
            | ExecutionOutcome::Timeout { .. }
            | ExecutionOutcome::Rejected { .. } => ResponseClass::ClientError,
        }
    }

    /// Human-readable error message, `None` on success
    pub fn error_message(&self) -> Option<String> {
        match self {
            ExecutionOutcome::Result { .. } => None,
            ExecutionOutcome::ExecutionError { message, .. }
            | ExecutionOutcome::FormatError { message, .. } => Some(message.clone()),
            ExecutionOutcome::Timeout { limit_ms } => Some(format!(
                "Script execution timeout ({} seconds)",
                Duration::from_millis(*limit_ms).as_secs_f64()
            )),
            ExecutionOutcome::InfrastructureError { message } => {
                Some(format!("Execution error: {}", message))
            }
            ExecutionOutcome::Rejected { pattern } => Some(format!(
                "Script contains potentially dangerous import or function: {}",
                pattern
            )),
        }
    }

    pub fn to_response(&self) -> ExecutionResponse {
        let stdout = self.stdout().unwrap_or_default().to_string();
        match self {
            ExecutionOutcome::Result { value, .. } => ExecutionResponse {
                result: Some(value.clone()),
                error: None,
                stdout,
            },
            _ => ExecutionResponse {
                result: None,
                error: self.error_message(),
                stdout,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_result_response_shape() {
        let outcome = ExecutionOutcome::Result {
            value: json!({"a": 1}),
            stdout: "{\"a\": 1}".to_string(),
        };
        assert_eq!(outcome.response_class(), ResponseClass::Ok);
        let body = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(body, json!({"result": {"a": 1}, "stdout": "{\"a\": 1}"}));
    }

    #[test]
    fn test_null_result_is_kept() {
        let outcome = ExecutionOutcome::Result {
            value: Value::Null,
            stdout: "null".to_string(),
        };
        let body = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(body, json!({"result": null, "stdout": "null"}));
    }

    #[test]
    fn test_rejection_message() {
        let outcome = ExecutionOutcome::Rejected {
            pattern: "open(".to_string(),
        };
        assert_eq!(outcome.response_class(), ResponseClass::ClientError);
        let body = serde_json::to_value(outcome.to_response()).unwrap();
        assert_eq!(
            body,
            json!({
                "error": "Script contains potentially dangerous import or function: open(",
                "stdout": ""
            })
        );
    }

    #[test]
    fn test_timeout_message_uses_seconds() {
        let outcome = ExecutionOutcome::timeout(Duration::from_secs(35));
        assert_eq!(
            outcome.error_message().unwrap(),
            "Script execution timeout (35 seconds)"
        );
        assert_eq!(outcome.response_class().http_status(), 400);
    }

    #[test]
    fn test_infrastructure_error_is_server_error() {
        let outcome = ExecutionOutcome::InfrastructureError {
            message: "Failed to start sandbox 'nsjail'".to_string(),
        };
        assert_eq!(outcome.response_class(), ResponseClass::ServerError);
        assert_eq!(outcome.response_class().http_status(), 500);
        assert!(outcome
            .error_message()
            .unwrap()
            .starts_with("Execution error: "));
    }

    #[test]
    fn test_outcome_serializes_with_tag() {
        let outcome = ExecutionOutcome::ExecutionError {
            message: "ERROR: x".to_string(),
            stdout: String::new(),
            stage: FailureStage::Invocation,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["outcome"], "execution_error");
        assert_eq!(value["stage"], "invocation");
        assert_eq!(outcome.tag(), "execution_error");
    }
}
