/// Inbound execution request
use crate::config::types::{Result, ScriptboxError};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One script submitted for execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionRequest {
    /// Correlation id for logs and audit events
    #[serde(default = "new_request_id")]
    pub request_id: String,
    pub script: String,
}

fn new_request_id() -> String {
    Uuid::new_v4().to_string()
}

impl ExecutionRequest {
    /// Validate and wrap a script. Blank scripts are refused.
    pub fn new(script: impl Into<String>) -> Result<Self> {
        let request = Self {
            request_id: new_request_id(),
            script: script.into(),
        };
        request.validate()?;
        Ok(request)
    }

    /// Parse a `{"script": "..."}` body
    pub fn from_json(body: &str) -> Result<Self> {
        let request: Self = serde_json::from_str(body)
            .map_err(|e| ScriptboxError::InvalidRequest(format!("Malformed request: {}", e)))?;
        request.validate()?;
        Ok(request)
    }

    pub fn validate(&self) -> Result<()> {
        if self.script.trim().is_empty() {
            return Err(ScriptboxError::InvalidRequest(
                "script must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    pub fn script(&self) -> &str {
        &self.script
    }
}
