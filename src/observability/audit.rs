/// Audit trail for script executions
/// Structured JSON-lines events keyed by request id, one per pipeline stage,
/// for incident response on rejected, timed-out or failed runs.
use crate::config::types::{Result, ScriptboxError};
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::SystemTime;

/// Audit event severity levels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditSeverity {
    Critical,
    High,
    Medium,
    Low,
}

/// Types of events the pipeline records
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AuditEventType {
    ScreeningRejected,
    ExecutionStart,
    ExecutionEnd,
    WallTimeLimitViolation,
    ForcedKill,
    CleanupSuccess,
    CleanupFailure,
    InfrastructureFailure,
}

impl AuditEventType {
    pub fn default_severity(&self) -> AuditSeverity {
        match self {
            AuditEventType::ExecutionStart => AuditSeverity::Low,
            AuditEventType::ExecutionEnd => AuditSeverity::Low,
            AuditEventType::CleanupSuccess => AuditSeverity::Low,
            AuditEventType::ScreeningRejected => AuditSeverity::Medium,
            AuditEventType::WallTimeLimitViolation => AuditSeverity::High,
            AuditEventType::ForcedKill => AuditSeverity::High,
            AuditEventType::InfrastructureFailure => AuditSeverity::High,
            AuditEventType::CleanupFailure => AuditSeverity::Critical,
        }
    }
}

/// Individual audit event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    pub event_type: AuditEventType,
    pub severity: AuditSeverity,
    pub timestamp: SystemTime,
    pub details: String,
    pub request_id: Option<String>,
    pub run_id: Option<String>,
    pub outcome: Option<String>,
}

impl AuditEvent {
    pub fn new(event_type: AuditEventType, details: String) -> Self {
        let severity = event_type.default_severity();
        Self {
            event_type,
            severity,
            timestamp: SystemTime::now(),
            details,
            request_id: None,
            run_id: None,
            outcome: None,
        }
    }

    pub fn with_request_id(mut self, request_id: &str) -> Self {
        self.request_id = Some(request_id.to_string());
        self
    }

    pub fn with_run_id(mut self, run_id: &str) -> Self {
        self.run_id = Some(run_id.to_string());
        self
    }

    pub fn with_outcome(mut self, outcome: &str) -> Self {
        self.outcome = Some(outcome.to_string());
        self
    }

    /// Flat JSON record written to the audit file
    pub fn to_json_line(&self) -> serde_json::Value {
        let mut entry = serde_json::json!({
            "timestamp": self.timestamp
                .duration_since(std::time::UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs(),
            "event_type": self.event_type,
            "severity": self.severity,
            "details": self.details,
            "process_id": std::process::id(),
        });
        if let Some(request_id) = &self.request_id {
            entry["request_id"] = serde_json::json!(request_id);
        }
        if let Some(run_id) = &self.run_id {
            entry["run_id"] = serde_json::json!(run_id);
        }
        if let Some(outcome) = &self.outcome {
            entry["outcome"] = serde_json::json!(outcome);
        }
        entry
    }
}

fn log_to_facade(event: &AuditEvent) {
    match event.severity {
        AuditSeverity::Critical | AuditSeverity::High => {
            error!("AUDIT: {:?} - {}", event.event_type, event.details)
        }
        AuditSeverity::Medium => warn!("AUDIT: {:?} - {}", event.event_type, event.details),
        AuditSeverity::Low => info!("AUDIT: {:?} - {}", event.event_type, event.details),
    }
}

/// File-backed audit logger
pub struct AuditLogger {
    audit_file: Arc<Mutex<File>>,
    audit_path: PathBuf,
}

impl AuditLogger {
    pub fn new(audit_path: &Path) -> Result<Self> {
        if let Some(parent) = audit_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                ScriptboxError::Config(format!("Failed to create audit log directory: {}", e))
            })?;
        }

        let audit_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(audit_path)
            .map_err(|e| ScriptboxError::Config(format!("Failed to open audit log: {}", e)))?;

        Ok(Self {
            audit_file: Arc::new(Mutex::new(audit_file)),
            audit_path: audit_path.to_path_buf(),
        })
    }

    pub fn log_event(&self, event: &AuditEvent) {
        log_to_facade(event);

        let entry = event.to_json_line();
        if let Ok(mut file) = self.audit_file.lock() {
            if let Err(e) = writeln!(file, "{}", entry) {
                error!("Failed to write to audit log: {}", e);
            }
            if let Err(e) = file.flush() {
                error!("Failed to flush audit log: {}", e);
            }
        } else {
            error!("Failed to acquire lock on audit file");
        }
    }

    pub fn audit_path(&self) -> &Path {
        &self.audit_path
    }
}

static AUDIT_LOGGER: OnceLock<AuditLogger> = OnceLock::new();

/// Install the global file sink. Without it events only reach the `log` facade.
pub fn init_audit_logger(audit_path: &Path) -> Result<()> {
    let logger = AuditLogger::new(audit_path)?;
    if AUDIT_LOGGER.set(logger).is_err() {
        warn!("Audit logger already initialized");
    } else {
        info!("Audit logger writing to {}", audit_path.display());
    }
    Ok(())
}

pub fn log_audit_event(event: AuditEvent) {
    match AUDIT_LOGGER.get() {
        Some(logger) => logger.log_event(&event),
        None => log_to_facade(&event),
    }
}

pub fn screening_rejected(request_id: &str, pattern: &str) {
    log_audit_event(
        AuditEvent::new(
            AuditEventType::ScreeningRejected,
            format!("Script rejected by screening: pattern={:?}", pattern),
        )
        .with_request_id(request_id),
    );
}

pub fn execution_start(request_id: &str, run_id: &str, runner: &str) {
    log_audit_event(
        AuditEvent::new(
            AuditEventType::ExecutionStart,
            format!("Execution started: run_id={}, runner={}", run_id, runner),
        )
        .with_request_id(request_id)
        .with_run_id(run_id),
    );
}

pub fn execution_end(request_id: &str, run_id: &str, outcome: &str, wall_ms: u64) {
    log_audit_event(
        AuditEvent::new(
            AuditEventType::ExecutionEnd,
            format!(
                "Execution ended: run_id={}, outcome={}, wall={} ms",
                run_id, outcome, wall_ms
            ),
        )
        .with_request_id(request_id)
        .with_run_id(run_id)
        .with_outcome(outcome),
    );
}

pub fn wall_time_limit_violation(request_id: &str, run_id: &str, used_ms: u64, limit_ms: u64) {
    log_audit_event(
        AuditEvent::new(
            AuditEventType::WallTimeLimitViolation,
            format!(
                "Wall time limit violated: used={} ms, limit={} ms",
                used_ms, limit_ms
            ),
        )
        .with_request_id(request_id)
        .with_run_id(run_id),
    );
}

pub fn forced_kill(request_id: &str, run_id: &str, reason: String) {
    log_audit_event(
        AuditEvent::new(AuditEventType::ForcedKill, format!("Forced kill: {}", reason))
            .with_request_id(request_id)
            .with_run_id(run_id),
    );
}

pub fn cleanup_success(request_id: &str, run_id: &str) {
    log_audit_event(
        AuditEvent::new(
            AuditEventType::CleanupSuccess,
            format!("Workspace removed: run_id={}", run_id),
        )
        .with_request_id(request_id)
        .with_run_id(run_id),
    );
}

pub fn cleanup_failure(request_id: &str, run_id: &str, error: String) {
    log_audit_event(
        AuditEvent::new(
            AuditEventType::CleanupFailure,
            format!("Workspace removal failed: {}", error),
        )
        .with_request_id(request_id)
        .with_run_id(run_id),
    );
}

pub fn infrastructure_failure(request_id: &str, message: &str) {
    log_audit_event(
        AuditEvent::new(
            AuditEventType::InfrastructureFailure,
            format!("Infrastructure failure: {}", message),
        )
        .with_request_id(request_id),
    );
}
