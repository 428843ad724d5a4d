/// Pipeline configuration loading from scriptbox.json
use crate::config::types::{Result, ScriptboxError};
use crate::screening::PatternSet;
use crate::utils::output::OutputLimits;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file looked up in the current directory
pub const DEFAULT_CONFIG_FILE: &str = "scriptbox.json";

/// Hard wall-clock budget for one sandboxed run
pub const DEFAULT_TIMEOUT_SECS: u64 = 35;

const ENV_POLICY: &str = "SCRIPTBOX_POLICY";
const ENV_TIMEOUT_SECS: &str = "SCRIPTBOX_TIMEOUT_SECS";
const ENV_SANDBOX_BIN: &str = "SCRIPTBOX_SANDBOX_BIN";
const ENV_RUNTIME_BIN: &str = "SCRIPTBOX_RUNTIME_BIN";

/// Screening section of the configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ScreeningConfig {
    /// Replaces the built-in pattern list when present
    pub patterns: Option<Vec<String>>,
}

/// Process-wide, read-only pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PipelineConfig {
    /// External isolation tool (nsjail-compatible CLI)
    pub sandbox_binary: PathBuf,
    /// Isolation policy handed to the sandbox with `-C`
    pub policy_path: PathBuf,
    /// Language runtime executed inside the jail
    pub runtime_binary: PathBuf,
    /// Extra arguments placed before the `--` separator
    pub extra_sandbox_args: Vec<String>,
    /// Wall-clock timeout in seconds
    pub timeout_secs: u64,
    /// Parent directory for per-request workspaces
    pub workspace_root: PathBuf,
    pub output: OutputLimits,
    pub screening: ScreeningConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            sandbox_binary: PathBuf::from("nsjail"),
            policy_path: PathBuf::from("/app/nsjail.config.proto"),
            runtime_binary: PathBuf::from("/usr/local/bin/python3"),
            extra_sandbox_args: Vec::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            workspace_root: Self::runtime_root_dir(),
            output: OutputLimits::default(),
            screening: ScreeningConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Workspace root scoped by effective UID so root and non-root runs
    /// never share a directory under the system temp dir.
    pub fn runtime_root_dir() -> PathBuf {
        let euid = nix::unistd::geteuid();
        std::env::temp_dir().join(format!("scriptbox-uid-{}", euid))
    }

    /// Load configuration from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            ScriptboxError::Config(format!(
                "Failed to read config file {}: {}",
                path.display(),
                e
            ))
        })?;

        let config: PipelineConfig = serde_json::from_str(&content)
            .map_err(|e| ScriptboxError::Config(format!("Failed to parse config JSON: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Load ./scriptbox.json if present, otherwise built-in defaults.
    /// Environment overrides are applied in both cases.
    pub fn load_default() -> Result<Self> {
        let config_path = std::env::current_dir()
            .map_err(|e| ScriptboxError::Config(format!("Failed to get current directory: {}", e)))?
            .join(DEFAULT_CONFIG_FILE);

        let mut config = if config_path.exists() {
            log::info!("Loading pipeline config from {}", config_path.display());
            Self::load_from_file(&config_path)?
        } else {
            log::debug!("No {} found, using built-in defaults", DEFAULT_CONFIG_FILE);
            Self::default()
        };

        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Apply SCRIPTBOX_* environment variable overrides
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        self.apply_overrides_from(|key| std::env::var(key).ok())
    }

    fn apply_overrides_from<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(policy) = lookup(ENV_POLICY) {
            self.policy_path = PathBuf::from(policy);
        }
        if let Some(sandbox) = lookup(ENV_SANDBOX_BIN) {
            self.sandbox_binary = PathBuf::from(sandbox);
        }
        if let Some(runtime) = lookup(ENV_RUNTIME_BIN) {
            self.runtime_binary = PathBuf::from(runtime);
        }
        if let Some(raw) = lookup(ENV_TIMEOUT_SECS) {
            self.timeout_secs = raw.trim().parse().map_err(|_| {
                ScriptboxError::Config(format!("{} must be a positive integer, got '{}'", ENV_TIMEOUT_SECS, raw))
            })?;
        }
        self.validate()
    }

    /// Reject configurations the pipeline cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.timeout_secs == 0 {
            return Err(ScriptboxError::Config(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.sandbox_binary.as_os_str().is_empty() {
            return Err(ScriptboxError::Config("sandbox_binary must not be empty".to_string()));
        }
        if self.runtime_binary.as_os_str().is_empty() {
            return Err(ScriptboxError::Config("runtime_binary must not be empty".to_string()));
        }
        if self.output.stdout_limit == 0 || self.output.stderr_limit == 0 {
            return Err(ScriptboxError::Config(
                "output limits must be greater than zero".to_string(),
            ));
        }
        if let Some(patterns) = &self.screening.patterns {
            if patterns.iter().any(|p| p.trim().is_empty()) {
                return Err(ScriptboxError::Config(
                    "screening patterns must not be empty strings".to_string(),
                ));
            }
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Screening patterns in effect: configured override or the built-in list
    pub fn pattern_set(&self) -> PatternSet {
        match &self.screening.patterns {
            Some(patterns) => PatternSet::new(patterns.iter().map(String::as_str)),
            None => PatternSet::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults_match_service_layout() {
        let config = PipelineConfig::default();
        assert_eq!(config.sandbox_binary, PathBuf::from("nsjail"));
        assert_eq!(config.policy_path, PathBuf::from("/app/nsjail.config.proto"));
        assert_eq!(config.timeout(), Duration::from_secs(35));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptbox.json");
        std::fs::write(&path, r#"{"timeout_secs": 5, "policy_path": "/etc/jail.cfg"}"#).unwrap();

        let config = PipelineConfig::load_from_file(&path).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.policy_path, PathBuf::from("/etc/jail.cfg"));
        assert_eq!(config.runtime_binary, PathBuf::from("/usr/local/bin/python3"));
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptbox.json");
        std::fs::write(&path, r#"{"timeout_secs": 0}"#).unwrap();

        let err = PipelineConfig::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ScriptboxError::Config(_)));
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("scriptbox.json");
        std::fs::write(&path, "{not json").unwrap();

        match PipelineConfig::load_from_file(&path) {
            Err(ScriptboxError::Config(msg)) => assert!(msg.contains("parse")),
            other => panic!("expected Config error, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides() {
        let vars: HashMap<&str, &str> = [
            ("SCRIPTBOX_POLICY", "/srv/policy.cfg"),
            ("SCRIPTBOX_TIMEOUT_SECS", "7"),
            ("SCRIPTBOX_RUNTIME_BIN", "/usr/bin/python3"),
        ]
        .into_iter()
        .collect();

        let mut config = PipelineConfig::default();
        config
            .apply_overrides_from(|key| vars.get(key).map(|v| v.to_string()))
            .unwrap();

        assert_eq!(config.policy_path, PathBuf::from("/srv/policy.cfg"));
        assert_eq!(config.timeout_secs, 7);
        assert_eq!(config.runtime_binary, PathBuf::from("/usr/bin/python3"));
        assert_eq!(config.sandbox_binary, PathBuf::from("nsjail"));
    }

    #[test]
    fn test_bad_timeout_override_rejected() {
        let mut config = PipelineConfig::default();
        let result = config.apply_overrides_from(|key| {
            (key == "SCRIPTBOX_TIMEOUT_SECS").then(|| "soon".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_pattern_override() {
        let mut config = PipelineConfig::default();
        config.screening.patterns = Some(vec!["forbidden".to_string()]);
        let patterns = config.pattern_set();
        assert_eq!(patterns.len(), 1);
        assert!(PipelineConfig::default().pattern_set().len() > 1);
    }
}
