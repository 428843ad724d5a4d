use crate::config::PipelineConfig;
use crate::core::{ExecutionRequest, Pipeline};
use crate::screening::ScreeningVerdict;
use crate::verdict::{ExecutionOutcome, ResponseClass};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

#[derive(Parser)]
#[command(author, version, about = "Run untrusted Python scripts inside an nsjail sandbox", long_about = None)]
struct Cli {
    /// Pipeline configuration file (defaults to ./scriptbox.json when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Append structured audit events to this file
    #[arg(long, global = true)]
    audit_log: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

/// Script source: a file, inline text, or stdin when neither is given
#[derive(Args)]
struct ScriptSource {
    /// Read the script from a file
    #[arg(long, conflicts_with = "code")]
    file: Option<PathBuf>,
    /// Script text
    #[arg(long)]
    code: Option<String>,
}

impl ScriptSource {
    fn read(&self) -> Result<String> {
        if let Some(code) = &self.code {
            return Ok(code.clone());
        }
        if let Some(path) = &self.file {
            return std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read script {}", path.display()));
        }
        let mut script = String::new();
        std::io::stdin()
            .read_to_string(&mut script)
            .context("Failed to read script from stdin")?;
        Ok(script)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Screen, run and interpret a script; prints the JSON response
    Execute {
        #[command(flatten)]
        source: ScriptSource,
        /// Print the full tagged outcome instead of the response body
        #[arg(long)]
        outcome: bool,
    },
    /// Run static screening only
    Screen {
        #[command(flatten)]
        source: ScriptSource,
    },
    /// Check that the sandbox tool, runtime and policy file are available
    CheckDeps {
        /// Show resolved paths and runtime version
        #[arg(long)]
        verbose: bool,
    },
    /// Remove workspaces left behind by crashed runs
    Sweep {
        /// Minimum age of a workspace before it is removed
        #[arg(long, default_value_t = 3600)]
        max_age_secs: u64,
    },
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig> {
    let config = match path {
        Some(path) => {
            let mut config = PipelineConfig::load_from_file(path)?;
            config.apply_env_overrides()?;
            config
        }
        None => PipelineConfig::load_default()?,
    };
    Ok(config)
}

fn exit_code_for(class: ResponseClass) -> i32 {
    match class {
        ResponseClass::Ok => 0,
        ResponseClass::ClientError => 1,
        ResponseClass::ServerError => 2,
    }
}

/// Run one request. A pipeline that cannot be set up is a server-side failure
/// of that request, not a CLI usage error.
fn run_request(config: PipelineConfig, request: &ExecutionRequest) -> ExecutionOutcome {
    match Pipeline::new(config) {
        Ok(pipeline) => pipeline.execute(request),
        Err(e) => {
            log::error!("Failed to initialize pipeline: {}", e);
            ExecutionOutcome::InfrastructureError {
                message: format!("Failed to initialize pipeline: {}", e),
            }
        }
    }
}

pub fn run() -> Result<()> {
    env_logger::init();

    if !cfg!(unix) {
        eprintln!("Error: scriptbox requires a Unix-like system");
        std::process::exit(2);
    }

    let cli = Cli::parse();

    if let Some(audit_path) = cli.audit_log.as_deref() {
        crate::observability::audit::init_audit_logger(audit_path)?;
    }

    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Execute { source, outcome } => {
            let script = source.read()?;
            let request = match ExecutionRequest::new(script) {
                Ok(request) => request,
                Err(e) => {
                    let body = serde_json::json!({ "error": e.to_string(), "stdout": "" });
                    println!("{}", serde_json::to_string_pretty(&body)?);
                    std::process::exit(exit_code_for(ResponseClass::ClientError));
                }
            };

            let result = run_request(config, &request);
            if outcome {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                println!("{}", serde_json::to_string_pretty(&result.to_response())?);
            }

            let code = exit_code_for(result.response_class());
            if code != 0 {
                std::process::exit(code);
            }
            Ok(())
        }
        Commands::Screen { source } => {
            let script = source.read()?;
            let screener = crate::screening::Screener::new(config.pattern_set());
            match screener.screen(&script) {
                ScreeningVerdict::Pass => {
                    println!("PASS");
                    Ok(())
                }
                ScreeningVerdict::Reject { pattern } => {
                    println!("REJECT: {}", pattern);
                    std::process::exit(1);
                }
            }
        }
        Commands::CheckDeps { verbose } => check_dependencies(&config, verbose),
        Commands::Sweep { max_age_secs } => {
            let workspaces = crate::safety::WorkspaceManager::new(config.workspace_root.clone())?;
            let removed = workspaces.sweep_stale(Duration::from_secs(max_age_secs))?;
            eprintln!(
                "Removed {} stale workspace(s) from {}",
                removed,
                workspaces.root().display()
            );
            Ok(())
        }
    }
}

/// Resolve a binary the way `Command` would: paths as-is, bare names via PATH
fn resolve_binary(binary: &Path) -> Option<PathBuf> {
    if binary.components().count() > 1 {
        return binary.is_file().then(|| binary.to_path_buf());
    }
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

fn runtime_version(runtime: &Path) -> Option<String> {
    let output = Command::new(runtime).arg("--version").output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = if output.stdout.is_empty() {
        String::from_utf8_lossy(&output.stderr).to_string()
    } else {
        String::from_utf8_lossy(&output.stdout).to_string()
    };
    text.lines().next().map(|line| line.trim().to_string())
}

fn check_dependencies(config: &PipelineConfig, verbose: bool) -> Result<()> {
    println!("Checking sandbox dependencies...");

    let mut missing = Vec::new();

    match resolve_binary(&config.sandbox_binary) {
        Some(path) => {
            println!("OK   sandbox tool");
            if verbose {
                println!("     {}", path.display());
            }
        }
        None => {
            println!("MISSING sandbox tool: {}", config.sandbox_binary.display());
            missing.push("sandbox tool");
        }
    }

    match resolve_binary(&config.runtime_binary) {
        Some(path) => {
            println!("OK   runtime");
            if verbose {
                let version = runtime_version(&path).unwrap_or_else(|| "unknown version".into());
                println!("     {} ({})", path.display(), version);
            }
        }
        None => {
            println!("MISSING runtime: {}", config.runtime_binary.display());
            missing.push("runtime");
        }
    }

    if config.policy_path.is_file() {
        println!("OK   policy");
        if verbose {
            println!("     {}", config.policy_path.display());
        }
    } else {
        println!("MISSING policy: {}", config.policy_path.display());
        missing.push("policy");
    }

    if missing.is_empty() {
        println!("All sandbox dependencies are available");
        Ok(())
    } else {
        println!("Missing: {}", missing.join(", "));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_execute_accepts_inline_code() {
        let cli = Cli::try_parse_from([
            "scriptbox",
            "--audit-log",
            "/tmp/audit.log",
            "execute",
            "--code",
            "def main():\n    return 1\n",
        ])
        .unwrap();
        assert_eq!(cli.audit_log, Some(PathBuf::from("/tmp/audit.log")));
        match cli.command {
            Commands::Execute { source, outcome } => {
                assert!(!outcome);
                assert!(source.read().unwrap().contains("return 1"));
            }
            _ => panic!("expected execute"),
        }
    }

    #[test]
    fn test_file_and_code_conflict() {
        assert!(Cli::try_parse_from([
            "scriptbox", "execute", "--file", "a.py", "--code", "x"
        ])
        .is_err());
    }

    #[test]
    fn test_exit_codes_follow_response_class() {
        assert_eq!(exit_code_for(ResponseClass::Ok), 0);
        assert_eq!(exit_code_for(ResponseClass::ClientError), 1);
        assert_eq!(exit_code_for(ResponseClass::ServerError), 2);
    }

    #[test]
    fn test_unusable_workspace_root_is_server_error() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-directory");
        std::fs::write(&blocker, b"").unwrap();
        let config = PipelineConfig {
            workspace_root: blocker.join("workspaces"),
            ..Default::default()
        };
        let request = ExecutionRequest::new("def main():\n    return 1\n").unwrap();

        let outcome = run_request(config, &request);
        assert!(matches!(outcome, ExecutionOutcome::InfrastructureError { .. }));
        assert_eq!(exit_code_for(outcome.response_class()), 2);
        assert!(outcome
            .error_message()
            .unwrap()
            .contains("Failed to initialize pipeline"));
    }

    #[test]
    fn test_resolve_binary_searches_path() {
        assert!(resolve_binary(Path::new("sh")).is_some());
        assert!(resolve_binary(Path::new("/nonexistent/scriptbox-tool")).is_none());
    }
}
