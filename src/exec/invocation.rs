/// Sandbox invocation: argument vector, working directory, policy and deadline
use crate::config::PipelineConfig;
use crate::entrypoint::python;
use crate::safety::Workspace;
use std::path::PathBuf;
use std::time::Duration;

/// Fixed PATH handed to the sandbox tool; everything else is cleared
pub const SANDBOX_PATH_ENV: &str = "/usr/local/bin:/usr/bin:/bin";

/// One external sandbox call. Transient: lives for a single launch.
#[derive(Debug, Clone, PartialEq)]
pub struct SandboxInvocation {
    /// Isolation tool binary
    pub program: PathBuf,
    /// Arguments after the program name
    pub args: Vec<String>,
    /// Working directory (the request workspace)
    pub workdir: PathBuf,
    /// Isolation policy reference
    pub policy_path: PathBuf,
    /// Wall-clock budget
    pub timeout: Duration,
    /// Environment for the sandbox tool
    pub environment: Vec<(String, String)>,
}

impl SandboxInvocation {
    /// Build the nsjail-style call for a workspace:
    /// `<tool> -C <policy> --cwd <workspace> [extra] -- <runtime> -B <workspace>/wrapper.py`
    pub fn for_workspace(config: &PipelineConfig, workspace: &Workspace) -> Self {
        let workdir = workspace.run_dir().to_path_buf();

        let mut args = vec![
            "-C".to_string(),
            config.policy_path.to_string_lossy().to_string(),
            "--cwd".to_string(),
            workdir.to_string_lossy().to_string(),
        ];
        args.extend(config.extra_sandbox_args.iter().cloned());
        args.push("--".to_string());
        args.extend(python::run_command(
            &config.runtime_binary,
            workspace.wrapper_path(),
        ));

        Self {
            program: config.sandbox_binary.clone(),
            args,
            workdir,
            policy_path: config.policy_path.clone(),
            timeout: config.timeout(),
            environment: vec![("PATH".to_string(), SANDBOX_PATH_ENV.to_string())],
        }
    }

    /// Full argument vector including the program
    pub fn argv(&self) -> Vec<String> {
        std::iter::once(self.program.to_string_lossy().to_string())
            .chain(self.args.iter().cloned())
            .collect()
    }

    /// Command run inside the jail (everything after `--`)
    pub fn jailed_command(&self) -> &[String] {
        match self.args.iter().position(|a| a == "--") {
            Some(idx) => &self.args[idx + 1..],
            None => &[],
        }
    }
}
