/// Per-request ephemeral workspaces
///
/// Each request owns a uniquely named directory holding the user script and the
/// generated wrapper. The directory is removed exactly once: either by an
/// explicit [`Workspace::cleanup`] or when the handle is dropped, whichever
/// happens first.
use crate::config::types::{Result, ScriptboxError};
use crate::entrypoint::{python, SCRIPT_FILE, WRAPPER_FILE};
use crate::safety::safe_cleanup;
use std::fs::{self, DirBuilder};
use std::os::unix::fs::DirBuilderExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};
use uuid::Uuid;

/// Scoped workspace handle
#[derive(Debug)]
pub struct Workspace {
    run_id: String,
    run_dir: PathBuf,
    script_path: PathBuf,
    wrapper_path: PathBuf,
    removed: bool,
}

impl Workspace {
    /// Allocate a fresh directory under `root` and materialize the script and wrapper
    pub fn create(root: &Path, script: &str) -> Result<Self> {
        let run_id = Uuid::new_v4().to_string();
        let run_dir = root.join(&run_id);

        // create_dir (not create_dir_all) so an existing directory is never reused
        DirBuilder::new().mode(0o700).create(&run_dir).map_err(|e| {
            ScriptboxError::Workspace(format!(
                "Failed to create workspace directory {}: {}",
                run_dir.display(),
                e
            ))
        })?;

        // From here on the handle owns the directory; early returns drop it.
        let workspace = Self {
            script_path: run_dir.join(SCRIPT_FILE),
            wrapper_path: run_dir.join(WRAPPER_FILE),
            run_id,
            run_dir,
            removed: false,
        };

        write_file(&workspace.script_path, script.as_bytes())?;
        write_file(&workspace.wrapper_path, python::render_wrapper().as_bytes())?;

        log::debug!("Workspace {} ready at {}", workspace.run_id, workspace.run_dir.display());
        Ok(workspace)
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn run_dir(&self) -> &Path {
        &self.run_dir
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    pub fn wrapper_path(&self) -> &Path {
        &self.wrapper_path
    }

    pub fn is_removed(&self) -> bool {
        self.removed
    }

    /// Remove the workspace tree (idempotent)
    pub fn cleanup(&mut self) -> Result<()> {
        if self.removed {
            return Ok(());
        }
        // Marked first: a failed removal is reported once, not retried from Drop.
        self.removed = true;
        safe_cleanup::remove_tree_secure(&self.run_dir)
    }
}

impl Drop for Workspace {
    fn drop(&mut self) {
        if let Err(e) = self.cleanup() {
            log::warn!("Failed to remove workspace {}: {}", self.run_dir.display(), e);
        }
    }
}

fn write_file(path: &Path, content: &[u8]) -> Result<()> {
    fs::write(path, content).map_err(|e| {
        ScriptboxError::Workspace(format!("Failed to write {}: {}", path.display(), e))
    })
}

/// Owner of the workspace root directory
#[derive(Debug, Clone)]
pub struct WorkspaceManager {
    root: PathBuf,
}

impl WorkspaceManager {
    /// Create the manager, creating the root directory if needed
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root).map_err(|e| {
            ScriptboxError::Workspace(format!(
                "Failed to create workspace root {}: {}",
                root.display(),
                e
            ))
        })?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Build a new scoped workspace for one request
    pub fn build(&self, script: &str) -> Result<Workspace> {
        Workspace::create(&self.root, script)
    }

    /// Remove workspaces left behind by crashed processes.
    /// Returns the number of directories removed.
    pub fn sweep_stale(&self, max_age: Duration) -> Result<usize> {
        let now = SystemTime::now();
        let entries = fs::read_dir(&self.root).map_err(|e| {
            ScriptboxError::Workspace(format!(
                "Failed to read workspace root {}: {}",
                self.root.display(),
                e
            ))
        })?;

        let mut removed = 0;
        for entry in entries {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    log::warn!("Failed to read workspace entry: {}", e);
                    continue;
                }
            };

            let path = entry.path();
            let metadata = match fs::symlink_metadata(&path) {
                Ok(m) if m.is_dir() => m,
                Ok(_) => continue,
                Err(e) => {
                    log::warn!("Failed to stat {}: {}", path.display(), e);
                    continue;
                }
            };

            let is_stale = metadata
                .modified()
                .ok()
                .and_then(|modified| now.duration_since(modified).ok())
                .map(|age| age >= max_age)
                .unwrap_or(false);
            if !is_stale {
                continue;
            }

            match safe_cleanup::remove_tree_secure(&path) {
                Ok(()) => {
                    log::info!("Removed stale workspace {}", path.display());
                    removed += 1;
                }
                Err(e) => log::warn!("Failed to remove stale workspace {}: {}", path.display(), e),
            }
        }

        Ok(removed)
    }
}
