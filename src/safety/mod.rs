//! Safety and cleanup
//!
//! Per-request workspaces and symlink-safe removal of their trees.

pub mod safe_cleanup;
pub mod workspace;

pub use workspace::{Workspace, WorkspaceManager};
