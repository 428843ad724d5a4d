//! scriptbox: screened, sandboxed execution of untrusted Python scripts
//! Scripts are pre-filtered, run through an external nsjail-compatible tool
//! under a hard wall-clock deadline, and reduced to a normalized JSON outcome.
//!
//! # Architecture
//!
//! A request flows through five stages:
//!
//! ## Screening ([`screening`])
//! - [`screening::patterns`]: Ordered disallowed-substring list
//! - [`screening::screener`]: Case-folded first-match screening
//!
//! ## Workspaces & Cleanup ([`safety`])
//! - [`safety::workspace`]: Per-request 0700 directories, removed on every path
//! - [`safety::safe_cleanup`]: Symlink-safe recursive removal
//!
//! ## Entry Point ([`entrypoint`])
//! - [`entrypoint::python`]: Generated wrapper enforcing the `main()` contract
//!
//! ## Launch ([`exec`])
//! - [`exec::invocation`]: Sandbox argument vector and environment
//! - [`exec::nsjail`]: Blocking launch with deadline and bounded capture
//! - [`exec::terminate`]: Process-group SIGTERM/SIGKILL escalation
//!
//! ## Outcome ([`verdict`])
//! - [`verdict::interpreter`]: Pure mapping from launch result to outcome
//! - [`verdict::outcome`]: Outcome variants and response payloads
//!
//! The [`crate::core::Pipeline`] ties the stages together; [`observability::audit`]
//! records each stage and [`config`] holds the read-only process-wide settings.
//!
//! Script failures are outcomes, never `Err`. Only request validation and
//! configuration loading fail through [`Result`].

// Request pipeline
pub mod core;

// Static screening
pub mod screening;

// Workspaces & cleanup
pub mod safety;

// Generated entry-point wrapper
pub mod entrypoint;

// Sandbox launch
pub mod exec;

// Outcome interpretation
pub mod verdict;

// Audit trail
pub mod observability;

// Configuration
pub mod config;

// Utilities
pub mod utils;

// CLI entrypoint wiring for the scriptbox binary
pub mod cli;

pub use config::types::{Result, ScriptboxError};
pub use config::PipelineConfig;
pub use crate::core::{ExecutionRequest, Pipeline};
pub use verdict::{ExecutionOutcome, ResponseClass};
