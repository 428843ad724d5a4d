//! Configuration
//!
//! Read-only pipeline configuration and the shared error/result types.

pub mod pipeline;
pub mod types;

pub use pipeline::{PipelineConfig, ScreeningConfig};
