//! Execution pipeline core.
//!
//! Core owns request validation and the per-request control flow from
//! screening to cleanup. Launch details live in `exec`, outcome mapping in
//! `verdict`.

pub mod pipeline;
pub mod request;

pub use pipeline::Pipeline;
pub use request::ExecutionRequest;
