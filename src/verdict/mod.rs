//! Result interpretation
//!
//! Maps launcher observations to request outcomes as pure functions.

pub mod interpreter;
pub mod outcome;

pub use interpreter::{interpret, OutcomeInterpreter};
pub use outcome::{ExecutionOutcome, ExecutionResponse, FailureStage, ResponseClass};
