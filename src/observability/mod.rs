//! Observability
//!
//! Structured audit events for executed, rejected and failed scripts.

pub mod audit;
