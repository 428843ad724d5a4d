//! Utilities
//!
//! Bounded output collection for child process streams.

pub mod output;
