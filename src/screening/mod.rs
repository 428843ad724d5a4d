//! Static screening
//!
//! Coarse substring pre-filter applied before any process is launched.

pub mod patterns;
pub mod screener;

pub use patterns::{PatternSet, DEFAULT_PATTERNS};
pub use screener::{screen, Screener, ScreeningVerdict};
