//! Cache maintenance MCP tools.

pub mod stats;
pub mod sweep;

pub use stats::stats_impl;
pub use sweep::sweep_impl;
