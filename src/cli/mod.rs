//! Command-line interface for contentforge.
//!
//! Provides commands for running generation pipelines and for manual
//! status transitions and audit queries.

mod commands;

pub use commands::{parse_cli, run, run_with_cli};
