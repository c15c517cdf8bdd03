//! Subcommand implementations.

pub mod query;
pub mod run;
pub mod stats;
