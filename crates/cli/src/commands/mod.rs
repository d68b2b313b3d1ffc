//! CLI subcommands.

pub mod installations;
pub mod migrate;
