//! CLI subcommand implementations.

pub mod history;
pub mod report;
pub mod serve;
pub mod sync;
pub mod trades;
