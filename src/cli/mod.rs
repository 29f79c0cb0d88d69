//! CLI command handlers

pub mod commands;

pub use commands::{execute_job, headers, merge, run, select, sheets};
