//! CLI library components for the configuration store tool.

pub mod cli;
pub mod commands;
pub mod logging;
