//! Command implementations for the CLI.
//!
//! Each command is implemented in its own module.

pub mod build;
pub mod config;
pub mod dev;
