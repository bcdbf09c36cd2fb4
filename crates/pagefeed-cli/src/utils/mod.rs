//! Shared helpers for CLI commands.

pub mod context;
pub mod logging;
