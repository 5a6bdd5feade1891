//! Subcommand implementations

pub mod configure;
pub mod health;
pub mod predict;
