//! Client library behind the `dropctl` command-line tool

pub mod client;
pub mod commands;
pub mod config;
pub mod output;
