//! HTTP facade for the student dropout prediction service

pub mod api;
pub mod config;
pub mod error;
pub mod validation;
