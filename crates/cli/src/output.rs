//! Output formatting utilities

use clap::ValueEnum;
use colored::Colorize;
use serde::Serialize;

/// Output format for CLI commands
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Table format (default)
    #[default]
    Table,
    /// JSON format
    Json,
}

impl OutputFormat {
    /// Parse a format name from the config file
    pub fn parse(name: &str) -> Option<Self> {
        <Self as ValueEnum>::from_str(name, true).ok()
    }
}

/// Print a value as pretty JSON
pub fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message);
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message);
}

pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message);
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Format a probability as a percentage
pub fn format_probability(p: f64) -> String {
    format!("{:.1}%", p * 100.0)
}

/// Color a risk tier
pub fn color_risk(risk_level: &str) -> String {
    match risk_level {
        "High Risk" => risk_level.red().bold().to_string(),
        "Medium Risk" => risk_level.yellow().to_string(),
        "Low Risk" => risk_level.green().to_string(),
        _ => risk_level.to_string(),
    }
}

/// Color a service or model status
pub fn color_status(status: &str) -> String {
    match status.to_lowercase().as_str() {
        "ok" | "loaded" | "healthy" => status.green().to_string(),
        "degraded" => status.yellow().to_string(),
        "error" | "not_loaded" | "unhealthy" => status.red().to_string(),
        _ => status.to_string(),
    }
}

/// Color confidence based on value
pub fn color_confidence(confidence: f64) -> String {
    let formatted = format_probability(confidence);
    if confidence > 0.7 {
        formatted.green().to_string()
    } else if confidence >= 0.55 {
        formatted.yellow().to_string()
    } else {
        formatted.red().to_string()
    }
}
