//! Persisted CLI settings

use anyhow::Result;
use std::path::Path;

use crate::config::Config;
use crate::output::{print_info, print_json, print_success, OutputFormat};

/// Print the stored settings
pub fn show(path: &Path) -> Result<()> {
    let config = Config::load_from(path)?;
    print_info(&format!("Config file: {}", path.display()));
    print_json(&config)
}

/// Update the stored settings; unset arguments keep their current value
pub fn set(path: &Path, api_url: Option<String>, format: Option<OutputFormat>) -> Result<()> {
    let mut config = Config::load_from(path)?;

    if let Some(url) = api_url {
        url::Url::parse(&url).map_err(|e| anyhow::anyhow!("Invalid API URL {url}: {e}"))?;
        config.api_url = Some(url);
    }
    if let Some(format) = format {
        let name = match format {
            OutputFormat::Table => "table",
            OutputFormat::Json => "json",
        };
        config.default_format = Some(name.to_string());
    }

    config.save_to(path)?;
    print_success(&format!("Saved {}", path.display()));
    Ok(())
}
