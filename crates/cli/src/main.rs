//! Student Dropout Prediction CLI
//!
//! A command-line tool for checking the prediction service and scoring
//! student records from JSON files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use dropout_cli::{
    client::ApiClient,
    commands::{configure, health, predict},
    config::Config,
    output::{print_error, OutputFormat},
};
use std::path::PathBuf;

/// Student Dropout Prediction CLI
#[derive(Parser)]
#[command(name = "dropctl")]
#[command(author, version, about = "CLI for the Student Dropout Prediction service", long_about = None)]
pub struct Cli {
    /// Prediction service URL [default: http://localhost:5001]
    #[arg(long, env = "DROPCTL_API_URL")]
    pub api_url: Option<String>,

    /// Output format [default: table]
    #[arg(long, short, value_enum)]
    pub format: Option<OutputFormat>,

    /// Config file path [default: ~/.config/dropctl/config.json]
    #[arg(long, env = "DROPCTL_CONFIG")]
    pub config_file: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check service and model health
    Health,

    /// Show model schema and feature descriptions
    ModelInfo,

    /// Predict dropout risk for one student record
    Predict {
        /// JSON file holding one student record
        file: PathBuf,
    },

    /// Predict dropout risk for up to 100 student records
    Batch {
        /// JSON file holding an array of records or {"predictions": [...]}
        file: PathBuf,
    },

    /// Show or update stored CLI settings
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Print the stored settings
    Show,

    /// Store default settings
    Set {
        /// Prediction service URL
        #[arg(long)]
        api_url: Option<String>,

        /// Default output format
        #[arg(long, value_enum)]
        format: Option<OutputFormat>,
    },
}

async fn run(cli: Cli) -> Result<()> {
    let config_path = match cli.config_file {
        Some(path) => path,
        None => Config::config_path()?,
    };

    if let Commands::Config(config_cmd) = &cli.command {
        return match config_cmd {
            ConfigCommands::Show => configure::show(&config_path),
            ConfigCommands::Set { api_url, format } => {
                configure::set(&config_path, api_url.clone(), *format)
            }
        };
    }

    let config = Config::load_from(&config_path)?;
    let format = cli
        .format
        .or_else(|| config.default_format.as_deref().and_then(OutputFormat::parse))
        .unwrap_or_default();
    let client = ApiClient::new(&config.resolve_api_url(cli.api_url.as_deref()))?;

    match cli.command {
        Commands::Health => health::show_health(&client, format).await,
        Commands::ModelInfo => health::show_model_info(&client, format).await,
        Commands::Predict { file } => predict::predict(&client, &file, format).await,
        Commands::Batch { file } => predict::batch(&client, &file, format).await,
        Commands::Config(_) => Ok(()),
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run(Cli::parse()).await {
        print_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
