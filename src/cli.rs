// Console front end
// Subcommands for the text and image forms, the health check and settings

use crate::api;
use anyhow::Context;
use clap::{Parser, Subcommand};

const ENV_HELP: &str = "Environment:
  TOXISCOPE_API_URL            overrides the detection service base URL
  TOXISCOPE_LOG_DIR            directory for session log files
  TOXISCOPE_DISABLE_FILE_LOG=1 log to stderr only";

#[derive(Parser, Debug)]
#[command(name = "toxiscope")]
#[command(about = "Submit text or images to the toxicity detection service")]
#[command(version, after_help = ENV_HELP)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Analyze a piece of text
    Text {
        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,

        /// Text to analyze. Everything after the first word is taken verbatim,
        /// including words that start with dashes.
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        content: Vec<String>,
    },

    /// Analyze the image at a URL
    Image {
        /// Skip fetching the image for preview
        #[arg(long)]
        no_preview: bool,

        /// Print the full outcome as JSON
        #[arg(long)]
        json: bool,

        /// Image URL
        url: Option<String>,
    },

    /// Check that the detection service is up
    Health,

    /// Show or update stored settings
    Config {
        /// Detection service base URL
        #[arg(long)]
        url: Option<String>,

        /// Detection threshold between 0 and 1
        #[arg(long)]
        threshold: Option<f64>,

        /// API key to store
        #[arg(long)]
        api_key: Option<String>,

        /// Remove the stored API key
        #[arg(long)]
        clear_api_key: bool,
    },
}

impl Commands {
    /// Text content exactly as it will be submitted
    pub fn text_content(&self) -> Option<String> {
        match self {
            Commands::Text { content, .. } => Some(content.join(" ")),
            _ => None,
        }
    }
}

fn print_outcome(outcome: &api::DetectionOutcome, as_json: bool) -> anyhow::Result<()> {
    if as_json {
        println!("{}", serde_json::to_string_pretty(outcome)?);
    } else {
        for line in &outcome.lines {
            println!("{}", line);
        }
    }
    Ok(())
}

/// Run one command. Returns whether it succeeded.
pub async fn dispatch(cli: Cli) -> anyhow::Result<bool> {
    let content = cli.command.text_content();

    match cli.command {
        Commands::Text { json, .. } => {
            let outcome = api::detect_text(content.unwrap_or_default())
                .await
                .map_err(anyhow::Error::msg)?;
            print_outcome(&outcome, json)?;
            Ok(outcome.succeeded())
        }
        Commands::Image { no_preview, json, url } => {
            let outcome = api::detect_image(url.unwrap_or_default(), !no_preview)
                .await
                .map_err(anyhow::Error::msg)?;
            print_outcome(&outcome, json)?;
            Ok(outcome.succeeded())
        }
        Commands::Health => {
            let url = api::get_service_url().map_err(anyhow::Error::msg)?;
            let health = api::service_health()
                .await
                .map_err(anyhow::Error::msg)
                .with_context(|| format!("health check against {} failed", url))?;
            println!("{} ({}) version {} at {}", health.status, url, health.version, health.timestamp);
            Ok(health.is_healthy())
        }
        Commands::Config { url, threshold, api_key, clear_api_key } => {
            if let Some(url) = url {
                api::set_service_url(url).map_err(anyhow::Error::msg)?;
            }
            if let Some(threshold) = threshold {
                api::set_detection_threshold(threshold).map_err(anyhow::Error::msg)?;
            }
            if let Some(key) = api_key {
                api::store_api_key(key).map_err(anyhow::Error::msg)?;
            }
            if clear_api_key {
                api::delete_api_key().map_err(anyhow::Error::msg)?;
            }

            let mut config = api::get_config().map_err(anyhow::Error::msg)?;
            if config.settings.api_key.is_some() {
                config.settings.api_key = Some("********".to_string());
            }
            println!("{}", serde_json::to_string_pretty(&config)?);
            println!("Effective service URL: {}", api::get_service_url().map_err(anyhow::Error::msg)?);
            Ok(true)
        }
    }
}
