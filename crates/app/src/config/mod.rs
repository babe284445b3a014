use std::time::Duration;

use chrono::{NaiveDate, Utc};
use chrono_tz::Tz;
use clap::{Parser, Subcommand};
use serde::Deserialize;

use crate::error::{AppError, Result};

const DEFAULT_CONFIG_PATH: &str = "config/blindcount.toml";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub base_url: String,
    pub timezone: String,
    pub timeout_secs: u64,
    pub level: String,
    pub state_path: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:5000".to_string(),
            timezone: "America/Guayaquil".to_string(),
            timeout_secs: 15,
            level: "info".to_string(),
            state_path: "config/blindcount_state.json".to_string(),
        }
    }
}

impl AppConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> Result<NaiveDate> {
        let tz: Tz = self
            .timezone
            .parse()
            .map_err(|err| AppError::input(format!("invalid timezone {}: {err}", self.timezone)))?;
        Ok(Utc::now().with_timezone(&tz).date_naive())
    }
}

#[derive(Debug, Parser)]
#[command(name = "blindcount", about = "Blind two-pass inventory counting")]
pub struct Args {
    /// Optional config file path (TOML).
    #[arg(long, global = true)]
    config: Option<String>,
    /// Override backend base URL (e.g. http://127.0.0.1:5000).
    #[arg(long, global = true)]
    base_url: Option<String>,
    /// Override timezone (IANA name).
    #[arg(long, global = true)]
    timezone: Option<String>,
    /// Override the log level.
    #[arg(long, global = true)]
    level: Option<String>,
    #[command(subcommand)]
    pub command: Command,
}

/// Which session to open. Both default to the last selection.
#[derive(Debug, Clone, Default, clap::Args)]
pub struct Selection {
    /// Count date, YYYY-MM-DD.
    #[arg(long)]
    pub date: Option<NaiveDate>,
    /// Warehouse id.
    #[arg(long)]
    pub warehouse: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// List the warehouses known to the backend.
    Warehouses,
    /// Check that the backend answers.
    Health,
    /// Print a session without editing it.
    Show(Selection),
    /// Open a session in the interactive counting shell.
    Count(Selection),
}

pub fn load() -> Result<(AppConfig, Command)> {
    let args = Args::parse();

    let config_path = args.config.as_deref().unwrap_or(DEFAULT_CONFIG_PATH);
    let mut builder = config::Config::builder();
    builder = builder.add_source(config::File::with_name(config_path).required(false));
    builder = builder.add_source(config::Environment::with_prefix("BLINDCOUNT"));
    let mut settings: AppConfig = builder.build()?.try_deserialize()?;

    if let Some(base_url) = args.base_url {
        settings.base_url = base_url;
    }
    if let Some(timezone) = args.timezone {
        settings.timezone = timezone;
    }
    if let Some(level) = args.level {
        settings.level = level;
    }

    Ok((settings, args.command))
}
