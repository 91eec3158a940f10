use crate::error::DashboardError;
use crate::interpolator::JOINT_NAMES;
use crate::types::SortOrder;
use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::Parser;
use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::time::Duration;

/// Substrings left in the endpoint URLs by the deployment template.
const PLACEHOLDER_MARKERS: [&str; 2] = ["your-api-id", "execute-api.region.amazonaws.com"];

#[derive(Parser, Debug)]
#[clap(name = "robot-dashboard", version, about)]
pub struct Cli {
    /// Path to configuration file
    #[clap(long, default_value = "./config.toml")]
    pub config: PathBuf,

    /// Override log retrieval endpoint URL
    #[clap(long)]
    pub log_api_url: Option<String>,

    /// Override command endpoint URL
    #[clap(long)]
    pub command_api_url: Option<String>,

    /// Initial date to show (YYYY-MM-DD), defaults to today
    #[clap(long)]
    pub date: Option<NaiveDate>,

    /// Start with auto-refresh disabled
    #[clap(long)]
    pub no_auto_refresh: bool,

    /// Override live joint feed address (host:port)
    #[clap(long)]
    pub joint_feed_addr: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub log_api_url: String,
    pub command_api_url: String,
    #[serde(default = "default_fetch_limit")]
    pub fetch_limit: u32,
    #[serde(default)]
    pub order: Option<SortOrder>,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Upper bound for a single fetch or command round trip
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub auto_refresh: bool,
    #[serde(default = "default_frame_rate")]
    pub frame_rate_hz: u32,
    #[serde(default)]
    pub joint_feed_addr: Option<String>,
    /// Attachment points present in the twin's scene file
    #[serde(default = "default_attachments")]
    pub twin_attachments: Vec<String>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_fetch_limit() -> u32 {
    50
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_request_timeout() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_frame_rate() -> u32 {
    30
}

fn default_attachments() -> Vec<String> {
    JOINT_NAMES.iter().map(|n| n.to_string()).collect()
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn frame_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / f64::from(self.frame_rate_hz.max(1)))
    }

    /// The read endpoint, or a configuration error if it was never filled in.
    pub fn log_endpoint(&self) -> Result<&str, DashboardError> {
        checked_endpoint(&self.log_api_url)
            .ok_or(DashboardError::NotConfigured("Log", "log_api_url"))
    }

    /// The command endpoint, or a configuration error if it was never filled in.
    pub fn command_endpoint(&self) -> Result<&str, DashboardError> {
        checked_endpoint(&self.command_api_url)
            .ok_or(DashboardError::NotConfigured("Command", "command_api_url"))
    }
}

fn checked_endpoint(url: &str) -> Option<&str> {
    let url = url.trim();
    if url.is_empty() || PLACEHOLDER_MARKERS.iter().any(|m| url.contains(m)) {
        None
    } else {
        Some(url)
    }
}

pub fn load_config(cli: &Cli) -> Result<Config> {
    let config_content = fs::read_to_string(&cli.config)
        .with_context(|| format!("Failed to read config file: {:?}", cli.config))?;

    let mut config = parse_config(&config_content)?;
    apply_overrides(&mut config, cli);
    Ok(config)
}

fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).context("Failed to parse config file")
}

fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(ref url) = cli.log_api_url {
        config.log_api_url = url.clone();
    }

    if let Some(ref url) = cli.command_api_url {
        config.command_api_url = url.clone();
    }

    if cli.no_auto_refresh {
        config.auto_refresh = false;
    }

    if let Some(ref addr) = cli.joint_feed_addr {
        config.joint_feed_addr = Some(addr.clone());
    }
}
