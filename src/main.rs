mod api;
mod config;
mod console;
mod dispatcher;
mod error;
mod interpolator;
mod joint_feed;
mod log_fetcher;
mod render;
mod scheduler;
mod types;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, LevelFilter};
use simple_logger::SimpleLogger;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::BufReader;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let cli = config::Cli::parse();

    // Load configuration
    let config = config::load_config(&cli)?;

    let level = LevelFilter::from_str(&config.log_level).unwrap_or(LevelFilter::Info);
    SimpleLogger::new()
        .with_level(level)
        .env()
        .init()
        .context("Failed to initialise logger")?;

    info!("Starting robot-dashboard");
    info!("Configuration loaded from {:?}", cli.config);

    let date = cli.date.unwrap_or_else(|| chrono::Local::now().date_naive());
    let api = Arc::new(api::HttpApi::new(&config).context("Failed to build HTTP client")?);

    // Live joint feed is optional, the twin falls back to log data without it
    let (feed_handle, live_joints) = match config.joint_feed_addr.clone() {
        Some(addr) => {
            info!("Using live joint feed at {}", addr);
            let (feed, rx) = joint_feed::JointFeed::new(addr);
            (Some(tokio::spawn(feed.run())), Some(rx))
        }
        None => (None, None),
    };

    let console = console::Console::new(&config, date, api.clone(), api, live_joints);
    let result = console.run(BufReader::new(tokio::io::stdin())).await;

    if let Some(handle) = feed_handle {
        handle.abort();
    }

    result
}
