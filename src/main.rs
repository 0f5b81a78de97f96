use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing_subscriber::EnvFilter;

use loglet::config;
use loglet::Logger;

/// Log every line of stdin at INFO, configured from an optional TOML file
fn main() -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("loglet=warn"));
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    let options = match std::env::args_os().nth(1).map(PathBuf::from) {
        Some(path) => config::load_options(&path)?,
        None => Default::default(),
    };
    let logger = Logger::from_options(&options);

    for line in std::io::stdin().lock().lines() {
        let line = line.context("Failed to read stdin")?;
        logger.info(line);
    }

    logger.close();
    Ok(())
}
