//! Gale bot entry point.

use anyhow::Result;
use clap::Parser;
use tracing::info;

/// Signal-driven binary-option martingale bot
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Configuration file path (can also be set via GALE_CONFIG env var)
    #[arg(short, long)]
    config: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Must run before any wss:// connection
    gale_channel::init_crypto();

    let args = Args::parse();

    gale_telemetry::init_logging()?;

    info!("Starting gale bot v{}", env!("CARGO_PKG_VERSION"));

    // CLI arg > GALE_CONFIG env var > default
    let config_path = args
        .config
        .or_else(|| std::env::var("GALE_CONFIG").ok())
        .unwrap_or_else(|| "config/default.toml".to_string());

    info!(config_path = %config_path, "Loading configuration");

    let config = gale_bot::AppConfig::from_file(&config_path)?;
    info!(
        venue = config.broker.venue_name(),
        accounts = config.accounts.len(),
        relay = %config.channel.url,
        "Configuration loaded"
    );

    let app = gale_bot::Application::new(config)?;
    app.run().await?;

    Ok(())
}
