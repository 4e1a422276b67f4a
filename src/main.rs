mod ai;
mod app;
mod config;
mod control;
mod domain;
mod engine;
mod error;
mod infrastructure;
mod page;

use std::process;

use anyhow::Result;
use infrastructure::{directories, logging, shutdown};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = config::load_config()?;
    let paths = directories::ensure_directories(&config.directories)?;
    logging::init_tracing(&config, &paths)?;

    let (shutdown, _) = shutdown::Shutdown::new();
    shutdown::install_signal_handlers(shutdown.clone());

    let app = app::EngageBotApp::initialize(config, paths, shutdown).await?;
    let result = app.run().await;

    // A blocked stdin read would otherwise keep the runtime alive.
    process::exit(if result.is_ok() { 0 } else { 1 })
}
