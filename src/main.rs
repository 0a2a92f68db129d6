use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use clap_serde_derive::ClapSerde;
use tokio::net::TcpListener;
use tracing::{error, info};

use transcribe_runner::config::{Config, DEFAULT_CONFIG_FILE};
use transcribe_runner::routes::router;
use transcribe_runner::state::AppState;
use transcribe_runner::telemetry::{init_telemetry, shutdown_telemetry};

#[cfg(unix)]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, env, default_value = DEFAULT_CONFIG_FILE)]
    config_file: String,

    /// Configuration options
    #[command(flatten)]
    pub opt_config: <Config as ClapSerde>::Opt,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = match Config::from_toml(&args.config_file) {
        Ok(conf) => conf.merge(args.opt_config),
        Err(_) if args.config_file == DEFAULT_CONFIG_FILE => Config::default().merge(args.opt_config),
        Err(err) => {
            return Err(err.context(format!(
                "Failed to read configuration file {}",
                args.config_file
            )))
        }
    };

    init_telemetry(&config.log_level, config.otlp_endpoint(), config.log_console)?;

    let state = AppState::from_config(config.clone()).context("Invalid configuration")?;
    state
        .dispatcher
        .spawn_reaper(config.job_retention(), Duration::from_secs(60));

    let listener = TcpListener::bind(format!("{}:{}", config.address, config.port)).await?;
    info!("Listening on {}", listener.local_addr()?);
    info!(
        "Serving endpoint {} with {} worker(s)",
        config.endpoint_id, config.processing_threads
    );

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if config.otlp_endpoint().is_some() {
        shutdown_telemetry();
    }
    Ok(())
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutting down..."),
        Err(e) => error!("Failed to listen for shutdown signal: {}", e),
    }
}
