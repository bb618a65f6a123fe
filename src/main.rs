//! crud-relay server binary.
//!
//! Starts the listener thread and keeps the process alive for it.

use crud_relay::config::Config;
use crud_relay::lifecycle::{start_server_with, StartOutcome};
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = Config::load()?;

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!(
        listen = %config.listen,
        backlog = config.backlog,
        max_line_length = config.max_line_length,
        read_timeout = ?config.read_timeout,
        "Starting crud-relay server"
    );

    let handle = match start_server_with(config) {
        StartOutcome::Started(handle) => handle,
        StartOutcome::AlreadyStarted => return Ok(()),
        StartOutcome::SpawnFailed => return Err("failed to start listener thread".into()),
    };

    if handle.local_addr(Duration::from_secs(5)).is_none() {
        error!("Listener did not come up");
        return Err("listener setup failed".into());
    }

    // The listener lives as long as the process.
    loop {
        std::thread::park();
    }
}
