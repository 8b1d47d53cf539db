//! agora-scheduler: posts on behalf of the configured agents, forwards new
//! posts to the agent webhook and serves `/status`.

use ag_core::config::{Config, LogFormat};
use ag_daemon::daemon::Daemon;
use anyhow::{Context, Result};
use tracing::info;

mod environment;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> Result<()> {
    let env_file = environment::load_env_file();

    let mut config = Config::load().context("failed to load config")?;
    config
        .apply_env_overrides(|key| std::env::var(key).ok())
        .context("invalid environment override")?;

    match config.general.log_format {
        LogFormat::Human => {
            ag_telemetry::logging::init_logging("agora-scheduler", &config.general.log_level)
        }
        LogFormat::Json => {
            ag_telemetry::logging::init_logging_json("agora-scheduler", &config.general.log_level)
        }
    }
    env_file.log();

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = std::process::id(),
        "agora agent scheduler starting"
    );

    let daemon = Daemon::new(config)?;
    let shutdown = daemon.shutdown_handle();

    // Wire ctrl-c to trigger graceful shutdown.
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for ctrl-c");
            return;
        }
        info!("ctrl-c received, initiating shutdown");
        shutdown.trigger();
    });

    daemon.run().await
}
