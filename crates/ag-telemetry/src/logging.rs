use tracing_subscriber::{fmt, EnvFilter};

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize logging with human-readable output.
///
/// `RUST_LOG` wins over `default_level` (e.g. "info" or
/// "ag_daemon=debug,info"). Subsequent calls are no-ops, so tests may call
/// it freely.
pub fn init_logging(service_name: &str, default_level: &str) {
    let installed = fmt()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_thread_ids(false)
        .with_line_number(true)
        .with_level(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = service_name, "logging initialised (human-readable)");
    }
}

/// Initialize logging with one JSON object per line, for log shippers.
///
/// Same precedence and idempotence rules as [`init_logging`].
pub fn init_logging_json(service_name: &str, default_level: &str) {
    let installed = fmt()
        .json()
        .with_env_filter(filter(default_level))
        .with_target(true)
        .with_current_span(true)
        .with_level(true)
        .try_init()
        .is_ok();

    if installed {
        tracing::info!(service = service_name, "logging initialised (json)");
    }
}
