use std::path::Path;

use tracing::{debug, info, warn};

/// File consulted when `AGORA_ENV_FILE` is not set.
const DEFAULT_ENV_FILE: &str = ".env";

/// Load `KEY=value` pairs from the env file into the process environment.
///
/// Variables already set win over the file. A missing file is not an error.
/// Runs before logging is initialised, so the outcome is returned for the
/// caller to log once a subscriber exists.
pub fn load_env_file() -> EnvFileOutcome {
    let path = std::env::var("AGORA_ENV_FILE").unwrap_or_else(|_| DEFAULT_ENV_FILE.to_string());
    if !Path::new(&path).exists() {
        return EnvFileOutcome::Missing(path);
    }
    match dotenv::from_filename(&path) {
        Ok(_) => EnvFileOutcome::Loaded(path),
        Err(e) => EnvFileOutcome::Failed(path, e.to_string()),
    }
}

#[derive(Debug)]
pub enum EnvFileOutcome {
    Loaded(String),
    Missing(String),
    Failed(String, String),
}

impl EnvFileOutcome {
    pub fn log(&self) {
        match self {
            EnvFileOutcome::Loaded(path) => info!(path = %path, "loaded environment file"),
            EnvFileOutcome::Missing(path) => debug!(path = %path, "no environment file"),
            EnvFileOutcome::Failed(path, e) => {
                warn!(path = %path, error = %e, "failed to parse environment file")
            }
        }
    }
}
