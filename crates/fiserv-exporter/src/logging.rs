//! Subscriber setup: JSON lines to a log file, plus a readable stderr layer
//! when a terminal is wanted.

use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;

use anyhow::Context;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::Environment;

/// File the JSON log is appended to.
pub const LOG_FILE: &str = "combined.log";

const CONSOLE_LEVEL: &str = "debug";

/// Whether the stderr layer is installed.
pub fn console_enabled(env: Environment, enable_tty: bool) -> bool {
    enable_tty || env == Environment::Development
}

fn filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Install the global subscriber. `RUST_LOG` overrides both levels.
pub fn init(log_file: &Path, level: &str, console: bool) -> anyhow::Result<()> {
    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file)
        .with_context(|| format!("failed to open log file {}", log_file.display()))?;

    let file_layer = fmt::layer()
        .json()
        .with_writer(Mutex::new(file))
        .with_filter(filter(level));

    let console_layer = console.then(|| {
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_filter(filter(CONSOLE_LEVEL))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("failed to install tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn console_follows_environment_or_flag() {
        assert!(console_enabled(Environment::Development, false));
        assert!(console_enabled(Environment::Production, true));
        assert!(!console_enabled(Environment::Production, false));
        assert!(!console_enabled(Environment::Test, false));
    }

    #[test]
    fn init_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(LOG_FILE);
        init(&path, "info", false).unwrap();
        tracing::info!("hello from the test");
        assert!(path.exists());
    }
}
