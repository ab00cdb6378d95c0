use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use std::panic;
use std::path::Path;

use tracing::*;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use kgwlib::source::HeaderSnapshot;
use kgwlib::util::Saveable;
use kgwlib::{CompactTarget, NetworkParameters};

/// Initialize tracing, logging to stderr or to daily
/// rotated files in `log_dir`
pub fn setup_tracing(log_dir: Option<&Path>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = log_dir.map(|dir| {
        let file_appender = RollingFileAppender::new(
            Rotation::DAILY,
            dir,
            "simulator.log",
        );
        fmt::layer().with_writer(file_appender).with_ansi(false)
    });
    let stderr_layer = match log_dir {
        Some(_) => None,
        None => Some(fmt::layer().with_writer(std::io::stderr)),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .with(stderr_layer)
        .try_init()
        .context("failed to install the tracing subscriber")?;

    Ok(())
}

/// Make sure tracing is able to log panics
pub fn setup_panic_hook() {
    panic::set_hook(Box::new(|panic_info| {
        let backtrace =
            std::backtrace::Backtrace::force_capture();
        error!("Application panicked!");
        error!("Panic info: {:?}", panic_info);
        error!("Backtrace: {:?}", backtrace);
    }));
}

/// Load and validate network parameters from a TOML file
pub fn load_params(path: &Path) -> Result<NetworkParameters> {
    info!("Loading network parameters from: {:?}", path);
    let content = std::fs::read_to_string(path).with_context(
        || format!("failed to read {}", path.display()),
    )?;
    let params: NetworkParameters = toml::from_str(&content)
        .with_context(|| {
            format!("failed to parse {}", path.display())
        })?;
    params.validate()?;

    Ok(params)
}

/// Write the built-in network parameters as TOML
pub fn generate_config(path: &Path) -> Result<()> {
    let config_str =
        toml::to_string_pretty(&NetworkParameters::vertcoin())?;
    std::fs::write(path, config_str)?;
    info!("Config generated at: {}", path.display());
    Ok(())
}

/// Write a snapshot of `count` evenly spaced headers
pub fn generate_history(
    path: &Path,
    tip: u64,
    count: u64,
    bits: CompactTarget,
    spacing: u64,
    tip_time: Option<i64>,
) -> Result<()> {
    let tip_time = match tip_time {
        Some(secs) => DateTime::from_timestamp(secs, 0)
            .context("tip time out of range")?,
        None => Utc::now(),
    };

    let snapshot =
        HeaderSnapshot::steady(tip, count, bits, spacing, tip_time)?;
    snapshot.save_to_file(path).with_context(|| {
        format!("failed to write {}", path.display())
    })?;
    info!(
        "History of {} headers ending at {} written to: {}",
        snapshot.len(),
        tip,
        path.display()
    );
    Ok(())
}
