use std::str::FromStr;
use tracing::Level;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::filter::{filter_fn, LevelFilter, Targets};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::LoggingConfig;

pub const GENERAL_LOG: &str = "autoswap.log";
pub const ERROR_LOG: &str = "autoswap_error.log";
pub const SWAP_LOG: &str = "autoswap_swap.log";

/// Events logged with this target also land in the swap log.
pub const SWAP_TARGET: &str = "swap";

/// Keeps the background log writers alive. Buffered lines are flushed when
/// this is dropped, so hold it for the lifetime of the process.
#[must_use = "dropping the guards stops the file writers"]
pub struct LogGuards {
    _guards: [WorkerGuard; 3],
}

/// Console output plus three append-only files: everything from this crate,
/// errors only, and swap submissions.
pub fn init(config: &LoggingConfig) -> anyhow::Result<LogGuards> {
    std::fs::create_dir_all(&config.dir)?;
    let (general, general_guard) = file_writer(config, GENERAL_LOG)?;
    let (errors, errors_guard) = file_writer(config, ERROR_LOG)?;
    let (swaps, swaps_guard) = file_writer(config, SWAP_LOG)?;

    let own_events = Targets::new()
        .with_target(env!("CARGO_CRATE_NAME"), Level::INFO)
        .with_target(SWAP_TARGET, Level::INFO);

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(console_filter(&config.level)))
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(general)
                .with_filter(own_events),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(errors)
                .with_filter(LevelFilter::ERROR),
        )
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_target(false)
                .with_writer(swaps)
                .with_filter(filter_fn(|meta| meta.target() == SWAP_TARGET)),
        )
        .try_init()?;

    tracing::info!("Logging initialized, files in {}", config.dir.display());
    Ok(LogGuards {
        _guards: [general_guard, errors_guard, swaps_guard],
    })
}

/// Console-only logging for failures that happen before the config is known.
pub fn init_console(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_filter(console_filter(level)))
        .try_init();
}

fn console_filter(level: &str) -> EnvFilter {
    // A bare level gets quieter defaults for the HTTP stack; full directives are kept as-is.
    let normalized = level.trim();
    let directives = if normalized.contains(',') || normalized.contains('=') {
        normalized.to_string()
    } else {
        format!("{normalized},hyper=info,reqwest=info,ethers_providers=warn")
    };
    EnvFilter::from_str(&directives).unwrap_or_else(|_| EnvFilter::new("info"))
}

/// A single never-rotated file, appended to, written from a background thread.
fn file_writer(config: &LoggingConfig, name: &str) -> anyhow::Result<(NonBlocking, WorkerGuard)> {
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::NEVER)
        .filename_prefix(name)
        .build(&config.dir)?;
    Ok(tracing_appender::non_blocking(appender))
}
