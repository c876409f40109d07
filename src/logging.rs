//! Console output on stderr plus an optional daily-rolling log file.
//!
//! stdout belongs to the binary's JSON summary, so nothing here writes to it.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const LOG_FILE_PREFIX: &str = "danci-srs.log";
const FALLBACK_DIRECTIVES: &str = "info";

/// Flushes the file writer on drop. Hold it until the process exits.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

fn env_filter(directives: &str) -> EnvFilter {
    EnvFilter::try_new(directives).unwrap_or_else(|err| {
        eprintln!("invalid log filter {directives:?} ({err}), using {FALLBACK_DIRECTIVES}");
        EnvFilter::new(FALLBACK_DIRECTIVES)
    })
}

fn rolling_writer(dir: &Path) -> std::io::Result<(NonBlocking, WorkerGuard)> {
    std::fs::create_dir_all(dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    Ok(tracing_appender::non_blocking(appender))
}

/// Installs the global subscriber. `file_dir` turns on the file layer; if the
/// directory cannot be created the console layer still comes up.
pub fn init_tracing(directives: &str, file_dir: Option<&Path>) -> Option<FileLogGuard> {
    let writer = file_dir.and_then(|dir| match rolling_writer(dir) {
        Ok(writer) => Some(writer),
        Err(err) => {
            eprintln!("file logging disabled, cannot use {}: {err}", dir.display());
            None
        }
    });
    let (file_layer, guard) = match writer {
        Some((writer, guard)) => (
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true),
            ),
            Some(FileLogGuard { _guard: guard }),
        ),
        None => (None, None),
    };

    let installed = tracing_subscriber::registry()
        .with(env_filter(directives))
        .with(fmt::layer().with_target(true).with_writer(std::io::stderr))
        .with(file_layer)
        .try_init();
    if let Err(err) = installed {
        eprintln!("tracing subscriber already installed: {err}");
    }

    guard
}
