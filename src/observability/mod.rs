//! Observability: `tracing` subscriber setup and runtime verbosity changes.
//!
//! [`init`] installs a global subscriber whose level filter sits behind a
//! `reload` layer. [`set_log_level`] swaps that filter, which is how
//! `general.log-level` takes effect while the configuration is still being
//! read. When no subscriber was installed by this module (a host that set up
//! its own) [`set_log_level`] is a no-op.

mod logging;

pub use logging::{LOG_ENV, LogFormat, LogLevel, LoggingConfig};

use crate::{Error, Result};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, reload};

type FilterHandle = reload::Handle<EnvFilter, Registry>;
type FilteredRegistry = tracing_subscriber::layer::Layered<reload::Layer<EnvFilter, Registry>, Registry>;
type BoxedFmtLayer = Box<dyn Layer<FilteredRegistry> + Send + Sync>;

static FILTER_HANDLE: OnceLock<FilterHandle> = OnceLock::new();

/// Installs the global `tracing` subscriber.
///
/// # Errors
///
/// Returns an error if a global subscriber is already installed or the log
/// file cannot be opened.
pub fn init(config: &LoggingConfig) -> Result<()> {
    if FILTER_HANDLE.get().is_some() {
        return Err(Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: "logging already initialized".to_string(),
        });
    }

    let filter = config
        .directives
        .as_deref()
        .map_or_else(|| Ok(filter_for(config.level)), EnvFilter::try_new)
        .map_err(|e| Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: e.to_string(),
        })?;
    let (filter_layer, handle) = reload::Layer::new(filter);

    let fmt_layer: BoxedFmtLayer = match &config.file {
        Some(path) => {
            let writer = open_log_file(path)?;
            match config.format {
                LogFormat::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .with_current_span(true)
                    .with_target(true)
                    .boxed(),
                LogFormat::Pretty | LogFormat::Compact => tracing_subscriber::fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true)
                    .boxed(),
            }
        },
        None => stderr_layer(config.format),
    };

    tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| Error::OperationFailed {
            operation: "observability_init".to_string(),
            cause: e.to_string(),
        })?;

    FILTER_HANDLE.set(handle).map_err(|_| Error::OperationFailed {
        operation: "observability_init".to_string(),
        cause: "failed to record filter handle".to_string(),
    })
}

/// Changes the active verbosity.
///
/// Returns `true` if a subscriber installed by [`init`] was updated.
pub fn set_log_level(level: LogLevel) -> bool {
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    match handle.reload(filter_for(level)) {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(level = %level, error = %e, "Failed to change log level");
            false
        },
    }
}

fn filter_for(level: LogLevel) -> EnvFilter {
    EnvFilter::default().add_directive(level.level_filter().into())
}

fn stderr_layer(format: LogFormat) -> BoxedFmtLayer {
    match format {
        LogFormat::Json => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_current_span(true)
            .with_target(true)
            .boxed(),
        LogFormat::Compact => tracing_subscriber::fmt::layer()
            .compact()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
        LogFormat::Pretty => tracing_subscriber::fmt::layer()
            .pretty()
            .with_writer(io::stderr)
            .with_target(true)
            .boxed(),
    }
}

/// Thread-safe file writer for logging.
#[derive(Clone)]
struct LogFileWriter {
    file: Arc<Mutex<File>>,
}

impl Write for LogFileWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        let mut guard = self
            .file
            .lock()
            .map_err(|e| io::Error::other(e.to_string()))?;
        guard.flush()
    }
}

impl<'a> tracing_subscriber::fmt::MakeWriter<'a> for LogFileWriter {
    type Writer = Self;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Opens a log file for appending.
fn open_log_file(path: &Path) -> Result<LogFileWriter> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| Error::Io {
            operation: "create_log_dir".to_string(),
            cause: e.to_string(),
        })?;
    }

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| Error::Io {
            operation: "open_log_file".to_string(),
            cause: format!("{}: {}", path.display(), e),
        })?;

    Ok(LogFileWriter {
        file: Arc::new(Mutex::new(file)),
    })
}
