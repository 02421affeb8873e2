//! Logging setup.
//!
//! Console output goes through the global `tracing` subscriber installed by
//! [`init_tracing`]. The per-run log file is a separate, explicitly owned
//! [`RunLog`] handed to the error aggregator; it is flushed when dropped.

use chrono::{NaiveDate, Utc};
use std::io::{self, Write};
use std::path::Path;
use tracing::{Level, debug, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{EnvFilter, fmt as tfmt};

/// Install the console subscriber. Honors `RUST_LOG`, defaults to `info`.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();
}

/// Append-only log file scoped to a single run.
///
/// Lines look like `2024-03-01T07:04:09Z WARN ==> Too Many Requests`.
pub struct RunLog {
    writer: Box<dyn Write + Send>,
    guard: Option<WorkerGuard>,
}

impl RunLog {
    /// Open (or append to) `{dir}/{date}.log` through a non-blocking writer.
    ///
    /// # Errors
    ///
    /// Returns an error if `dir` or the log file cannot be created.
    pub fn open(dir: impl AsRef<Path>, date: NaiveDate) -> io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let file_name = format!("{}.log", date.format("%Y-%m-%d"));
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::NEVER)
            .filename_prefix(&file_name)
            .build(dir)
            .map_err(io::Error::other)?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        debug!(path = %dir.join(&file_name).display(), "Opened run log");
        Ok(Self {
            writer: Box::new(writer),
            guard: Some(guard),
        })
    }

    /// A run log that drops every line.
    pub fn discard() -> Self {
        Self::from_writer(io::sink())
    }

    /// Write lines to an arbitrary writer.
    pub fn from_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            writer: Box::new(writer),
            guard: None,
        }
    }

    /// Append one line at `level`.
    pub fn record(&mut self, level: Level, message: &str) {
        let stamp = Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        if let Err(e) = writeln!(self.writer, "{stamp} {level} ==> {message}") {
            warn!(error = %e, "Failed to write run log line");
        }
    }

    pub fn flush(&mut self) {
        if let Err(e) = self.writer.flush() {
            warn!(error = %e, "Failed to flush run log");
        }
    }
}

impl Drop for RunLog {
    fn drop(&mut self) {
        self.flush();
    }
}

impl std::fmt::Debug for RunLog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunLog")
            .field("file_backed", &self.guard.is_some())
            .finish()
    }
}
