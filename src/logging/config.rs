use super::{LogLevel, SecretMasker};
use clap::ValueEnum;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("Invalid log level '{input}'. Valid levels: debug, info, warn, error, critical")]
    InvalidLevel { input: String },

    #[error("Invalid log format '{input}'. Valid formats: text, json")]
    InvalidFormat { input: String },

    #[error("Tracing initialization failed: {details}")]
    TracingInitFailed { details: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// `<time> <LEVEL> <message> key=value ...`
    #[default]
    Text,
    /// One JSON object per line with `time`, `level`, `msg` and attributes.
    Json,
}

impl FromStr for LogFormat {
    type Err = LoggingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(LoggingError::InvalidFormat {
                input: s.to_string(),
            }),
        }
    }
}

/// Shared byte stream that log records are written to.
///
/// Clones share the same underlying writer, and every record is written as a
/// single `write_all` under the lock so concurrent emitters never interleave.
#[derive(Clone)]
pub struct LogSink {
    writer: Arc<Mutex<Box<dyn Write + Send>>>,
}

impl LogSink {
    pub fn stderr() -> Self {
        Self::from_writer(io::stderr())
    }

    pub fn stdout() -> Self {
        Self::from_writer(io::stdout())
    }

    pub fn from_writer<W: Write + Send + 'static>(writer: W) -> Self {
        Self {
            writer: Arc::new(Mutex::new(Box::new(writer))),
        }
    }

    /// Writes one record. Write failures are swallowed.
    pub(crate) fn write_line(&self, mut line: String) {
        line.push('\n');
        let mut writer = self.writer.lock();
        let _ = writer.write_all(line.as_bytes());
        let _ = writer.flush();
    }

    pub fn flush(&self) -> io::Result<()> {
        self.writer.lock().flush()
    }

    pub fn same_sink(&self, other: &LogSink) -> bool {
        Arc::ptr_eq(&self.writer, &other.writer)
    }
}

impl Default for LogSink {
    fn default() -> Self {
        Self::stderr()
    }
}

impl fmt::Debug for LogSink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LogSink").finish_non_exhaustive()
    }
}

/// In-memory writer, mostly for tests and for capturing command output.
#[derive(Debug, Clone, Default)]
pub struct CaptureBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl CaptureBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock()).into_owned()
    }

    pub fn lines(&self) -> Vec<String> {
        self.contents().lines().map(str::to_string).collect()
    }

    pub fn clear(&self) {
        self.bytes.lock().clear();
    }
}

impl Write for CaptureBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.bytes.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl From<CaptureBuffer> for LogSink {
    fn from(buffer: CaptureBuffer) -> Self {
        LogSink::from_writer(buffer)
    }
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    pub level: LogLevel,
    pub format: LogFormat,
    pub sink: LogSink,
    pub add_source: bool,
    pub quiet: bool,
    pub verbose: bool,
    pub enable_api_logging: bool,
    pub enable_metrics: bool,
    pub mask_secrets: bool,
    pub request_timeout: Duration,
    pub masker: SecretMasker,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
            sink: LogSink::stderr(),
            add_source: false,
            quiet: false,
            verbose: false,
            enable_api_logging: false,
            enable_metrics: true,
            mask_secrets: true,
            request_timeout: Duration::from_secs(30),
            masker: SecretMasker::default(),
        }
    }
}

impl LogConfig {
    /// Level actually enforced: `quiet` forces error, `verbose` forces debug,
    /// and `quiet` wins when both are set.
    pub fn effective_level(&self) -> LogLevel {
        if self.quiet {
            LogLevel::Error
        } else if self.verbose {
            LogLevel::Debug
        } else {
            self.level
        }
    }

    pub fn with_sink(mut self, sink: impl Into<LogSink>) -> Self {
        self.sink = sink.into();
        self
    }
}
