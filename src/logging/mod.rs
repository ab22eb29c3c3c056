//! Structured logging with level filtering, secret masking, operation
//! tracking and API request/response auditing.

pub mod api;
pub mod bridge;
pub mod config;
pub mod global;
pub mod level;
pub mod logger;
pub mod mask;
pub mod operation;
mod record;

pub use api::{ApiRequest, ApiResponse};
pub use bridge::{LoggerLayer, default_directives, init_tracing};
pub use config::{CaptureBuffer, LogConfig, LogFormat, LogSink, LoggingError};
pub use global::{global, set_global};
pub use level::LogLevel;
pub use logger::Logger;
pub use mask::{SECRET_KEYWORDS, SecretMasker};
pub use operation::Operation;

use std::time::Duration;

/// Human-readable duration (`1.5s`, `250ms`, `12µs`).
pub fn format_duration(d: Duration) -> String {
    format!("{d:?}")
}
