#![warn(rust_2018_idioms)]
// Noisy pedantic lints suppressed with justification:
#![allow(
    clippy::cast_possible_truncation, // Durations in milliseconds stay far below u64::MAX
    clippy::cast_precision_loss,      // Acceptable for jitter and display
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,  // e.g. ShutdownError in the shutdown module
    clippy::must_use_candidate
)]

pub mod app;
pub mod errors;
pub mod logging;
pub mod pagination;
pub mod patterns;
pub mod reliability;
pub mod shutdown;

// Re-export main types for easy access
pub use app::{App, Config};
pub use errors::{BoxError, ContextualError, EnhancedErrorFormatter, ErrorClassifier, WrapErr};
pub use logging::{LogConfig, LogLevel, Logger};
pub use shutdown::ShutdownCoordinator;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
