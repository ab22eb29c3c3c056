// Process-wide default logger for entry points
use super::Logger;
use parking_lot::RwLock;
use std::sync::OnceLock;

static GLOBAL: OnceLock<RwLock<Logger>> = OnceLock::new();

fn slot() -> &'static RwLock<Logger> {
    GLOBAL.get_or_init(|| RwLock::new(Logger::default()))
}

/// Returns the process-wide logger, creating a default one on first use.
///
/// Library code should take a [`Logger`] as a parameter instead.
pub fn global() -> Logger {
    slot().read().clone()
}

/// Replaces the process-wide logger.
pub fn set_global(logger: Logger) {
    *slot().write() = logger;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{CaptureBuffer, LogConfig};
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_set_global_replaces_logger() {
        let buffer = CaptureBuffer::new();
        set_global(Logger::new(LogConfig::default().with_sink(buffer.clone())));

        global().info("through the global logger", &[]);
        assert!(buffer.contents().contains("through the global logger"));

        set_global(Logger::default());
        global().info("not captured", &[]);
        assert!(!buffer.contents().contains("not captured"));
    }
}
