use super::{LogLevel, Logger};
use serde_json::{Value, json};
use std::error::Error;
use std::panic::Location;
use std::time::{Duration, Instant};

/// A tracked unit of work.
///
/// An operation is running from [`Logger::start_operation`] until it is
/// consumed by [`Operation::complete`] or [`Operation::fail`], so progress can
/// only be reported while it is running.
#[derive(Debug)]
pub struct Operation {
    id: String,
    op_type: String,
    started: Instant,
    logger: Logger,
}

impl Operation {
    #[track_caller]
    pub(crate) fn start(parent: &Logger, id: String, op_type: String) -> Self {
        let logger = parent.with_fields([
            ("operation_id", id.clone()),
            ("operation_type", op_type.clone()),
        ]);
        logger.emit(
            LogLevel::Info,
            "Operation started",
            Vec::new(),
            Some(Location::caller()),
        );

        Self {
            id,
            op_type,
            started: Instant::now(),
            logger,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn op_type(&self) -> &str {
        &self.op_type
    }

    /// Child logger with `operation_id` and `operation_type` bound.
    pub fn logger(&self) -> &Logger {
        &self.logger
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    #[track_caller]
    pub fn progress(&self, message: &str, percent: f64) {
        self.logger.emit(
            LogLevel::Info,
            "Operation progress",
            vec![
                ("message".to_string(), json!(message)),
                ("percent".to_string(), json!(format!("{percent:.1}%"))),
                ("elapsed".to_string(), Logger::duration_value(self.elapsed())),
            ],
            Some(Location::caller()),
        );
    }

    #[track_caller]
    pub fn complete(self, attrs: &[(&str, Value)]) -> Duration {
        let duration = self.elapsed();
        let mut all = vec![("duration".to_string(), Logger::duration_value(duration))];
        all.extend(attrs.iter().map(|(k, v)| (k.to_string(), v.clone())));
        self.logger
            .emit(LogLevel::Info, "Operation completed", all, Some(Location::caller()));
        duration
    }

    #[track_caller]
    pub fn fail(self, err: &dyn Error, attrs: &[(&str, Value)]) -> Duration {
        let duration = self.elapsed();
        let mut all = vec![
            ("error".to_string(), json!(err.to_string())),
            ("duration".to_string(), Logger::duration_value(duration)),
        ];
        all.extend(attrs.iter().map(|(k, v)| (k.to_string(), v.clone())));
        self.logger
            .emit(LogLevel::Error, "Operation failed", all, Some(Location::caller()));
        duration
    }
}
