// Routes `tracing` events into a kernel Logger so dependency logs get the
// same level policy and masking as our own records.
use super::{LogLevel, Logger, LoggingError};
use serde_json::{Value, json};
use tracing::field::{Field, Visit};
use tracing::{Event, Subscriber};
use tracing_subscriber::layer::Context;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{EnvFilter, Layer};

/// Targets that are noisy at info and below.
const DEFAULT_DIRECTIVES: &[(&str, &str)] = &[
    ("hyper", "warn"),
    ("reqwest", "warn"),
    ("h2", "warn"),
    ("tower", "warn"),
    ("rustls", "warn"),
];

pub struct LoggerLayer {
    logger: Logger,
}

impl LoggerLayer {
    pub fn new(logger: Logger) -> Self {
        Self { logger }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: Option<String>,
    fields: Vec<(String, Value)>,
}

impl FieldVisitor {
    fn insert(&mut self, field: &Field, value: Value) {
        if field.name() == "message" {
            self.message = Some(match value {
                Value::String(s) => s,
                other => other.to_string(),
            });
        } else {
            self.fields.push((field.name().to_string(), value));
        }
    }
}

impl Visit for FieldVisitor {
    fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
        self.insert(field, json!(format!("{value:?}")));
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        self.insert(field, json!(value));
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        self.insert(field, json!(value));
    }

    fn record_u64(&mut self, field: &Field, value: u64) {
        self.insert(field, json!(value));
    }

    fn record_f64(&mut self, field: &Field, value: f64) {
        self.insert(field, json!(value));
    }

    fn record_bool(&mut self, field: &Field, value: bool) {
        self.insert(field, json!(value));
    }

    fn record_error(&mut self, field: &Field, value: &(dyn std::error::Error + 'static)) {
        self.insert(field, json!(value.to_string()));
    }
}

impl<S: Subscriber> Layer<S> for LoggerLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let metadata = event.metadata();
        let level = LogLevel::from(metadata.level());
        if !self.logger.enabled(level) {
            return;
        }

        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        let message = visitor
            .message
            .take()
            .unwrap_or_else(|| metadata.name().to_string());
        let mut attrs = visitor.fields;
        attrs.push(("target".to_string(), json!(metadata.target())));

        self.logger.emit(level, &message, attrs, None);
    }
}

/// Filter string for `level` plus the quiet-dependency defaults.
pub fn default_directives(level: LogLevel) -> String {
    let base = tracing::Level::from(level).as_str().to_lowercase();
    let mut parts = vec![base];
    parts.extend(
        DEFAULT_DIRECTIVES
            .iter()
            .map(|(target, level)| format!("{target}={level}")),
    );
    parts.join(",")
}

/// Installs the global tracing subscriber feeding `logger`.
///
/// Only the first call in a process succeeds; later calls return
/// [`LoggingError::TracingInitFailed`].
pub fn init_tracing(logger: Logger, directives: &str) -> Result<(), LoggingError> {
    let env_filter =
        EnvFilter::try_new(directives).map_err(|e| LoggingError::TracingInitFailed {
            details: format!("Failed to create EnvFilter with '{directives}': {e}"),
        })?;

    tracing_subscriber::registry()
        .with(env_filter)
        .with(LoggerLayer::new(logger))
        .try_init()
        .map_err(|e| LoggingError::TracingInitFailed {
            details: e.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::{CaptureBuffer, LogConfig, LogFormat};

    fn json_logger(level: LogLevel) -> (Logger, CaptureBuffer) {
        let buffer = CaptureBuffer::new();
        let logger = Logger::new(
            LogConfig {
                level,
                format: LogFormat::Json,
                ..Default::default()
            }
            .with_sink(buffer.clone()),
        );
        (logger, buffer)
    }

    #[test]
    fn test_tracing_events_are_forwarded_and_masked() {
        let (logger, buffer) = json_logger(LogLevel::Info);
        let subscriber = tracing_subscriber::registry().with(LoggerLayer::new(logger));

        tracing::subscriber::with_default(subscriber, || {
            tracing::info!(cluster = "Cluster0", password = "hunter2-secret", "cluster ready");
            tracing::debug!("filtered out");
        });

        let lines = buffer.lines();
        assert_eq!(lines.len(), 1);
        let rec: Value = serde_json::from_str(&lines[0]).unwrap();
        assert_eq!(rec["msg"], json!("cluster ready"));
        assert_eq!(rec["cluster"], json!("Cluster0"));
        assert_eq!(rec["password"], json!("hu***et"));
        assert!(rec["target"].as_str().unwrap().contains("bridge"));
    }

    #[test]
    fn test_default_directives() {
        let filter = default_directives(LogLevel::Critical);
        assert!(filter.starts_with("error,"));
        assert!(filter.contains("hyper=warn"));
        assert!(EnvFilter::try_new(&filter).is_ok());
    }
}
