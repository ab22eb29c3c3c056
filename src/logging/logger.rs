use super::operation::Operation;
use super::record::Record;
use super::{LogConfig, LogLevel, format_duration};
use chrono::Utc;
use serde_json::{Value, json};
use std::panic::Location;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Structured logger with level filtering and secret masking.
///
/// Cloning is cheap; clones and derived children share the configuration and
/// the sink. The logger never reports errors to its callers.
#[derive(Debug, Clone)]
pub struct Logger {
    config: Arc<LogConfig>,
    fields: Arc<Vec<(String, Value)>>,
    token: Option<CancellationToken>,
}

impl Default for Logger {
    fn default() -> Self {
        Self::new(LogConfig::default())
    }
}

impl Logger {
    pub fn new(config: LogConfig) -> Self {
        Self {
            config: Arc::new(config),
            fields: Arc::new(Vec::new()),
            token: None,
        }
    }

    /// `None` means defaults.
    pub fn from_config(config: Option<LogConfig>) -> Self {
        Self::new(config.unwrap_or_default())
    }

    pub fn config(&self) -> &LogConfig {
        &self.config
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level >= self.config.effective_level()
    }

    /// Child bound to `token`; sink and configuration are shared.
    pub fn with_context(&self, token: CancellationToken) -> Logger {
        Logger {
            config: Arc::clone(&self.config),
            fields: Arc::clone(&self.fields),
            token: Some(token),
        }
    }

    pub fn context(&self) -> Option<&CancellationToken> {
        self.token.as_ref()
    }

    /// Child with `fields` pre-bound. Values are masked here, once, rather
    /// than on every emission.
    pub fn with_fields<I, K, V>(&self, fields: I) -> Logger
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        let mut bound = (*self.fields).clone();
        for (key, value) in fields {
            let key = key.into();
            let value = self.mask(&key, value.into());
            bound.retain(|(k, _)| *k != key);
            bound.push((key, value));
        }

        Logger {
            config: Arc::clone(&self.config),
            fields: Arc::new(bound),
            token: self.token.clone(),
        }
    }

    pub fn fields(&self) -> &[(String, Value)] {
        &self.fields
    }

    #[track_caller]
    pub fn debug(&self, msg: &str, attrs: &[(&str, Value)]) {
        self.log(LogLevel::Debug, msg, attrs);
    }

    #[track_caller]
    pub fn info(&self, msg: &str, attrs: &[(&str, Value)]) {
        self.log(LogLevel::Info, msg, attrs);
    }

    #[track_caller]
    pub fn warn(&self, msg: &str, attrs: &[(&str, Value)]) {
        self.log(LogLevel::Warn, msg, attrs);
    }

    #[track_caller]
    pub fn error(&self, msg: &str, attrs: &[(&str, Value)]) {
        self.log(LogLevel::Error, msg, attrs);
    }

    /// Emitted at error severity with an extra `severity=critical` attribute.
    #[track_caller]
    pub fn critical(&self, msg: &str, attrs: &[(&str, Value)]) {
        self.log(LogLevel::Critical, msg, attrs);
    }

    #[track_caller]
    pub fn log(&self, level: LogLevel, msg: &str, attrs: &[(&str, Value)]) {
        if !self.enabled(level) {
            return;
        }
        let owned = attrs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        self.emit(level, msg, owned, Some(Location::caller()));
    }

    pub(crate) fn emit(
        &self,
        level: LogLevel,
        msg: &str,
        attrs: Vec<(String, Value)>,
        source: Option<&'static Location<'static>>,
    ) {
        if !self.enabled(level) {
            return;
        }

        let mut all = Vec::with_capacity(self.fields.len() + attrs.len() + 1);
        all.extend(self.fields.iter().cloned());
        for (key, value) in attrs {
            let value = self.mask(&key, value);
            all.push((key, value));
        }
        if level == LogLevel::Critical {
            all.push(("severity".to_string(), json!("critical")));
        }

        let record = Record {
            time: Utc::now(),
            level,
            message: msg,
            attrs: all,
            source: source.filter(|_| self.config.add_source),
        };
        self.config.sink.write_line(record.encode(self.config.format));
    }

    pub(crate) fn mask(&self, key: &str, value: Value) -> Value {
        if self.config.mask_secrets {
            self.config.masker.mask_value(key, value)
        } else {
            value
        }
    }

    /// Starts a tracked operation and emits `Operation started`.
    #[track_caller]
    pub fn start_operation(&self, id: impl Into<String>, op_type: impl Into<String>) -> Operation {
        Operation::start(self, id.into(), op_type.into())
    }

    /// Emits a metric record at info. No-op when metrics are disabled.
    #[track_caller]
    pub fn log_metric(&self, name: &str, value: f64, unit: &str, tags: &[(&str, &str)]) {
        if !self.config.enable_metrics {
            return;
        }

        let mut attrs: Vec<(String, Value)> = vec![
            ("metric_name".to_string(), json!(name)),
            ("metric_value".to_string(), json!(value)),
            ("metric_unit".to_string(), json!(unit)),
            ("timestamp".to_string(), json!(Utc::now().to_rfc3339())),
        ];
        for (key, tag) in tags {
            attrs.push((format!("tag_{key}"), json!(tag)));
        }
        self.emit(LogLevel::Info, "Metric", attrs, Some(Location::caller()));
    }

    /// Convenience used by the operation and API helpers.
    pub(crate) fn duration_value(elapsed: std::time::Duration) -> Value {
        json!(format_duration(elapsed))
    }

    pub fn flush(&self) {
        let _ = self.config.sink.flush();
    }
}
