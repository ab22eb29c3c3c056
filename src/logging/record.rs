// Record encoding for the text and JSON sinks
use super::{LogFormat, LogLevel};
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::panic::Location;

const RESERVED_JSON_KEYS: &[&str] = &["time", "level", "msg", "source"];

pub(crate) struct Record<'a> {
    pub time: DateTime<Utc>,
    pub level: LogLevel,
    pub message: &'a str,
    pub attrs: Vec<(String, Value)>,
    pub source: Option<&'static Location<'static>>,
}

impl Record<'_> {
    pub fn encode(&self, format: LogFormat) -> String {
        match format {
            LogFormat::Text => self.encode_text(),
            LogFormat::Json => self.encode_json(),
        }
    }

    fn timestamp(&self) -> String {
        self.time.to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    fn source_string(&self) -> Option<String> {
        self.source
            .map(|loc| format!("{}:{}", loc.file(), loc.line()))
    }

    fn encode_text(&self) -> String {
        let mut line = format!("{} {} {}", self.timestamp(), self.level.label(), self.message);

        if let Some(source) = self.source_string() {
            line.push_str(" source=");
            line.push_str(&source);
        }

        for (key, value) in &self.attrs {
            line.push(' ');
            line.push_str(key);
            line.push('=');
            line.push_str(&text_value(value));
        }
        line
    }

    fn encode_json(&self) -> String {
        let mut object = Map::new();
        object.insert("time".to_string(), Value::String(self.timestamp()));
        object.insert(
            "level".to_string(),
            Value::String(self.level.label().to_string()),
        );
        object.insert("msg".to_string(), Value::String(self.message.to_string()));
        if let Some(source) = self.source_string() {
            object.insert("source".to_string(), Value::String(source));
        }

        for (key, value) in &self.attrs {
            let key = if RESERVED_JSON_KEYS.contains(&key.as_str()) {
                format!("attr_{key}")
            } else {
                key.clone()
            };
            object.insert(key, value.clone());
        }

        serde_json::to_string(&Value::Object(object)).unwrap_or_default()
    }
}

fn text_value(value: &Value) -> String {
    match value {
        Value::String(s) if needs_quoting(s) => {
            serde_json::to_string(s).unwrap_or_else(|_| format!("{s:?}"))
        }
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

fn needs_quoting(s: &str) -> bool {
    s.is_empty()
        || s
            .chars()
            .any(|c| c.is_whitespace() || c.is_control() || matches!(c, '"' | '='))
}
