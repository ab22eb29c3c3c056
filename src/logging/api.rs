// Audit records for outgoing Atlas API calls
use super::{LogLevel, Logger, SecretMasker};
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::panic::Location;
use std::time::{Duration, Instant};

const MAX_REQUEST_BODY: usize = 1024;
const MAX_RESPONSE_BODY: usize = 2048;

#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: String,
    pub url: String,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub start_time: Instant,
}

impl ApiRequest {
    pub fn new(method: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: None,
            start_time: Instant::now(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }
}

#[derive(Debug, Clone)]
pub struct ApiResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: Option<String>,
    pub duration: Duration,
}

impl ApiResponse {
    pub fn new(status_code: u16, duration: Duration) -> Self {
        Self {
            status_code,
            headers: BTreeMap::new(),
            body: None,
            duration,
        }
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn level(&self) -> LogLevel {
        match self.status_code {
            0..=399 => LogLevel::Debug,
            400..=499 => LogLevel::Warn,
            _ => LogLevel::Error,
        }
    }
}

impl Logger {
    /// No-op unless API logging is enabled.
    #[track_caller]
    pub fn log_api_request(&self, req: &ApiRequest) {
        if !self.config().enable_api_logging {
            return;
        }

        let mut attrs = self.api_common(req);
        if !req.headers.is_empty() {
            attrs.push(("api_headers".to_string(), self.header_value(&req.headers)));
        }
        if let Some(body) = &req.body {
            if body.len() <= MAX_REQUEST_BODY && !self.config().masker.body_looks_sensitive(body) {
                attrs.push(("api_body".to_string(), json!(body)));
            }
        }

        self.emit(LogLevel::Debug, "API request", attrs, Some(Location::caller()));
    }

    /// No-op unless API logging is enabled. Severity follows the status code.
    #[track_caller]
    pub fn log_api_response(&self, req: &ApiRequest, resp: &ApiResponse) {
        if !self.config().enable_api_logging {
            return;
        }

        let mut attrs = self.api_common(req);
        attrs.push(("api_status_code".to_string(), json!(resp.status_code)));
        attrs.push((
            "api_duration".to_string(),
            Logger::duration_value(resp.duration),
        ));
        attrs.push((
            "api_latency_ms".to_string(),
            json!(resp.duration.as_millis() as u64),
        ));
        if !resp.headers.is_empty() {
            attrs.push(("api_headers".to_string(), self.header_value(&resp.headers)));
        }
        if let Some(body) = &resp.body {
            if body.len() <= MAX_RESPONSE_BODY {
                attrs.push(("api_response_body".to_string(), json!(body)));
            }
        }

        self.emit(resp.level(), "API response", attrs, Some(Location::caller()));
    }

    fn api_common(&self, req: &ApiRequest) -> Vec<(String, Value)> {
        let url = if self.config().mask_secrets {
            SecretMasker::mask_url(&req.url)
        } else {
            req.url.clone()
        };
        vec![
            ("api_method".to_string(), json!(req.method)),
            ("api_url".to_string(), json!(url)),
        ]
    }

    // Header names are checked individually when the record is masked.
    fn header_value(&self, headers: &BTreeMap<String, String>) -> Value {
        let map: Map<String, Value> = headers
            .iter()
            .map(|(k, v)| (k.clone(), json!(v)))
            .collect();
        Value::Object(map)
    }
}
