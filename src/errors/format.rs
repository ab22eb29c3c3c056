use super::classify::ErrorClassifier;
use super::context::ErrorContext;
use super::sdk::ApiError;
use super::{error_chain, find_sentinel};
use crate::patterns::StaticRegexSet;
use std::error::Error;
use std::fmt::Write as _;

static STATUS_PATTERNS: StaticRegexSet = StaticRegexSet::new(&[
    (r"(?i)status code:?\s*(\d{3})\b", "status_code"),
    (r"(?i)\bhttp\s+(\d{3})\b", "http"),
    (r"(?i)\bstatus\s+(\d{3})\b", "status"),
]);

pub(crate) const AUTH_HELP: &str = "Authentication failed. Your API keys are missing, invalid or revoked.\n\
To fix this:\n  \
  1. Check the configured profile with `atlas config list`\n  \
  2. Log in again with `atlas auth login`";

const SERVER_SELECTION_HELP: &str = "Could not reach the cluster (server selection error).\n\
Check that:\n  \
  - your IP address is on the project access list\n  \
  - the cluster is running and not paused\n  \
  - the connection string points at the right cluster";

const TIMEOUT_HELP: &str = "The operation timed out.\n\
The cluster may be busy or unreachable. Retry the command, or raise the limit with --request-timeout-secs.";

const NETWORK_HELP: &str = "A network error occurred while contacting Atlas.\n\
Check your internet connection and proxy settings, then retry the command.";

/// Ordered message heuristics: the first whose trigger appears wins. Each
/// help text contains its own trigger and none of an earlier entry, so a
/// formatted message formats to itself.
const HEURISTICS: &[(&[&str], &str)] = &[
    (
        &["authentication failed", "unauthorized", "invalid credentials"],
        AUTH_HELP,
    ),
    (&["server selection"], SERVER_SELECTION_HELP),
    (&["timed out", "timeout", "deadline exceeded"], TIMEOUT_HELP),
    (
        &["network", "connection refused", "connection reset", "no such host"],
        NETWORK_HELP,
    ),
];

/// First HTTP status code mentioned in `text`.
pub fn extract_status_code(text: &str) -> Option<u16> {
    STATUS_PATTERNS
        .iter()
        .filter_map(|regex| regex.captures(text))
        .filter_map(|caps| caps.get(1)?.as_str().parse().ok())
        .next()
}

pub fn status_hint(status: u16) -> Option<&'static str> {
    let hint = match status {
        400 => "The request was rejected as malformed (HTTP 400). Check the command arguments.",
        401 => "The API keys were not accepted (HTTP 401). Check the configured profile.",
        403 => "The API key lacks the role this operation needs (HTTP 403).",
        404 => "The requested resource does not exist (HTTP 404). Check the name and the selected project.",
        409 => "The resource is in a conflicting state or already exists (HTTP 409).",
        429 => "Too many requests were sent (HTTP 429). Wait a minute before retrying.",
        500 => "Atlas hit an internal error (HTTP 500). Retry the command later.",
        502 | 504 => "The Atlas gateway did not respond in time (HTTP 502/504). Retry the command later.",
        503 => "Atlas is temporarily unavailable (HTTP 503). Retry the command later.",
        _ => return None,
    };
    Some(hint)
}

fn sentinel_hint(sentinel: ApiError) -> &'static str {
    match sentinel {
        ApiError::NotFound => status_hint(404).unwrap_or(NETWORK_HELP),
        ApiError::Conflict => status_hint(409).unwrap_or(NETWORK_HELP),
        ApiError::Unauthorized => AUTH_HELP,
        ApiError::Transient => NETWORK_HELP,
    }
}

/// Turns errors into short, user-facing messages.
#[derive(Debug, Clone, Copy, Default)]
pub struct ErrorFormatter {
    pub verbose: bool,
}

impl ErrorFormatter {
    pub fn new(verbose: bool) -> Self {
        Self { verbose }
    }

    pub fn format(&self, err: &(dyn Error + 'static)) -> String {
        let message = err.to_string();
        let text = error_chain(err)
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join(": ");

        match find_sentinel(err).map(sentinel_hint).or_else(|| hint_for(&text)) {
            Some(hint) => self.with_details(hint, &message),
            None => self.plain(&message),
        }
    }

    pub fn format_message(&self, message: &str) -> String {
        match hint_for(message) {
            Some(hint) => self.with_details(hint, message),
            None => self.plain(message),
        }
    }

    fn with_details(&self, hint: &str, message: &str) -> String {
        // Already formatted: keep the details that are there.
        if message.starts_with(hint) {
            return message.to_string();
        }
        if self.verbose {
            format!("{hint}\n\nDetails: {message}")
        } else {
            hint.to_string()
        }
    }

    fn plain(&self, message: &str) -> String {
        if self.verbose || message.contains('\n') {
            return message.to_string();
        }
        match message.rsplit_once(':') {
            Some((_, tail)) if !tail.trim().is_empty() => tail.trim().to_string(),
            _ => message.to_string(),
        }
    }
}

fn hint_for(text: &str) -> Option<&'static str> {
    if let Some(hint) = extract_status_code(text).and_then(status_hint) {
        return Some(hint);
    }
    let lowered = text.to_lowercase();
    HEURISTICS
        .iter()
        .find(|(triggers, _)| triggers.iter().any(|t| lowered.contains(t)))
        .map(|(_, help)| *help)
}

/// Basic formatting plus an `Error: ` prefix; verbose output adds the
/// ranked suggestions and root cause from classification.
#[derive(Debug, Default)]
pub struct EnhancedErrorFormatter {
    formatter: ErrorFormatter,
    classifier: ErrorClassifier,
}

impl EnhancedErrorFormatter {
    pub fn new(verbose: bool) -> Self {
        Self {
            formatter: ErrorFormatter::new(verbose),
            classifier: ErrorClassifier::default(),
        }
    }

    pub fn with_classifier(mut self, classifier: ErrorClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn format(&self, err: &(dyn Error + 'static), context: Option<&ErrorContext>) -> String {
        let base = self.formatter.format(err);
        let mut out = if base.starts_with("Error: ") {
            base
        } else {
            format!("Error: {base}")
        };

        if !self.formatter.verbose {
            return out;
        }

        let analysis = self.classifier.analyze(err, context);
        if !analysis.suggestions.is_empty() {
            out.push_str("\n\nSuggestions:");
            for (i, suggestion) in analysis.suggestions.iter().enumerate() {
                let _ = write!(
                    out,
                    "\n  {}. {}: {}",
                    i + 1,
                    suggestion.title,
                    suggestion.description
                );
                for command in &suggestion.commands {
                    let _ = write!(out, "\n     $ {command}");
                }
            }
        }
        let _ = write!(out, "\n\nRoot Cause: {}", analysis.root_cause);
        out
    }
}

/// Renders `err` for the terminal.
pub fn render_error(err: &(dyn Error + 'static), verbose: bool) -> String {
    EnhancedErrorFormatter::new(verbose).format(err, None)
}
