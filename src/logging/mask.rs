// Heuristic secret redaction for log attributes, headers, URLs and bodies
use crate::patterns::StaticRegexSet;
use regex::Regex;
use serde_json::Value;

/// Attribute names containing any of these (case-insensitive) are always masked.
pub const SECRET_KEYWORDS: &[&str] = &[
    "api_key",
    "apikey",
    "api-key",
    "password",
    "passwd",
    "pwd",
    "pass",
    "token",
    "auth",
    "authorization",
    "bearer",
    "secret",
    "private_key",
    "privatekey",
    "private-key",
    "connection_string",
    "connectionstring",
    "connection-string",
    "mongodb_uri",
    "mongo_uri",
    "uri",
    "credential",
    "creds",
    "access_key",
    "accesskey",
    "access-key",
    "session",
    "cookie",
    "certificate",
    "cert",
    "key",
    "public_key",
    "publickey",
    "public-key",
];

/// Words that make a request body too risky to log.
const BODY_SECRET_MARKERS: &[&str] = &[
    "password",
    "secret",
    "token",
    "api_key",
    "apikey",
    "private_key",
    "privatekey",
    "authorization",
    "bearer",
    "credential",
];

static SECRET_VALUE_PATTERNS: StaticRegexSet = StaticRegexSet::new(&[
    (r"^eyJ[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+\.[A-Za-z0-9_-]+$", "jwt"),
    (r"^[A-Za-z0-9+/]{32,}={0,2}$", "base64_key"),
    (r"mongodb(?:\+srv)?://[^:/@\s]+:[^@/\s]+@", "mongodb_uri"),
    (r"^AKIA[0-9A-Z]{16}$", "aws_access_key"),
    (r"^[a-fA-F0-9]{32,}$", "hex_secret"),
]);

pub const MASK: &str = "***";
const MIN_PATTERN_LEN: usize = 8;

/// Keyword and pattern tables driving redaction.
///
/// The defaults carry the built-in tables; callers extend them with
/// [`SecretMasker::with_keyword`] and [`SecretMasker::with_pattern`].
#[derive(Debug, Clone)]
pub struct SecretMasker {
    keywords: Vec<String>,
    extra_patterns: Vec<Regex>,
}

impl Default for SecretMasker {
    fn default() -> Self {
        Self {
            keywords: SECRET_KEYWORDS.iter().map(|k| k.to_string()).collect(),
            extra_patterns: Vec::new(),
        }
    }
}

impl SecretMasker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_keyword(mut self, keyword: impl Into<String>) -> Self {
        self.keywords.push(keyword.into().to_lowercase());
        self
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.extra_patterns.push(pattern);
        self
    }

    pub fn is_secret_key(&self, key: &str) -> bool {
        let key = key.to_lowercase();
        self.keywords.iter().any(|k| key.contains(k.as_str()))
    }

    /// True for strings of at least 8 characters matching a secret value pattern.
    pub fn matches_secret_pattern(&self, value: &str) -> bool {
        if value.chars().count() < MIN_PATTERN_LEN {
            return false;
        }
        SECRET_VALUE_PATTERNS
            .iter()
            .chain(self.extra_patterns.iter())
            .any(|re| re.is_match(value))
    }

    /// `***` for short strings, otherwise the first and last two characters
    /// around `***`. Masking a masked value returns it unchanged.
    pub fn mask_string(value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= 4 {
            return MASK.to_string();
        }
        let head: String = chars[..2].iter().collect();
        let tail: String = chars[chars.len() - 2..].iter().collect();
        format!("{head}{MASK}{tail}")
    }

    /// Masks a single attribute. Objects are walked so nested secret keys
    /// (header maps, config snapshots) are masked too.
    pub fn mask_value(&self, key: &str, value: Value) -> Value {
        if self.is_secret_key(key) {
            return match value {
                Value::String(s) => Value::String(Self::mask_string(&s)),
                _ => Value::String(MASK.to_string()),
            };
        }

        match value {
            Value::String(s) if self.matches_secret_pattern(&s) => {
                Value::String(Self::mask_string(&s))
            }
            Value::Object(map) => Value::Object(
                map.into_iter()
                    .map(|(k, v)| {
                        let masked = self.mask_value(&k, v);
                        (k, masked)
                    })
                    .collect(),
            ),
            Value::Array(items) => Value::Array(
                items
                    .into_iter()
                    .map(|v| self.mask_value("", v))
                    .collect(),
            ),
            other => other,
        }
    }

    /// Replaces everything after the first `?` with `?<masked>`.
    pub fn mask_url(url: &str) -> String {
        match url.split_once('?') {
            Some((prefix, _)) => format!("{prefix}?<masked>"),
            None => url.to_string(),
        }
    }

    /// Heuristic check used to decide whether a request body may be logged.
    pub fn body_looks_sensitive(&self, body: &str) -> bool {
        let lowered = body.to_lowercase();
        if BODY_SECRET_MARKERS.iter().any(|m| lowered.contains(m)) {
            return true;
        }
        body.split(|c: char| {
            c.is_whitespace() || matches!(c, '"' | '\'' | ',' | '{' | '}' | '[' | ']' | '=' | '&')
        })
        .any(|token| self.matches_secret_pattern(token))
    }
}
