use super::context::{ContextualError, ErrorContext};
use super::sdk::ApiError;
use super::suggestions::{
    ApplySuggestions, ClusterSuggestions, ErrorSuggestion, KnowledgeBase, SuggestionGenerator,
    heuristic_suggestions, sort_suggestions,
};
use super::{error_chain, find_in_chain, find_sentinel, root_message};
use serde::Serialize;
use serde_json::{Value, json};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Authentication,
    Authorization,
    Network,
    Validation,
    Configuration,
    Resource,
    Internal,
    Retryable,
    Fatal,
}

impl ErrorCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "authentication",
            ErrorCategory::Authorization => "authorization",
            ErrorCategory::Network => "network",
            ErrorCategory::Validation => "validation",
            ErrorCategory::Configuration => "configuration",
            ErrorCategory::Resource => "resource",
            ErrorCategory::Internal => "internal",
            ErrorCategory::Retryable => "retryable",
            ErrorCategory::Fatal => "fatal",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ErrorCategory::Authentication => "Authentication failed",
            ErrorCategory::Authorization => "Insufficient permissions",
            ErrorCategory::Network => "Network communication failed",
            ErrorCategory::Validation => "Invalid input",
            ErrorCategory::Configuration => "Configuration problem",
            ErrorCategory::Resource => "Resource state conflict",
            ErrorCategory::Internal => "Unexpected internal error",
            ErrorCategory::Retryable => "Transient failure",
            ErrorCategory::Fatal => "Unrecoverable failure",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Critical,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Substrings that select a category. Matching is case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationRule {
    pub category: ErrorCategory,
    pub patterns: Vec<String>,
}

impl ClassificationRule {
    pub fn new(category: ErrorCategory, patterns: &[&str]) -> Self {
        Self {
            category,
            patterns: patterns.iter().map(|p| p.to_lowercase()).collect(),
        }
    }

    pub fn matches(&self, lowered: &str) -> bool {
        self.patterns.iter().any(|p| lowered.contains(p.as_str()))
    }
}

/// The built-in table, in priority order.
pub fn default_rules() -> Vec<ClassificationRule> {
    vec![
        ClassificationRule::new(
            ErrorCategory::Authentication,
            &["unauthorized", "authentication", "api key"],
        ),
        ClassificationRule::new(
            ErrorCategory::Authorization,
            &["forbidden", "permission", "access denied"],
        ),
        ClassificationRule::new(
            ErrorCategory::Network,
            &["connection", "timeout", "network", "dns"],
        ),
        ClassificationRule::new(
            ErrorCategory::Validation,
            &["invalid", "validation", "required", "format"],
        ),
        ClassificationRule::new(ErrorCategory::Configuration, &["config", "yaml", "json"]),
        ClassificationRule::new(
            ErrorCategory::Resource,
            &["not found", "already exists", "conflict"],
        ),
    ]
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ErrorAnalysis {
    pub category: ErrorCategory,
    pub severity: Severity,
    pub retryable: bool,
    pub user_actionable: bool,
    pub suggestions: Vec<ErrorSuggestion>,
    pub root_cause: String,
    pub metadata: BTreeMap<String, Value>,
}

/// Severity, retryability and actionability for a category.
pub fn category_traits(category: ErrorCategory, lowered: &str) -> (Severity, bool, bool) {
    match category {
        ErrorCategory::Authentication | ErrorCategory::Authorization => {
            (Severity::Critical, false, true)
        }
        ErrorCategory::Network => {
            let severity = if lowered.contains("timeout") {
                Severity::Warning
            } else {
                Severity::Error
            };
            (severity, true, false)
        }
        ErrorCategory::Validation | ErrorCategory::Configuration => (Severity::Error, false, true),
        ErrorCategory::Resource => {
            let retryable = lowered.contains("not found") || lowered.contains("conflict");
            (Severity::Warning, retryable, true)
        }
        ErrorCategory::Internal => (Severity::Error, false, false),
        ErrorCategory::Retryable => (Severity::Warning, true, false),
        ErrorCategory::Fatal => (Severity::Critical, false, false),
    }
}

fn sentinel_category(sentinel: ApiError) -> ErrorCategory {
    match sentinel {
        ApiError::NotFound | ApiError::Conflict => ErrorCategory::Resource,
        ApiError::Unauthorized => ErrorCategory::Authentication,
        ApiError::Transient => ErrorCategory::Network,
    }
}

/// Lowercased text of the whole chain, outermost first.
fn chain_text(err: &(dyn Error + 'static)) -> String {
    error_chain(err)
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join(": ")
        .to_lowercase()
}

/// Maps errors to categories and builds the analysis shown to users.
pub struct ErrorClassifier {
    rules: Vec<ClassificationRule>,
    knowledge_base: KnowledgeBase,
    generators: Vec<Box<dyn SuggestionGenerator>>,
}

impl Default for ErrorClassifier {
    fn default() -> Self {
        Self {
            rules: default_rules(),
            knowledge_base: KnowledgeBase::default(),
            generators: vec![Box::new(ApplySuggestions), Box::new(ClusterSuggestions)],
        }
    }
}

impl fmt::Debug for ErrorClassifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorClassifier")
            .field("rules", &self.rules)
            .field(
                "generators",
                &self.generators.iter().map(|g| g.command()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl ErrorClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a rule after the existing ones.
    pub fn with_rule(mut self, rule: ClassificationRule) -> Self {
        self.rules.push(rule);
        self
    }

    pub fn with_knowledge_base(mut self, knowledge_base: KnowledgeBase) -> Self {
        self.knowledge_base = knowledge_base;
        self
    }

    pub fn with_generator(mut self, generator: impl SuggestionGenerator + 'static) -> Self {
        self.generators.push(Box::new(generator));
        self
    }

    pub fn rules(&self) -> &[ClassificationRule] {
        &self.rules
    }

    pub fn classify(&self, err: &(dyn Error + 'static)) -> ErrorCategory {
        if let Some(sentinel) = find_sentinel(err) {
            return sentinel_category(sentinel);
        }
        self.classify_message(&chain_text(err))
    }

    pub fn classify_message(&self, message: &str) -> ErrorCategory {
        let lowered = message.to_lowercase();
        self.rules
            .iter()
            .find(|rule| rule.matches(&lowered))
            .map(|rule| rule.category)
            .unwrap_or(ErrorCategory::Internal)
    }

    /// Full analysis. Without an explicit context, the context of the first
    /// [`ContextualError`] in the chain is used.
    pub fn analyze(
        &self,
        err: &(dyn Error + 'static),
        context: Option<&ErrorContext>,
    ) -> ErrorAnalysis {
        let context = context
            .cloned()
            .or_else(|| find_in_chain::<ContextualError>(err).map(|e| e.context().clone()))
            .unwrap_or_default();

        let lowered = chain_text(err);
        let category = self.classify(err);
        let (severity, retryable, user_actionable) = category_traits(category, &lowered);
        let suggestions = self.suggestions(category, &lowered, &context);

        let mut metadata = BTreeMap::new();
        metadata.insert("category".to_string(), json!(category.as_str()));
        metadata.insert("severity".to_string(), json!(severity.as_str()));
        if !context.command.is_empty() {
            metadata.insert("command".to_string(), json!(context.command));
        }
        if !context.resource.is_empty() {
            metadata.insert("resource".to_string(), json!(context.resource));
        }
        if !context.operation.is_empty() {
            metadata.insert("operation".to_string(), json!(context.operation));
        }
        if let Some(status) = super::format::extract_status_code(&lowered) {
            metadata.insert("http_status".to_string(), json!(status));
        }

        ErrorAnalysis {
            category,
            severity,
            retryable,
            user_actionable,
            suggestions,
            root_cause: format!("{}: {}", category.description(), root_message(err)),
            metadata,
        }
    }

    /// Knowledge base first, then message heuristics, then the generators
    /// for the invoked command; stable-sorted by priority.
    fn suggestions(
        &self,
        category: ErrorCategory,
        lowered: &str,
        context: &ErrorContext,
    ) -> Vec<ErrorSuggestion> {
        let mut out: Vec<ErrorSuggestion> =
            self.knowledge_base.suggestions_for(category).to_vec();
        out.extend(heuristic_suggestions(category, lowered));
        for generator in self.generators.iter().filter(|g| g.applies_to(context)) {
            out.extend(generator.generate(category, lowered, context));
        }
        sort_suggestions(&mut out);
        out
    }
}
