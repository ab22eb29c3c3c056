use super::classify::ErrorCategory;
use super::context::ErrorContext;
use serde::Serialize;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SuggestionType {
    Fix,
    Workaround,
    Documentation,
}

/// A recovery hint. Priority runs from 1 (most important) to 5.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorSuggestion {
    pub kind: SuggestionType,
    pub priority: u8,
    pub title: String,
    pub description: String,
    pub commands: Vec<String>,
    pub links: Vec<String>,
    pub auto_applicable: bool,
}

impl ErrorSuggestion {
    pub fn new(
        kind: SuggestionType,
        priority: u8,
        title: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            kind,
            priority: priority.clamp(1, 5),
            title: title.into(),
            description: description.into(),
            commands: Vec::new(),
            links: Vec::new(),
            auto_applicable: false,
        }
    }

    pub fn fix(priority: u8, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(SuggestionType::Fix, priority, title, description)
    }

    pub fn workaround(priority: u8, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(SuggestionType::Workaround, priority, title, description)
    }

    pub fn documentation(priority: u8, title: impl Into<String>, link: impl Into<String>) -> Self {
        let link = link.into();
        Self::new(SuggestionType::Documentation, priority, title, format!("See {link}"))
            .with_link(link)
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.commands.push(command.into());
        self
    }

    pub fn with_link(mut self, link: impl Into<String>) -> Self {
        self.links.push(link.into());
        self
    }

    pub fn auto_applicable(mut self) -> Self {
        self.auto_applicable = true;
        self
    }
}

/// Baseline suggestions per category.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    entries: HashMap<ErrorCategory, Vec<ErrorSuggestion>>,
}

impl KnowledgeBase {
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    pub fn with_entry(mut self, category: ErrorCategory, suggestion: ErrorSuggestion) -> Self {
        self.entries.entry(category).or_default().push(suggestion);
        self
    }

    pub fn suggestions_for(&self, category: ErrorCategory) -> &[ErrorSuggestion] {
        self.entries
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }
}

impl Default for KnowledgeBase {
    fn default() -> Self {
        Self::empty()
            .with_entry(
                ErrorCategory::Authentication,
                ErrorSuggestion::fix(
                    1,
                    "Check your API keys",
                    "Verify the public and private API keys are set and have not been revoked",
                )
                .with_command("atlas config list")
                .with_command("atlas auth whoami"),
            )
            .with_entry(
                ErrorCategory::Authentication,
                ErrorSuggestion::documentation(
                    4,
                    "Programmatic API keys",
                    "https://www.mongodb.com/docs/atlas/configure-api-access/",
                ),
            )
            .with_entry(
                ErrorCategory::Authorization,
                ErrorSuggestion::fix(
                    1,
                    "Check API key roles",
                    "The API key needs a project or organization role that allows this operation",
                )
                .with_command("atlas projects users list --projectId <id>"),
            )
            .with_entry(
                ErrorCategory::Authorization,
                ErrorSuggestion::fix(
                    2,
                    "Check the IP access list of the API key",
                    "Requests from addresses missing in the API key access list are rejected",
                ),
            )
            .with_entry(
                ErrorCategory::Network,
                ErrorSuggestion::workaround(
                    2,
                    "Retry the command",
                    "Network failures are usually transient; retry in a few moments",
                ),
            )
            .with_entry(
                ErrorCategory::Network,
                ErrorSuggestion::fix(
                    3,
                    "Check connectivity",
                    "Make sure cloud.mongodb.com is reachable and no proxy or firewall blocks it",
                )
                .with_command("curl -I https://cloud.mongodb.com"),
            )
            .with_entry(
                ErrorCategory::Validation,
                ErrorSuggestion::fix(
                    1,
                    "Check the command arguments",
                    "A required value is missing or has the wrong format",
                )
                .with_command("atlas <command> --help"),
            )
            .with_entry(
                ErrorCategory::Configuration,
                ErrorSuggestion::fix(
                    1,
                    "Check your configuration file",
                    "The configuration could not be read; check its syntax and field names",
                ),
            )
            .with_entry(
                ErrorCategory::Resource,
                ErrorSuggestion::fix(
                    2,
                    "Check the resource name and project",
                    "Make sure the resource exists in the selected project",
                )
                .with_command("atlas clusters list"),
            )
            .with_entry(
                ErrorCategory::Internal,
                ErrorSuggestion::workaround(
                    3,
                    "Run again with --verbose",
                    "Verbose output includes the underlying error and API traffic",
                ),
            )
            .with_entry(
                ErrorCategory::Retryable,
                ErrorSuggestion::workaround(2, "Retry the command", "The failure is transient"),
            )
    }
}

/// Produces suggestions for one CLI command.
pub trait SuggestionGenerator: Send + Sync {
    fn command(&self) -> &str;

    fn generate(
        &self,
        category: ErrorCategory,
        message: &str,
        context: &ErrorContext,
    ) -> Vec<ErrorSuggestion>;

    /// Matches when any word of the invoked command equals [`Self::command`].
    fn applies_to(&self, context: &ErrorContext) -> bool {
        context
            .command
            .split_whitespace()
            .any(|word| word == self.command())
    }
}

pub struct ApplySuggestions;

impl SuggestionGenerator for ApplySuggestions {
    fn command(&self) -> &str {
        "apply"
    }

    fn generate(
        &self,
        category: ErrorCategory,
        message: &str,
        context: &ErrorContext,
    ) -> Vec<ErrorSuggestion> {
        let file = context
            .configuration
            .get("file")
            .and_then(|v| v.as_str())
            .unwrap_or("config.yaml")
            .to_string();
        let mut out = Vec::new();

        if message.contains("yaml") || message.contains("unmarshal") || message.contains("syntax") {
            out.push(
                ErrorSuggestion::fix(
                    1,
                    "Validate your config",
                    "The configuration file has a syntax error; validate it before applying",
                )
                .with_command(format!("atlas infra validate -f {file}"))
                .with_command(format!("atlas infra plan -f {file}")),
            );
        }

        if category == ErrorCategory::Resource && message.contains("already exists") {
            out.push(
                ErrorSuggestion::fix(
                    2,
                    "Review the plan first",
                    "A resource in the configuration already exists; compare desired and current state",
                )
                .with_command(format!("atlas infra diff -f {file}")),
            );
        }

        if category == ErrorCategory::Network {
            out.push(
                ErrorSuggestion::workaround(
                    3,
                    "Re-run apply",
                    "Apply is idempotent; re-running continues from the current state",
                )
                .with_command(format!("atlas infra apply -f {file}"))
                .auto_applicable(),
            );
        }

        out
    }
}

pub struct ClusterSuggestions;

impl SuggestionGenerator for ClusterSuggestions {
    fn command(&self) -> &str {
        "clusters"
    }

    fn generate(
        &self,
        category: ErrorCategory,
        message: &str,
        context: &ErrorContext,
    ) -> Vec<ErrorSuggestion> {
        let mut out = Vec::new();

        if category == ErrorCategory::Resource && message.contains("not found") {
            let name = if context.resource.is_empty() {
                "<name>"
            } else {
                context.resource.as_str()
            };
            out.push(
                ErrorSuggestion::fix(
                    1,
                    "Check the cluster name",
                    format!("No cluster named {name} exists in the selected project"),
                )
                .with_command("atlas clusters list"),
            );
        }

        if message.contains("tier") || message.contains("instance size") {
            out.push(ErrorSuggestion::documentation(
                3,
                "Cluster tiers",
                "https://www.mongodb.com/docs/atlas/cluster-tier/",
            ));
        }

        out
    }
}

/// Suggestions driven only by the error text.
pub(crate) fn heuristic_suggestions(category: ErrorCategory, message: &str) -> Vec<ErrorSuggestion> {
    let mut out = Vec::new();

    if message.contains("dns") || message.contains("no such host") {
        out.push(ErrorSuggestion::fix(
            2,
            "Check DNS resolution",
            "The host name could not be resolved; check your DNS settings and the cluster host name",
        ));
    }

    if message.contains("access list") || message.contains("whitelist") {
        out.push(
            ErrorSuggestion::fix(
                1,
                "Add your IP address to the access list",
                "The request came from an address that is not on the project IP access list",
            )
            .with_command("atlas accessLists create --currentIp"),
        );
    }

    if message.contains("rate limit") || message.contains("too many requests") {
        out.push(ErrorSuggestion::workaround(
            2,
            "Slow down",
            "The API rate limit was reached; wait a minute before retrying",
        ));
    }

    if category == ErrorCategory::Validation && message.contains("required") {
        out.push(ErrorSuggestion::fix(
            2,
            "Provide the missing value",
            "A required flag or field was not set",
        ));
    }

    out
}

/// Stable sort by priority: equal priorities keep their insertion order.
pub fn sort_suggestions(suggestions: &mut [ErrorSuggestion]) {
    suggestions.sort_by_key(|s| s.priority);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_is_clamped() {
        assert_eq!(ErrorSuggestion::fix(0, "a", "b").priority, 1);
        assert_eq!(ErrorSuggestion::fix(9, "a", "b").priority, 5);
    }

    #[test]
    fn test_sort_is_stable() {
        let mut items = vec![
            ErrorSuggestion::fix(2, "kb-2", ""),
            ErrorSuggestion::fix(1, "kb-1", ""),
            ErrorSuggestion::fix(2, "cmd-2", ""),
            ErrorSuggestion::fix(1, "cmd-1", ""),
        ];
        sort_suggestions(&mut items);
        let titles: Vec<_> = items.iter().map(|s| s.title.as_str()).collect();
        assert_eq!(titles, vec!["kb-1", "cmd-1", "kb-2", "cmd-2"]);
    }

    #[test]
    fn test_knowledge_base_covers_user_facing_categories() {
        let kb = KnowledgeBase::default();
        for category in [
            ErrorCategory::Authentication,
            ErrorCategory::Authorization,
            ErrorCategory::Network,
            ErrorCategory::Validation,
            ErrorCategory::Configuration,
            ErrorCategory::Resource,
            ErrorCategory::Internal,
        ] {
            assert!(!kb.suggestions_for(category).is_empty(), "{category:?}");
        }
        assert!(kb.suggestions_for(ErrorCategory::Fatal).is_empty());
    }

    #[test]
    fn test_apply_generator_yaml_error() {
        let ctx = ErrorContext::new()
            .with_command("infra apply")
            .with_config("file", "cluster.yaml");
        let generator = ApplySuggestions;
        assert!(generator.applies_to(&ctx));

        let out = generator.generate(
            ErrorCategory::Configuration,
            "yaml: line 3: mapping values are not allowed",
            &ctx,
        );
        assert_eq!(out[0].title, "Validate your config");
        assert_eq!(out[0].commands[0], "atlas infra validate -f cluster.yaml");
    }

    #[test]
    fn test_generator_does_not_apply_to_other_commands() {
        let ctx = ErrorContext::new().with_command("clusters describe");
        assert!(!ApplySuggestions.applies_to(&ctx));
        assert!(ClusterSuggestions.applies_to(&ctx));
    }

    #[test]
    fn test_heuristics() {
        let out = heuristic_suggestions(
            ErrorCategory::Authorization,
            "ip address not on access list",
        );
        assert_eq!(out[0].title, "Add your IP address to the access list");
    }
}
