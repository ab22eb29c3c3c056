//! Error kernel: contextual wrapping, classification, suggestions,
//! aggregation, panic recovery and user-facing formatting.

pub mod classify;
pub mod collector;
pub mod context;
pub mod format;
pub mod recovery;
pub mod sdk;
pub mod stack;
pub mod suggestions;

pub use classify::{
    ClassificationRule, ErrorAnalysis, ErrorCategory, ErrorClassifier, Severity, default_rules,
};
pub use collector::{ChainedError, ErrorCollector, MultiError, chain};
pub use context::{ContextualError, ErrorContext, WrapErr};
pub use format::{EnhancedErrorFormatter, ErrorFormatter, render_error};
pub use recovery::{RecoveredPanic, handle_with_recovery, handle_with_recovery_async};
pub use sdk::{ApiError, HttpError};
pub use stack::StackFrame;
pub use suggestions::{
    ApplySuggestions, ClusterSuggestions, ErrorSuggestion, KnowledgeBase, SuggestionGenerator,
    SuggestionType,
};

use std::error::Error;

pub type BoxError = Box<dyn Error + Send + Sync + 'static>;

/// Iterates `err` followed by each of its sources.
pub fn error_chain<'a>(
    err: &'a (dyn Error + 'static),
) -> impl Iterator<Item = &'a (dyn Error + 'static)> {
    std::iter::successors(Some(err), |e: &&'a (dyn Error + 'static)| (*e).source())
}

pub fn find_in_chain<'a, T: Error + 'static>(err: &'a (dyn Error + 'static)) -> Option<&'a T> {
    error_chain(err).find_map(|e| e.downcast_ref::<T>())
}

pub fn chain_contains<T: Error + 'static>(err: &(dyn Error + 'static)) -> bool {
    find_in_chain::<T>(err).is_some()
}

/// True when `sentinel` appears anywhere in the chain of `err`.
pub fn is_sentinel(err: &(dyn Error + 'static), sentinel: ApiError) -> bool {
    error_chain(err)
        .filter_map(|e| e.downcast_ref::<ApiError>())
        .any(|found| *found == sentinel)
}

/// The first SDK sentinel in the chain, if any.
pub fn find_sentinel(err: &(dyn Error + 'static)) -> Option<ApiError> {
    find_in_chain::<ApiError>(err).copied()
}

/// The message of the innermost error in the chain.
pub fn root_message(err: &(dyn Error + 'static)) -> String {
    error_chain(err)
        .last()
        .map(|e| e.to_string())
        .unwrap_or_default()
}
